//! Caller resolution seam.
//!
//! Credential issuance and validation belong to the identity subsystem;
//! this module only turns already-issued bearer credentials into the typed
//! [`Caller`] the rest of the service consumes. The static resolver serves
//! tests and single-node deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use serde::Deserialize;

use trail_types::{Caller, CallerKind, DeviceId, Prn};

use crate::error::{ServerError, ServerResult};

/// Resolves bearer credentials to a typed caller.
#[async_trait]
pub trait CallerResolver: Send + Sync {
    /// `Ok(None)` means the request carried no credentials (anonymous);
    /// an unknown or malformed token is an error.
    async fn resolve(&self, token: Option<&str>) -> ServerResult<Option<Caller>>;
}

/// Extract the bearer token from request headers, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// One entry of a static token table, as written in a TOML token file.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenEntry {
    pub kind: CallerKind,
    pub account: String,
    /// Required for `DEVICE` entries, ignored otherwise.
    pub device: Option<String>,
}

/// Fixed token-to-caller table.
pub struct StaticTokenResolver {
    tokens: HashMap<String, Caller>,
}

impl StaticTokenResolver {
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    /// Register a caller under a bearer token.
    pub fn insert(&mut self, token: &str, caller: Caller) -> &mut Self {
        self.tokens.insert(token.to_string(), caller);
        self
    }

    /// Build the table from parsed token-file entries.
    pub fn from_entries(entries: HashMap<String, TokenEntry>) -> ServerResult<Self> {
        let mut resolver = Self::new();
        for (token, entry) in entries {
            let account = Prn::account(&entry.account);
            let caller = match entry.kind {
                CallerKind::User => Caller::user(account),
                CallerKind::Session => {
                    Caller::session(Prn::parse(&format!("prn::sessions:/{token}"))?, account)
                }
                CallerKind::Device => {
                    let id = entry.device.as_deref().ok_or_else(|| {
                        ServerError::Config(format!("token {token:?}: DEVICE entry needs a device id"))
                    })?;
                    Caller::device(&DeviceId::parse(id)?, account)
                }
            };
            resolver.insert(&token, caller);
        }
        Ok(resolver)
    }
}

impl Default for StaticTokenResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallerResolver for StaticTokenResolver {
    async fn resolve(&self, token: Option<&str>) -> ServerResult<Option<Caller>> {
        match token {
            None => Ok(None),
            Some(t) => self
                .tokens
                .get(t)
                .cloned()
                .map(Some)
                .ok_or(ServerError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(
            bearer_token(&headers_with("Bearer secret")),
            Some("secret")
        );
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn static_resolver_resolves_known_tokens() {
        let mut resolver = StaticTokenResolver::new();
        let caller = Caller::user(Prn::account("alice"));
        resolver.insert("tok", caller.clone());

        assert_eq!(resolver.resolve(Some("tok")).await.unwrap(), Some(caller));
        assert_eq!(resolver.resolve(None).await.unwrap(), None);
        assert!(matches!(
            resolver.resolve(Some("nope")).await,
            Err(ServerError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn entries_build_typed_callers() {
        let mut entries = HashMap::new();
        entries.insert(
            "dev-tok".to_string(),
            TokenEntry {
                kind: CallerKind::Device,
                account: "alice".to_string(),
                device: Some("dev1".to_string()),
            },
        );
        entries.insert(
            "user-tok".to_string(),
            TokenEntry {
                kind: CallerKind::User,
                account: "alice".to_string(),
                device: None,
            },
        );

        let resolver = StaticTokenResolver::from_entries(entries).unwrap();
        let device = resolver.resolve(Some("dev-tok")).await.unwrap().unwrap();
        assert!(device.is_device());
        assert_eq!(device.device_id().unwrap().as_str(), "dev1");

        let user = resolver.resolve(Some("user-tok")).await.unwrap().unwrap();
        assert!(user.is_account_side());
    }

    #[test]
    fn device_entry_without_id_is_rejected() {
        let mut entries = HashMap::new();
        entries.insert(
            "bad".to_string(),
            TokenEntry {
                kind: CallerKind::Device,
                account: "alice".to_string(),
                device: None,
            },
        );
        assert!(StaticTokenResolver::from_entries(entries).is_err());
    }
}
