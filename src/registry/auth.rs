//! Authentication module for Docker registry access
//!
//! Registries answer an unauthenticated request with `401` and a
//! `WWW-Authenticate` challenge. A `Basic` challenge is answered with the
//! credentials directly; a `Bearer` challenge is answered by fetching a token
//! from the advertised realm. Tokens are cached per scope.

use crate::config::Credentials;
use crate::error::{RegistryError, Result};
use crate::error::handlers::NetworkErrorHandler;
use crate::logging::Logger;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// Parsed `WWW-Authenticate` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChallenge {
    Basic,
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
}

impl AuthChallenge {
    /// Parse `Bearer realm="...",service="...",scope="..."` or `Basic realm="..."`
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params_str) = header.split_once(' ').unwrap_or((header, ""));

        if scheme.eq_ignore_ascii_case("basic") {
            return Some(AuthChallenge::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let params = parse_params(params_str);
        let realm = params.get("realm")?.to_string();

        Some(AuthChallenge::Bearer {
            realm,
            service: params.get("service").map(|s| s.to_string()),
            scope: params.get("scope").map(|s| s.to_string()),
        })
    }
}

// Values may themselves contain commas (e.g. "repository:a:pull,push"), so
// split on commas outside of quotes only.
fn parse_params(params_str: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in params_str.chars().chain(std::iter::once(',')) {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => {
                if let Some((key, value)) = current.split_once('=') {
                    params.insert(
                        key.trim().to_ascii_lowercase(),
                        value.trim().trim_matches('"').to_string(),
                    );
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    params
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Fetches and caches bearer tokens for one registry
#[derive(Debug)]
pub struct TokenAuth {
    client: Client,
    tokens: RwLock<HashMap<String, String>>,
    logger: Logger,
}

impl TokenAuth {
    pub fn new(client: Client, logger: Logger) -> Self {
        Self {
            client,
            tokens: RwLock::new(HashMap::new()),
            logger,
        }
    }

    pub fn cached(&self, key: &str) -> Option<String> {
        self.tokens
            .read()
            .ok()
            .and_then(|tokens| tokens.get(key).cloned())
    }

    fn store(&self, key: &str, token: &str) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(key.to_string(), token.to_string());
        }
    }

    /// Get a token for a bearer challenge and remember it under `key`.
    ///
    /// `scope` overrides the scope named in the challenge; registries usually
    /// only name the scope the failed request needed.
    pub async fn fetch_token(
        &self,
        key: &str,
        challenge: &AuthChallenge,
        scope: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<String> {
        let AuthChallenge::Bearer {
            realm,
            service,
            scope: challenge_scope,
        } = challenge
        else {
            return Err(RegistryError::Auth(
                "Token requested for a non-bearer challenge".to_string(),
            ));
        };

        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(service) = service {
            query.push(("service", service.as_str()));
        }
        if let Some(scope) = scope.or(challenge_scope.as_deref()) {
            query.push(("scope", scope));
        }

        self.logger
            .detail(&format!("Requesting token from {} ({:?})", realm, query));

        let mut request = self.client.get(realm).query(&query);
        if let Some(credentials) = credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "token request"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            self.logger.error(&format!(
                "Token request failed with status {}: {}",
                status, error_text
            ));
            return Err(RegistryError::Auth(format!(
                "Authentication failed with status: {}",
                status
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(format!("Failed to parse token response: {}", e)))?;

        let token = token_response
            .token
            .or(token_response.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RegistryError::Auth("Token response contained no token".to_string()))?;

        self.logger
            .detail(&format!("Token obtained (length: {} chars)", token.len()));
        self.store(key, &token);
        Ok(token)
    }
}
