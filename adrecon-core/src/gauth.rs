//! Google service-account authentication.
//!
//! Shared by the AdMob adapter and the remote object store: a service
//! account key is exchanged for a scoped bearer token through the RS256
//! JWT-bearer grant. Tokens are cached in memory with the usual expiry
//! buffer.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use adrecon_types::AdreconError;

use crate::http::HttpClient;
use crate::token::EXPIRY_BUFFER_SECS;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The fields of a service-account JSON key this system needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service-account email, the JWT issuer.
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// Token exchange endpoint; present in every key file.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Load and parse a key file.
    ///
    /// # Errors
    /// `Config` when the file is missing or not a service-account key.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AdreconError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await.map_err(|e| {
            AdreconError::config(format!(
                "cannot read service account key {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_slice(&raw).map_err(|e| {
            AdreconError::config(format!(
                "{} is not a service account key: {e}",
                path.display()
            ))
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

/// Scoped bearer-token source backed by one service-account key.
#[derive(Debug)]
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    scope: String,
    token_uri_override: Option<String>,
    cached: Mutex<Option<(String, u64)>>,
}

impl ServiceAccountAuth {
    /// Build a token source for one OAuth scope.
    #[must_use]
    pub fn new(key: ServiceAccountKey, scope: String) -> Self {
        Self {
            key,
            scope,
            token_uri_override: None,
            cached: Mutex::new(None),
        }
    }

    /// Point the exchange at a different endpoint (tests).
    #[must_use]
    pub fn with_token_uri(mut self, uri: impl Into<String>) -> Self {
        self.token_uri_override = Some(uri.into());
        self
    }

    fn token_uri(&self) -> &str {
        self.token_uri_override.as_deref().unwrap_or(&self.key.token_uri)
    }

    /// A bearer token valid for at least the expiry buffer.
    ///
    /// # Errors
    /// `Config` when the key cannot sign; `Transport` when the exchange
    /// endpoint is unreachable or rejects the assertion.
    pub async fn bearer(&self, http: &HttpClient) -> Result<String, AdreconError> {
        let now = now_epoch();
        {
            let cached = self.cached.lock().await;
            if let Some((token, expires_at)) = cached.as_ref() {
                if *expires_at > now {
                    return Ok(token.clone());
                }
            }
        }

        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: self.token_uri(),
            iat: now,
            exp: now + 3600,
        };
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| AdreconError::config(format!("invalid service account key: {e}")))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| AdreconError::config(format!("jwt signing failed: {e}")))?;

        let response: TokenResponse = http
            .send_json(http.post(self.token_uri()).form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ]))
            .await
            .map_err(|e| {
                AdreconError::transport_unattributed(format!("service account exchange: {e}"))
            })?;

        let effective = response
            .expires_in
            .saturating_sub(EXPIRY_BUFFER_SECS)
            .max(EXPIRY_BUFFER_SECS);
        debug!(scope = %self.scope, expires_in = effective, "exchanged service account token");
        let mut cached = self.cached.lock().await;
        *cached = Some((response.access_token.clone(), now + effective));
        Ok(response.access_token)
    }
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
