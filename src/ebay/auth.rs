use crate::ebay::config::{APP_ID, APP_SECRET, APP_SCOPES, OAUTH_TOKEN_URL};
use crate::http::build_client;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Tokens still valid for less than this margin are refreshed early so an
/// in-flight Browse call never rides an expiring credential.
const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum EbayAuthError {
    #[error("missing ebay app credentials in env")]
    MissingCredentials,
    #[error("oauth request failed: {0}")]
    Request(String),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Process-wide cache for the client-credentials bearer token.
///
/// Read-mostly: the lock is only taken for writing when the cached token is
/// inside the refresh margin. Concurrent refreshes are tolerated; both
/// produce a usable token and the last write wins.
pub struct TokenManager {
    cached: RwLock<Option<CachedToken>>,
    clock: Clock,
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenManager {
    pub fn new() -> Self {
        Self {
            cached: RwLock::new(None),
            clock: Box::new(Utc::now),
        }
    }

    #[cfg(test)]
    fn with_clock(clock: Clock) -> Self {
        Self {
            cached: RwLock::new(None),
            clock,
        }
    }

    pub async fn token(&self) -> Result<String, EbayAuthError> {
        let now = (self.clock)();
        if let Some(cached) = self.cached.read().await.as_ref()
            && cached.is_fresh(now)
        {
            return Ok(cached.access_token.clone());
        }

        let fresh = request_app_token().await?;
        debug!(
            target = "scout.ebay",
            expires_at = %fresh.expires_at,
            "refreshed app access token"
        );
        let token = fresh.access_token.clone();
        *self.cached.write().await = Some(fresh);
        Ok(token)
    }
}

fn basic_auth_header() -> Result<String, EbayAuthError> {
    if APP_ID.is_empty() || APP_SECRET.is_empty() {
        return Err(EbayAuthError::MissingCredentials);
    }
    let raw = format!("{}:{}", *APP_ID, *APP_SECRET);
    Ok(BASE64.encode(raw))
}

async fn request_app_token() -> Result<CachedToken, EbayAuthError> {
    basic_auth_header()?;
    let body = [
        ("grant_type", "client_credentials"),
        ("scope", &APP_SCOPES.join(" ")),
    ];

    let client = build_client();
    let response = client
        .post(OAUTH_TOKEN_URL.as_str())
        .basic_auth(APP_ID.as_str(), Some(APP_SECRET.as_str()))
        .form(&body)
        .send()
        .await
        .map_err(|err| EbayAuthError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(EbayAuthError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let payload: TokenResponse = response
        .json()
        .await
        .map_err(|err| EbayAuthError::Request(err.to_string()))?;
    Ok(CachedToken {
        access_token: payload.access_token,
        expires_at: Utc::now() + Duration::seconds(payload.expires_in),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn token_inside_the_margin_counts_as_stale() {
        let token = CachedToken {
            access_token: "t".into(),
            expires_at: fixed_now() + Duration::seconds(REFRESH_MARGIN_SECS - 1),
        };
        assert!(!token.is_fresh(fixed_now()));
    }

    #[test]
    fn token_outside_the_margin_is_served_from_cache() {
        let token = CachedToken {
            access_token: "t".into(),
            expires_at: fixed_now() + Duration::seconds(7200),
        };
        assert!(token.is_fresh(fixed_now()));
    }

    #[tokio::test]
    async fn fresh_cached_token_is_returned_without_a_network_call() {
        let manager = TokenManager::with_clock(Box::new(fixed_now));
        *manager.cached.write().await = Some(CachedToken {
            access_token: "cached-token".into(),
            expires_at: fixed_now() + Duration::seconds(7200),
        });
        // No token endpoint is reachable in tests, so a cache miss would
        // surface as an error here instead of the cached value.
        assert_eq!(manager.token().await.unwrap(), "cached-token");
    }
}
