//! OAuth token records, exchange and refresh
//!
//! Handles the token endpoint interactions for user credentials:
//! 1. Authorization code exchange (interactive `login` completion)
//! 2. Token refresh (expired record at startup, or an expired cached token)
//!
//! Both POST to the client's token URL with different grant types. The
//! resulting `TokenResponse` is folded into a `TokenRecord`, which is the
//! shape persisted in the token file.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client_secrets::OAuthClient;
use crate::error::{Error, Result};

/// Persisted OAuth token state.
///
/// `expiry_date` is an absolute unix timestamp in milliseconds. A record
/// with a `refresh_token` can be refreshed; one without cannot, and an
/// expired record without one is unusable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

fn default_token_type() -> String {
    String::from("Bearer")
}

impl TokenRecord {
    /// Whether the record's expiry is strictly before `now_millis`.
    /// Records without an expiry never count as expired.
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < now_millis)
    }

    /// Whether a refresh exchange is possible for this record.
    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Build the record that replaces this one after a refresh.
    ///
    /// Fields the token endpoint omitted fall back to the prior values; in
    /// particular Google rarely rotates refresh tokens, so the old one is kept.
    pub fn refreshed(&self, response: TokenResponse, now_millis: i64) -> TokenRecord {
        TokenRecord {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_else(|| self.token_type.clone()),
            scope: response.scope.unwrap_or_else(|| self.scope.clone()),
            refresh_token: response.refresh_token.or_else(|| self.refresh_token.clone()),
            expiry_date: response
                .expires_in
                .map(|secs| now_millis + (secs as i64) * 1000),
        }
    }

    /// Build a fresh record from a code exchange response.
    pub fn from_response(response: TokenResponse, now_millis: i64) -> TokenRecord {
        TokenRecord {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_else(default_token_type),
            scope: response.scope.unwrap_or_default(),
            refresh_token: response.refresh_token,
            expiry_date: response
                .expires_in
                .map(|secs| now_millis + (secs as i64) * 1000),
        }
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

/// Response from the token endpoint for exchange, refresh and JWT grants.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Current unix time in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Exchange an authorization code for tokens (interactive flow).
pub async fn exchange_code(
    client: &reqwest::Client,
    oauth: &OAuthClient,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&oauth.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.expose_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    read_token_response(response, "token exchange").await
}

/// Refresh an access token using a refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    oauth: &OAuthClient,
    refresh: &str,
) -> Result<TokenResponse> {
    debug!(token_url = %oauth.token_url, "refreshing access token");
    let response = client
        .post(&oauth.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.expose_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    read_token_response(response, "token refresh").await
}

/// Decode a token endpoint response, classifying rejected grants.
///
/// Google answers a revoked or unknown refresh token with 400 `invalid_grant`,
/// and a bad client with 401 `invalid_client`; both mean the credential is
/// unusable rather than the request being retryable.
pub(crate) async fn read_token_response(
    response: reqwest::Response,
    operation: &str,
) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        let rejected = status.as_u16() == 401
            || status.as_u16() == 403
            || body.contains("invalid_grant")
            || body.contains("invalid_client");
        if rejected {
            return Err(Error::InvalidCredentials(format!(
                "{operation} rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "{operation} returned {status}: {body}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid {operation} response: {e}")))?;

    if token.access_token.is_empty() {
        return Err(Error::TokenExchange(format!(
            "{operation} response does not contain an access token"
        )));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(expiry: Option<i64>, refresh: Option<&str>) -> TokenRecord {
        TokenRecord {
            access_token: "at_old".into(),
            token_type: "Bearer".into(),
            scope: "scope-a".into(),
            refresh_token: refresh.map(String::from),
            expiry_date: expiry,
        }
    }

    /// Start a token endpoint that answers every POST with `status` and `body`.
    async fn start_token_server(
        status: u16,
        body: &'static str,
    ) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/token",
            post(move |form: String| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert!(form.contains("grant_type="), "form body: {form}");
                    (
                        axum::http::StatusCode::from_u16(status).unwrap(),
                        [(axum::http::header::CONTENT_TYPE, "application/json")],
                        body,
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/token"), hits)
    }

    fn oauth(token_url: &str) -> OAuthClient {
        OAuthClient::new("client-id", "client-secret", "http://localhost").with_token_url(token_url)
    }

    #[test]
    fn minimal_record_gets_defaults() {
        let json = r#"{"access_token":"a","refresh_token":"r","expiry_date":1700000000000}"#;
        let record: TokenRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.access_token, "a");
        assert_eq!(record.token_type, "Bearer");
        assert_eq!(record.scope, "");
        assert_eq!(record.refresh_token.as_deref(), Some("r"));
        assert_eq!(record.expiry_date, Some(1_700_000_000_000));
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let json = serde_json::to_string(&record(None, None)).unwrap();
        assert!(!json.contains("refresh_token"));
        assert!(!json.contains("expiry_date"));
    }

    #[test]
    fn expiry_is_strictly_before_now() {
        let r = record(Some(1_000), Some("r"));
        assert!(r.is_expired(1_001));
        assert!(!r.is_expired(1_000));
        assert!(!record(None, Some("r")).is_expired(i64::MAX));
    }

    #[test]
    fn refreshed_keeps_prior_refresh_token() {
        let old = record(Some(1), Some("rt_keep"));
        let response = TokenResponse {
            access_token: "at_new".into(),
            expires_in: Some(3599),
            refresh_token: None,
            scope: None,
            token_type: None,
        };
        let new = old.refreshed(response, 10_000);
        assert_eq!(new.access_token, "at_new");
        assert_eq!(new.refresh_token.as_deref(), Some("rt_keep"));
        assert_eq!(new.scope, "scope-a");
        assert_eq!(new.expiry_date, Some(10_000 + 3_599_000));
    }

    #[test]
    fn refreshed_adopts_rotated_refresh_token() {
        let old = record(Some(1), Some("rt_old"));
        let response = TokenResponse {
            access_token: "at_new".into(),
            expires_in: None,
            refresh_token: Some("rt_rotated".into()),
            scope: Some("scope-b".into()),
            token_type: Some("Bearer".into()),
        };
        let new = old.refreshed(response, 0);
        assert_eq!(new.refresh_token.as_deref(), Some("rt_rotated"));
        assert_eq!(new.scope, "scope-b");
        assert_eq!(new.expiry_date, None);
    }

    #[test]
    fn debug_redacts_tokens() {
        let debug = format!("{:?}", record(Some(5), Some("rt_secret")));
        assert!(!debug.contains("at_old"));
        assert!(!debug.contains("rt_secret"));
        assert!(debug.contains("expiry_date"));
    }

    #[tokio::test]
    async fn refresh_token_returns_new_access_token() {
        let (url, hits) = start_token_server(
            200,
            r#"{"access_token":"at_fresh","expires_in":3599,"token_type":"Bearer"}"#,
        )
        .await;
        let client = reqwest::Client::new();
        let response = refresh_token(&client, &oauth(&url), "rt_valid")
            .await
            .unwrap();
        assert_eq!(response.access_token, "at_fresh");
        assert_eq!(response.expires_in, Some(3599));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_grant_is_invalid_credentials() {
        let (url, _) = start_token_server(
            400,
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        )
        .await;
        let client = reqwest::Client::new();
        let result = refresh_token(&client, &oauth(&url), "rt_revoked").await;
        assert!(matches!(result, Err(Error::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn server_error_is_token_exchange_error() {
        let (url, _) = start_token_server(503, r#"{"error":"backend_error"}"#).await;
        let client = reqwest::Client::new();
        let result = refresh_token(&client, &oauth(&url), "rt").await;
        assert!(matches!(result, Err(Error::TokenExchange(_))));
    }

    #[tokio::test]
    async fn exchange_code_returns_tokens() {
        let (url, hits) = start_token_server(
            200,
            r#"{"access_token":"at_1","refresh_token":"rt_1","expires_in":3600,"scope":"s"}"#,
        )
        .await;
        let client = reqwest::Client::new();
        let response = exchange_code(&client, &oauth(&url), "4/code", "verifier")
            .await
            .unwrap();
        let record = TokenRecord::from_response(response, 0);
        assert_eq!(record.refresh_token.as_deref(), Some("rt_1"));
        assert_eq!(record.expiry_date, Some(3_600_000));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let client = reqwest::Client::new();
        let result = refresh_token(&client, &oauth("http://127.0.0.1:1/token"), "rt").await;
        assert!(matches!(result, Err(Error::Http(_))));
    }
}
