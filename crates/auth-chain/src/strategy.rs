//! One function per credential source
//!
//! Each strategy turns a detected `CredentialSource` into a
//! `ResolvedCredential` or a `StrategyError`. Strategies never abort the
//! chain; the resolver decides what happens next.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, SecondsFormat};
use common::Secret;
use google_auth::{
    DEFAULT_REDIRECT_URI, OAuthClient, ResolvedCredential, ServiceAccountKey, TokenFile,
    TokenRecord, load_client_secrets, now_millis, refresh_token, scope_string,
};
use tracing::{info, warn};

use crate::env::AuthEnv;
use crate::error::StrategyError;
use crate::source::CredentialSource;

type StrategyResult = std::result::Result<ResolvedCredential, StrategyError>;

/// Standard alphabet, padding optional. URL-safe input is mapped onto it first.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Run the strategy for `source`.
pub async fn attempt(
    source: &CredentialSource,
    env: &AuthEnv,
    http: &reqwest::Client,
) -> StrategyResult {
    match source {
        CredentialSource::EncodedServiceAccount { encoded } => {
            encoded_service_account(encoded, env, http)
        }
        CredentialSource::ServiceAccountFile { path } => {
            let key = ServiceAccountKey::from_file(path).await?;
            info!(client_email = %key.client_email, path = %path.display(), "loaded service account key file");
            Ok(ResolvedCredential::service_account(
                http.clone(),
                key,
                &env.token_url,
            ))
        }
        CredentialSource::DirectOAuthToken {
            client_id,
            client_secret,
            access_token,
            refresh_token,
            expiry,
        } => {
            let oauth = OAuthClient::new(client_id, client_secret.clone(), DEFAULT_REDIRECT_URI)
                .with_token_url(&env.token_url);
            direct_token(
                oauth,
                access_token,
                refresh_token.as_ref(),
                expiry.as_deref(),
                http,
            )
            .await
        }
        CredentialSource::OAuthTokenFile {
            client_id,
            client_secret,
            token_file,
        } => {
            let oauth = OAuthClient::new(client_id, client_secret.clone(), DEFAULT_REDIRECT_URI)
                .with_token_url(&env.token_url);
            token_file_credential(oauth, token_file, http).await
        }
        CredentialSource::OAuthLegacyFile {
            credentials_path,
            token_file,
        } => {
            let oauth = load_client_secrets(credentials_path)
                .await?
                .with_token_url(&env.token_url);
            token_file_credential(oauth, token_file, http).await
        }
        CredentialSource::AmbientDefault { config } => {
            Ok(google_auth::discover(http, config).await?)
        }
    }
}

/// Base64 → UTF-8 → JSON key.
///
/// Line breaks are ignored, padding is optional and the URL-safe alphabet
/// is accepted alongside the standard one.
fn encoded_service_account(
    encoded: &Secret<String>,
    env: &AuthEnv,
    http: &reqwest::Client,
) -> StrategyResult {
    let compact: String = encoded
        .expose_str()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    let bytes = LENIENT_BASE64
        .decode(compact)
        .map_err(|e| StrategyError::Failed(format!("CREDENTIALS_CONFIG is not valid base64: {e}")))?;
    let json = String::from_utf8(bytes)
        .map_err(|_| StrategyError::Failed("CREDENTIALS_CONFIG does not decode to UTF-8".into()))?;
    let key = ServiceAccountKey::from_json(&json)?;
    info!(client_email = %key.client_email, "decoded service account key");
    Ok(ResolvedCredential::service_account(
        http.clone(),
        key,
        &env.token_url,
    ))
}

/// Use an access token handed over in the environment.
///
/// An expired token is refreshed when a refresh token is available. There
/// is no file to write back to, so the new values are logged for the
/// operator to store wherever the variables come from.
async fn direct_token(
    oauth: OAuthClient,
    access_token: &Secret<String>,
    refresh: Option<&Secret<String>>,
    expiry: Option<&str>,
    http: &reqwest::Client,
) -> StrategyResult {
    let expiry_date = expiry.and_then(parse_expiry);
    let record = TokenRecord {
        access_token: access_token.expose_str().to_string(),
        token_type: String::from("Bearer"),
        scope: scope_string(),
        refresh_token: refresh.map(|r| r.expose_str().to_string()),
        expiry_date,
    };

    let now = now_millis();
    if !record.is_expired(now) {
        return Ok(ResolvedCredential::user(http.clone(), oauth, record));
    }

    let Some(refresh) = record.refresh_token.as_deref() else {
        return Err(StrategyError::Failed(
            "access token expired and GOOGLE_SHEETS_REFRESH_TOKEN is not set".into(),
        ));
    };

    info!("access token expired, refreshing");
    let response = refresh_token(http, &oauth, refresh).await?;
    let refreshed = record.refreshed(response, now);

    let notice = refresh_notice(&refreshed);
    warn!(
        new_credentials = %format!("{notice:#}"),
        "new access token obtained; update the stored GOOGLE_SHEETS_* values"
    );

    Ok(ResolvedCredential::user(http.clone(), oauth, refreshed))
}

/// The values an operator has to copy back after an in-memory refresh.
fn refresh_notice(refreshed: &TokenRecord) -> serde_json::Value {
    serde_json::json!({
        "accessToken": refreshed.access_token,
        "expiresAt": refreshed
            .expiry_date
            .and_then(DateTime::from_timestamp_millis)
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        "refreshToken": refreshed.refresh_token,
    })
}

/// Parse `GOOGLE_SHEETS_TOKEN_EXPIRY`: epoch milliseconds or RFC 3339.
///
/// An unparseable value is logged and treated as absent, so the token is
/// used as-is.
fn parse_expiry(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(millis) = value.parse::<i64>() {
        return Some(millis);
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(at) => Some(at.timestamp_millis()),
        Err(e) => {
            warn!(
                value,
                error = %e,
                "ignoring GOOGLE_SHEETS_TOKEN_EXPIRY: neither epoch millis nor RFC 3339"
            );
            None
        }
    }
}

/// Load the token file, refreshing and rewriting it if expired.
async fn token_file_credential(
    oauth: OAuthClient,
    token_file: &TokenFile,
    http: &reqwest::Client,
) -> StrategyResult {
    if !token_file.exists().await {
        return Err(StrategyError::TokenFileMissing(
            token_file.path().to_path_buf(),
        ));
    }

    let record = token_file.load().await?;
    let now = now_millis();
    if !record.is_expired(now) {
        return Ok(ResolvedCredential::user(http.clone(), oauth, record));
    }

    let refresh = record
        .refresh_token
        .as_deref()
        .ok_or(google_auth::Error::NotRefreshable)?;

    info!(path = %token_file.path().display(), "token expired, refreshing");
    let response = refresh_token(http, &oauth, refresh).await?;
    let refreshed = record.refreshed(response, now);
    token_file.save(&refreshed).await?;

    Ok(ResolvedCredential::user(http.clone(), oauth, refreshed))
}
