//! Provider abstraction for spreadsheet backend authorization
//!
//! Defines the `Provider` trait that decouples the spreadsheet backend from
//! the credential that was resolved at startup. The backend never sees how
//! a token was obtained: it hands the outbound headers to the provider,
//! sends the request, and reports authorization failures back so the
//! provider can drop a stale token before the single retry.

pub mod bearer;

pub use bearer::{QUOTA_PROJECT_HEADER, apply_bearer};

use std::future::Future;
use std::pin::Pin;

/// Classification of backend error responses.
///
/// - Unauthorized: the access token was rejected (401), the provider should
///   discard any cached token and the caller may retry once
/// - Transient: retryable server-side condition (429, 5xx)
/// - Permanent: request-level failure (403, 404, 400), surfaced as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClassification {
    Unauthorized,
    Transient,
    Permanent,
}

/// Classify a backend HTTP status.
pub fn classify_status(status: u16) -> ErrorClassification {
    match status {
        401 => ErrorClassification::Unauthorized,
        429 | 500..=599 => ErrorClassification::Transient,
        _ => ErrorClassification::Permanent,
    }
}

/// Errors from provider operations (token fetch, refresh, header encoding).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("internal provider error: {0}")]
    Internal(String),
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Capability to authorize outbound spreadsheet API calls.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Provider>`).
pub trait Provider: Send + Sync {
    /// Identifier for logging (e.g. "service_account", "static").
    fn id(&self) -> &str;

    /// Inject the `Authorization` header (and any quota headers) before a request.
    fn prepare_request<'a>(
        &'a self,
        headers: &'a mut reqwest::header::HeaderMap,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Report a classified backend error so the provider can update its state.
    /// Providers without cached state ignore this.
    fn report_error(
        &self,
        classification: ErrorClassification,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
