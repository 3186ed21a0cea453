//! Credential-backed provider: bearer token injection from the resolved credential.
//!
//! Implements the Provider trait over the single credential the auth chain
//! settled on at startup. Tokens are minted and refreshed in memory by the
//! credential itself; a 401 from the API drops the cached token so the
//! backend's retry picks up a fresh one.

use google_auth::ResolvedCredential;
use provider::{ErrorClassification, Provider, ProviderError, apply_bearer};
use reqwest::header::HeaderMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::warn;

pub struct CredentialProvider {
    credential: Arc<ResolvedCredential>,
}

impl CredentialProvider {
    pub fn new(credential: Arc<ResolvedCredential>) -> Self {
        Self { credential }
    }
}

impl Provider for CredentialProvider {
    fn id(&self) -> &str {
        self.credential.source()
    }

    fn prepare_request<'a>(
        &'a self,
        headers: &'a mut HeaderMap,
    ) -> Pin<Box<dyn Future<Output = provider::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let token = self
                .credential
                .access_token()
                .await
                .map_err(|e| ProviderError::Auth(e.to_string()))?;
            apply_bearer(headers, token.expose_str(), self.credential.quota_project())
        })
    }

    fn report_error(
        &self,
        classification: ErrorClassification,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if classification == ErrorClassification::Unauthorized {
                warn!(
                    source = self.credential.source(),
                    kind = self.credential.kind().as_str(),
                    "access token rejected by Google API"
                );
                self.credential.invalidate().await;
            }
        })
    }
}
