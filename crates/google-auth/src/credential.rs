//! The resolved credential handle
//!
//! A `ResolvedCredential` is what every strategy produces: something that
//! can hand out a current bearer token for outbound API calls. It keeps the
//! last token in memory and mints a new one when that token is within
//! `EXPIRY_SKEW_MILLIS` of expiry, using whichever grant it was built from.
//! Runtime refreshes stay in memory; only resolution writes token files.

use std::fmt;

use common::Secret;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::ambient::fetch_metadata_token;
use crate::client_secrets::OAuthClient;
use crate::constants::{EXPIRY_SKEW_MILLIS, SCOPES};
use crate::error::{Error, Result};
use crate::service_account::{self, ServiceAccountKey};
use crate::token::{self, TokenRecord, now_millis};

/// Which grant backs a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    ServiceAccount,
    User,
    Metadata,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceAccount => "service_account",
            Self::User => "authorized_user",
            Self::Metadata => "metadata",
        }
    }
}

enum Grant {
    ServiceAccount {
        key: ServiceAccountKey,
        token_url: String,
    },
    User {
        oauth: OAuthClient,
    },
    Metadata {
        host: String,
    },
}

/// An authenticated handle, created once at startup.
pub struct ResolvedCredential {
    grant: Grant,
    source: &'static str,
    quota_project: Option<String>,
    http: reqwest::Client,
    token: Mutex<Option<TokenRecord>>,
}

impl ResolvedCredential {
    /// Build from a service account key. No token is requested until the
    /// first call to [`access_token`](Self::access_token).
    pub fn service_account(
        http: reqwest::Client,
        key: ServiceAccountKey,
        token_url: impl Into<String>,
    ) -> Self {
        Self::build(
            http,
            Grant::ServiceAccount {
                key,
                token_url: token_url.into(),
            },
            None,
        )
    }

    /// Build from an OAuth client and its current token state.
    pub fn user(http: reqwest::Client, oauth: OAuthClient, record: TokenRecord) -> Self {
        Self::build(http, Grant::User { oauth }, Some(record))
    }

    /// Build from the instance metadata server, seeded with a token the
    /// caller already fetched.
    pub fn metadata(http: reqwest::Client, host: impl Into<String>, record: TokenRecord) -> Self {
        Self::build(http, Grant::Metadata { host: host.into() }, Some(record))
    }

    fn build(http: reqwest::Client, grant: Grant, record: Option<TokenRecord>) -> Self {
        let kind = match &grant {
            Grant::ServiceAccount { .. } => CredentialKind::ServiceAccount,
            Grant::User { .. } => CredentialKind::User,
            Grant::Metadata { .. } => CredentialKind::Metadata,
        };
        Self {
            grant,
            source: kind.as_str(),
            quota_project: None,
            http,
            token: Mutex::new(record),
        }
    }

    /// Label the strategy that produced this handle.
    pub fn with_source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }

    /// Bill API usage to `project` via the quota project header.
    pub fn with_quota_project(mut self, project: Option<String>) -> Self {
        self.quota_project = project;
        self
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn kind(&self) -> CredentialKind {
        match self.grant {
            Grant::ServiceAccount { .. } => CredentialKind::ServiceAccount,
            Grant::User { .. } => CredentialKind::User,
            Grant::Metadata { .. } => CredentialKind::Metadata,
        }
    }

    pub fn quota_project(&self) -> Option<&str> {
        self.quota_project.as_deref()
    }

    /// Return a usable bearer token, minting a new one if the cached token
    /// is missing or about to expire.
    ///
    /// A user credential without a refresh token keeps returning its token
    /// until the API rejects it; there is nothing to mint a new one with.
    pub async fn access_token(&self) -> Result<Secret<String>> {
        let mut cached = self.token.lock().await;
        let now = now_millis();

        if let Some(record) = cached.as_ref()
            && (is_fresh(record, now) || !self.can_refresh(record))
        {
            return Ok(Secret::new(record.access_token.clone()));
        }

        let record = self.mint(cached.as_ref(), now).await?;
        let token = Secret::new(record.access_token.clone());
        *cached = Some(record);
        Ok(token)
    }

    /// Drop the cached token so the next call mints a new one.
    ///
    /// Called after the API answers 401. Tokens that cannot be replaced
    /// are kept.
    pub async fn invalidate(&self) {
        let mut cached = self.token.lock().await;
        if let Some(record) = cached.as_ref()
            && !self.can_refresh(record)
        {
            return;
        }
        debug!(source = self.source, "invalidating cached access token");
        *cached = None;
    }

    fn can_refresh(&self, record: &TokenRecord) -> bool {
        match &self.grant {
            Grant::User { .. } => record.is_refreshable(),
            Grant::ServiceAccount { .. } | Grant::Metadata { .. } => true,
        }
    }

    async fn mint(&self, previous: Option<&TokenRecord>, now: i64) -> Result<TokenRecord> {
        match &self.grant {
            Grant::ServiceAccount { key, token_url } => {
                let response = service_account::fetch_token(&self.http, key, SCOPES, token_url).await?;
                info!(source = self.source, "obtained service account access token");
                Ok(TokenRecord::from_response(response, now))
            }
            Grant::User { oauth } => {
                let previous = previous.ok_or(Error::NotRefreshable)?;
                let refresh = previous
                    .refresh_token
                    .as_deref()
                    .ok_or(Error::NotRefreshable)?;
                let response = token::refresh_token(&self.http, oauth, refresh).await?;
                info!(source = self.source, "refreshed user access token");
                Ok(previous.refreshed(response, now))
            }
            Grant::Metadata { host } => {
                let response = fetch_metadata_token(&self.http, host).await?;
                debug!(source = self.source, "obtained metadata server access token");
                Ok(TokenRecord::from_response(response, now))
            }
        }
    }
}

fn is_fresh(record: &TokenRecord, now: i64) -> bool {
    record
        .expiry_date
        .is_none_or(|expiry| expiry - EXPIRY_SKEW_MILLIS > now)
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("kind", &self.kind())
            .field("source", &self.source)
            .field("quota_project", &self.quota_project)
            .finish_non_exhaustive()
    }
}
