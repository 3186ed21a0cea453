//! Credential sources and their detection
//!
//! `StrategyKind` is the closed, ordered set of strategies. `CredentialSource`
//! is a detected strategy carrying only the inputs it needs; it exists only
//! while resolution runs and is never persisted.

use std::path::PathBuf;

use common::Secret;
use google_auth::{AmbientConfig, TokenFile};

use crate::env::AuthEnv;

/// The six strategies, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    EncodedServiceAccount,
    ServiceAccountFile,
    DirectOAuthToken,
    OAuthTokenFile,
    OAuthLegacyFile,
    AmbientDefault,
}

impl StrategyKind {
    /// First success wins.
    pub const ORDER: [StrategyKind; 6] = [
        StrategyKind::EncodedServiceAccount,
        StrategyKind::ServiceAccountFile,
        StrategyKind::DirectOAuthToken,
        StrategyKind::OAuthTokenFile,
        StrategyKind::OAuthLegacyFile,
        StrategyKind::AmbientDefault,
    ];

    /// Label for logs and diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::EncodedServiceAccount => "encoded_service_account",
            StrategyKind::ServiceAccountFile => "service_account_file",
            StrategyKind::DirectOAuthToken => "direct_oauth_token",
            StrategyKind::OAuthTokenFile => "oauth_token_file",
            StrategyKind::OAuthLegacyFile => "oauth_legacy_file",
            StrategyKind::AmbientDefault => "ambient_default",
        }
    }

    /// 1-based position in [`ORDER`](Self::ORDER).
    pub fn position(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|kind| kind == self)
            .map_or(0, |index| index + 1)
    }
}

/// A strategy whose preconditions hold, with the inputs it will use.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    EncodedServiceAccount {
        encoded: Secret<String>,
    },
    ServiceAccountFile {
        path: PathBuf,
    },
    DirectOAuthToken {
        client_id: String,
        client_secret: Secret<String>,
        access_token: Secret<String>,
        refresh_token: Option<Secret<String>>,
        expiry: Option<String>,
    },
    OAuthTokenFile {
        client_id: String,
        client_secret: Secret<String>,
        token_file: TokenFile,
    },
    OAuthLegacyFile {
        credentials_path: PathBuf,
        token_file: TokenFile,
    },
    AmbientDefault {
        config: AmbientConfig,
    },
}

impl CredentialSource {
    /// Check `kind`'s preconditions against `env`.
    ///
    /// `None` means the strategy is not configured and is skipped without
    /// counting as a failure. Ambient discovery is always attempted.
    pub async fn detect(kind: StrategyKind, env: &AuthEnv) -> Option<Self> {
        match kind {
            StrategyKind::EncodedServiceAccount => env
                .credentials_config
                .clone()
                .map(|encoded| CredentialSource::EncodedServiceAccount { encoded }),

            StrategyKind::ServiceAccountFile => {
                let path = env.service_account_path.clone()?;
                file_exists(&path)
                    .await
                    .then_some(CredentialSource::ServiceAccountFile { path })
            }

            StrategyKind::DirectOAuthToken => Some(CredentialSource::DirectOAuthToken {
                access_token: env.access_token.clone()?,
                client_id: env.client_id.clone()?,
                client_secret: env.client_secret.clone()?,
                refresh_token: env.refresh_token.clone(),
                expiry: env.token_expiry.clone(),
            }),

            // The token file is checked by the strategy itself: a missing file
            // is reported as TokenFileMissing rather than skipped.
            StrategyKind::OAuthTokenFile => Some(CredentialSource::OAuthTokenFile {
                client_id: env.client_id.clone()?,
                client_secret: env.client_secret.clone()?,
                token_file: TokenFile::new(&env.token_path),
            }),

            StrategyKind::OAuthLegacyFile => {
                let credentials_path = env.credentials_path.clone();
                file_exists(&credentials_path)
                    .await
                    .then(|| CredentialSource::OAuthLegacyFile {
                        credentials_path,
                        token_file: TokenFile::new(&env.token_path),
                    })
            }

            StrategyKind::AmbientDefault => Some(CredentialSource::AmbientDefault {
                config: env.ambient.clone(),
            }),
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            CredentialSource::EncodedServiceAccount { .. } => StrategyKind::EncodedServiceAccount,
            CredentialSource::ServiceAccountFile { .. } => StrategyKind::ServiceAccountFile,
            CredentialSource::DirectOAuthToken { .. } => StrategyKind::DirectOAuthToken,
            CredentialSource::OAuthTokenFile { .. } => StrategyKind::OAuthTokenFile,
            CredentialSource::OAuthLegacyFile { .. } => StrategyKind::OAuthLegacyFile,
            CredentialSource::AmbientDefault { .. } => StrategyKind::AmbientDefault,
        }
    }
}

async fn file_exists(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_env() -> AuthEnv {
        AuthEnv {
            client_id: Some("cid".into()),
            client_secret: Some(Secret::new("cs".into())),
            ..Default::default()
        }
    }

    #[test]
    fn order_and_positions() {
        assert_eq!(StrategyKind::ORDER[0], StrategyKind::EncodedServiceAccount);
        assert_eq!(StrategyKind::ORDER[5], StrategyKind::AmbientDefault);
        for (index, kind) in StrategyKind::ORDER.iter().enumerate() {
            assert_eq!(kind.position(), index + 1);
        }
    }

    #[tokio::test]
    async fn empty_env_only_detects_ambient() {
        let dir = tempfile::tempdir().unwrap();
        let env = AuthEnv {
            token_path: dir.path().join("token.json"),
            credentials_path: dir.path().join("credentials.json"),
            ..Default::default()
        };
        for kind in StrategyKind::ORDER {
            let detected = CredentialSource::detect(kind, &env).await;
            assert_eq!(
                detected.is_some(),
                kind == StrategyKind::AmbientDefault,
                "{kind:?}"
            );
        }
    }

    #[tokio::test]
    async fn service_account_path_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sa.json");
        let env = AuthEnv {
            service_account_path: Some(path.clone()),
            ..Default::default()
        };
        assert!(
            CredentialSource::detect(StrategyKind::ServiceAccountFile, &env)
                .await
                .is_none()
        );

        tokio::fs::write(&path, "{}").await.unwrap();
        let detected = CredentialSource::detect(StrategyKind::ServiceAccountFile, &env).await;
        assert!(matches!(detected, Some(CredentialSource::ServiceAccountFile { .. })));
    }

    #[tokio::test]
    async fn direct_token_needs_access_token_and_client() {
        let env = oauth_env();
        assert!(
            CredentialSource::detect(StrategyKind::DirectOAuthToken, &env)
                .await
                .is_none()
        );

        let env = AuthEnv {
            access_token: Some(Secret::new("at".into())),
            ..oauth_env()
        };
        let detected = CredentialSource::detect(StrategyKind::DirectOAuthToken, &env).await;
        assert_eq!(detected.map(|s| s.kind()), Some(StrategyKind::DirectOAuthToken));
    }

    #[tokio::test]
    async fn token_file_strategy_detected_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = AuthEnv {
            token_path: dir.path().join("token.json"),
            ..oauth_env()
        };
        let detected = CredentialSource::detect(StrategyKind::OAuthTokenFile, &env).await;
        assert!(matches!(detected, Some(CredentialSource::OAuthTokenFile { .. })));
    }

    #[tokio::test]
    async fn legacy_file_requires_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let credentials_path = dir.path().join("credentials.json");
        let env = AuthEnv {
            credentials_path: credentials_path.clone(),
            ..Default::default()
        };
        assert!(
            CredentialSource::detect(StrategyKind::OAuthLegacyFile, &env)
                .await
                .is_none()
        );

        tokio::fs::write(&credentials_path, "{}").await.unwrap();
        assert!(
            CredentialSource::detect(StrategyKind::OAuthLegacyFile, &env)
                .await
                .is_some()
        );
    }

    #[test]
    fn debug_redacts_encoded_key() {
        let source = CredentialSource::EncodedServiceAccount {
            encoded: Secret::new("c2VjcmV0".into()),
        };
        assert!(!format!("{source:?}").contains("c2VjcmV0"));
    }
}
