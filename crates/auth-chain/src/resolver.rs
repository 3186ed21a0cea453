//! The resolution driver
//!
//! Walks `StrategyKind::ORDER` once. Each strategy is detected, then run to
//! completion (including any refresh call) before the next is considered.
//! The first credential wins; every skip and failure is logged and recorded
//! so `AuthExhausted` can say why nothing worked.

use google_auth::ResolvedCredential;
use tracing::{debug, error, info, warn};

use crate::env::AuthEnv;
use crate::error::{Error, Result, StrategyAttempt, StrategyError};
use crate::source::{CredentialSource, StrategyKind};
use crate::strategy::attempt;

/// Resolve a credential from `env`.
///
/// Fails only with `AuthExhausted`, after every strategy has been tried.
pub async fn resolve(env: &AuthEnv, http: &reqwest::Client) -> Result<ResolvedCredential> {
    let mut attempts = Vec::with_capacity(StrategyKind::ORDER.len());

    for kind in StrategyKind::ORDER {
        let strategy = kind.label();

        let Some(source) = CredentialSource::detect(kind, env).await else {
            debug!(strategy, "skipped: not configured");
            attempts.push(StrategyAttempt {
                strategy: kind,
                error: StrategyError::NotConfigured,
            });
            continue;
        };

        info!(strategy, "trying credential strategy");
        match attempt(&source, env, http).await {
            Ok(credential) => {
                info!(
                    strategy,
                    credential = credential.kind().as_str(),
                    "authenticated"
                );
                return Ok(credential.with_source(strategy));
            }
            Err(error) => {
                match &error {
                    StrategyError::TokenFileMissing(path) => warn!(
                        strategy,
                        path = %path.display(),
                        "token file missing; interactive authentication required, trying next strategy"
                    ),
                    _ => warn!(strategy, error = %error, "strategy failed, trying next strategy"),
                }
                attempts.push(StrategyAttempt {
                    strategy: kind,
                    error,
                });
            }
        }
    }

    let err = Error::AuthExhausted { attempts };
    error!(error = %err, "no credential strategy succeeded");
    Err(err)
}
