//! Ordered credential resolution
//!
//! Tries six credential strategies in a fixed order and settles on the first
//! one that yields a usable credential:
//!
//! 1. `CREDENTIALS_CONFIG`: base64 service account key
//! 2. `SERVICE_ACCOUNT_PATH`: service account key file
//! 3. `GOOGLE_SHEETS_ACCESS_TOKEN` + client: token handed over directly
//! 4. client + `TOKEN_PATH`: persisted OAuth token file
//! 5. `CREDENTIALS_PATH` + `TOKEN_PATH`: legacy client-secrets file
//! 6. application default credentials
//!
//! Strategies that are not configured are skipped. Strategies that fail
//! are logged and the chain moves on. Only when all six come up empty does
//! `resolve` return `Error::AuthExhausted`.

pub mod env;
pub mod error;
pub mod resolver;
pub mod source;
pub mod strategy;

pub use env::AuthEnv;
pub use error::{Error, Result, StrategyAttempt, StrategyError};
pub use resolver::resolve;
pub use source::{CredentialSource, StrategyKind};
