//! Google OAuth and service account authentication
//!
//! Primitives for every way this server can obtain a Google access token:
//! service account JWT grants, OAuth user tokens (exchange, refresh and the
//! on-disk token file), the legacy client-secrets file, and application
//! default credentials including the metadata server. Each path ends in a
//! `ResolvedCredential` that hands out bearer tokens for API calls.
//!
//! This crate only knows how to use a credential source. Choosing which
//! source to use is the job of `auth-chain`.

pub mod ambient;
pub mod client_secrets;
pub mod constants;
pub mod credential;
pub mod error;
pub mod pkce;
pub mod service_account;
pub mod token;
pub mod token_file;

pub use ambient::{AmbientConfig, discover};
pub use client_secrets::{OAuthClient, load_client_secrets, parse_client_secrets};
pub use constants::*;
pub use credential::{CredentialKind, ResolvedCredential};
pub use error::{Error, Result};
pub use pkce::{build_authorization_url, compute_challenge, generate_state, generate_verifier};
pub use service_account::ServiceAccountKey;
pub use token::{TokenRecord, TokenResponse, exchange_code, now_millis, refresh_token};
pub use token_file::TokenFile;
