//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used by the interactive
//! `login` flow. The verifier stays local and is sent during code exchange;
//! the challenge goes into the authorization URL so Google can tie the
//! exchange back to the party that started the flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::client_secrets::OAuthClient;
use crate::constants::{AUTHORIZE_ENDPOINT, scope_string};
use crate::error::{Error, Result};

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encoded as URL-safe base64 (no padding) gives 86
/// characters, inside the 43-128 range RFC 7636 allows.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an opaque `state` value for CSRF protection.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the Google authorization URL for `oauth`.
///
/// Requests offline access with a forced consent prompt so the exchange
/// always returns a refresh token, even for a previously authorized client.
pub fn build_authorization_url(oauth: &OAuthClient, state: &str, challenge: &str) -> Result<Url> {
    let scope = scope_string();
    Url::parse_with_params(
        AUTHORIZE_ENDPOINT,
        &[
            ("client_id", oauth.client_id.as_str()),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("state", state),
        ],
    )
    .map_err(|e| Error::CredentialParse(format!("building authorization URL: {e}")))
}
