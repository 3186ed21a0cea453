//! Interactive OAuth login
//!
//! `google-sheets-mcp login` runs the installed-app authorization code flow
//! with PKCE and writes the resulting token record to `TOKEN_PATH`, which is
//! what the token-file strategies read on the next start.

use anyhow::{Context, Result, anyhow, bail};
use auth_chain::AuthEnv;
use google_auth::{
    DEFAULT_REDIRECT_URI, OAuthClient, TokenFile, TokenRecord, build_authorization_url,
    compute_challenge, exchange_code, generate_state, generate_verifier, load_client_secrets,
    now_millis,
};
use reqwest::Url;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

/// OAuth client from `GOOGLE_SHEETS_CLIENT_ID`/`SECRET`, else the client-secrets file.
pub async fn oauth_client(env: &AuthEnv) -> Result<OAuthClient> {
    let client = match (&env.client_id, &env.client_secret) {
        (Some(id), Some(secret)) => OAuthClient::new(id.clone(), secret.clone(), DEFAULT_REDIRECT_URI),
        _ => load_client_secrets(&env.credentials_path).await.with_context(|| {
            format!(
                "no OAuth client configured: set {} and {}, or provide {}",
                auth_chain::env::CLIENT_ID,
                auth_chain::env::CLIENT_SECRET,
                env.credentials_path.display()
            )
        })?,
    };
    Ok(client.with_token_url(env.token_url.clone()))
}

/// Pull the authorization code out of what the user pasted.
///
/// Accepts the bare code or the full redirect URL. A redirect URL must carry
/// the state that was sent, and an `error` parameter aborts the login.
pub fn extract_code(input: &str, expected_state: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        bail!("no authorization code entered");
    }

    if !(input.starts_with("http://") || input.starts_with("https://")) {
        return Ok(input.to_string());
    }

    let url = Url::parse(input).context("invalid redirect URL")?;
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = param("error") {
        bail!("authorization was denied: {error}");
    }
    if let Some(state) = param("state")
        && state != expected_state
    {
        bail!("state mismatch in redirect URL; start the login again");
    }
    param("code")
        .filter(|c| !c.is_empty())
        .ok_or_else(|| anyhow!("redirect URL has no code parameter"))
}

/// Run the flow: print the URL to `output`, read the code from `input`,
/// exchange it and persist the token.
pub async fn run<R, W>(
    env: &AuthEnv,
    http: &reqwest::Client,
    mut input: R,
    mut output: W,
) -> Result<TokenRecord>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let oauth = oauth_client(env).await?;
    let verifier = generate_verifier();
    let state = generate_state();
    let url = build_authorization_url(&oauth, &state, &compute_challenge(&verifier))?;

    let prompt = format!(
        "Open this URL in a browser and authorize access:\n\n{url}\n\n\
         Paste the authorization code or the full redirect URL: "
    );
    output.write_all(prompt.as_bytes()).await?;
    output.flush().await?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .await
        .context("failed to read authorization code")?;
    let code = extract_code(&line, &state)?;

    let response = exchange_code(http, &oauth, &code, &verifier)
        .await
        .context("authorization code exchange failed")?;
    let record = TokenRecord::from_response(response, now_millis());
    if !record.is_refreshable() {
        tracing::warn!("Google returned no refresh token; the saved token cannot be renewed");
    }

    let token_file = TokenFile::new(&env.token_path);
    token_file
        .save(&record)
        .await
        .with_context(|| format!("failed to write {}", token_file.path().display()))?;
    info!(path = %token_file.path().display(), "token saved");

    output
        .write_all(format!("\nToken saved to {}\n", token_file.path().display()).as_bytes())
        .await?;
    output.flush().await?;
    Ok(record)
}
