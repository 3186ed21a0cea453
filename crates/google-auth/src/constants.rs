//! Google OAuth constants
//!
//! Public endpoints and the fixed scope set. None of these are secrets;
//! client secrets and tokens come from configuration at runtime.

/// Scopes requested by every strategy: spreadsheet read/write plus
/// access to files this application created or opened.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

/// Authorization endpoint for the interactive installed-app flow
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Token endpoint for code exchange, refresh and JWT bearer grants
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Redirect URI used when the client is configured from environment variables
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// Grant type for service-account JWT assertions (RFC 7523)
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for service-account assertions, in seconds
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Cached tokens are treated as expired this many milliseconds early
pub const EXPIRY_SKEW_MILLIS: i64 = 60_000;

/// Host of the instance metadata server
pub const METADATA_HOST: &str = "metadata.google.internal";

/// Required header for every metadata server request
pub const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";

/// Value of the metadata flavor header
pub const METADATA_FLAVOR: &str = "Google";

/// Timeout for the metadata probe; the server only exists on Google hosting
pub const METADATA_TIMEOUT_SECS: u64 = 3;

/// File name of gcloud's application default credentials
pub const WELL_KNOWN_CREDENTIALS_FILE: &str = "application_default_credentials.json";

/// Space-separated scope string for request parameters and token records.
pub fn scope_string() -> String {
    SCOPES.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_cover_sheets_and_drive_file() {
        assert_eq!(
            scope_string(),
            "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.file"
        );
    }

    #[test]
    fn endpoints_are_google_oauth2() {
        assert_eq!(TOKEN_ENDPOINT, "https://oauth2.googleapis.com/token");
        assert_eq!(
            AUTHORIZE_ENDPOINT,
            "https://accounts.google.com/o/oauth2/v2/auth"
        );
    }
}
