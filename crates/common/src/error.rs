//! Common error types

use std::path::PathBuf;

use thiserror::Error;

/// Common error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let config_err = Error::Config("http.timeout_secs must be greater than 0".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: http.timeout_secs must be greater than 0"
        );

        let missing = Error::MissingFile(PathBuf::from("/etc/sheets.toml"));
        assert_eq!(
            missing.to_string(),
            "Configuration file not found: /etc/sheets.toml"
        );

        let io_err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(io_err.to_string().starts_with("I/O error:"), "got: {io_err}");
    }

    #[test]
    fn toml_errors_convert() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("not valid {{{{ toml");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Toml(_)));
    }
}
