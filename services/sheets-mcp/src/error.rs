//! Service-specific error types

use thiserror::Error;

use crate::protocol::{INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND};

/// Errors raised while serving a tool call or resource read.
///
/// Each variant maps to a JSON-RPC error code; none of them end the server.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid resource URI: {0}. Expected format: spreadsheet://{{spreadsheet_id}}/info")]
    InvalidResource(String),

    #[error("authorization failed: {0}")]
    Provider(#[from] provider::ProviderError),

    #[error("request to Google failed: {0}")]
    Http(String),

    #[error("Google API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i64 {
        match self {
            Error::InvalidParams(_) => INVALID_PARAMS,
            Error::UnknownTool(_) => METHOD_NOT_FOUND,
            Error::InvalidResource(_) => INVALID_REQUEST,
            Error::Provider(_) | Error::Http(_) | Error::Api { .. } | Error::Internal(_) => {
                INTERNAL_ERROR
            }
        }
    }
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
