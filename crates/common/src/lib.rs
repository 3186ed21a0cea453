//! Common types shared by the Google Sheets MCP workspace

pub mod env;
mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
