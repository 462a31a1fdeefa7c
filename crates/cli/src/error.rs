//! CLI error types.

use std::fmt;

use error_stack::Report;
use justpremium_htb_common::error::HtbError;

#[derive(Debug)]
pub enum CliError {
    /// Settings or partner config error
    Config(String),
    /// Adapter failed to build a request or decode a response
    Adapter(String),
    /// IO error
    Io(std::io::Error),
    /// JSON encoding error
    Json(String),
    /// TOML encoding error
    Toml(String),
    /// Logger could not be installed
    Logging(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Adapter(msg) => write!(f, "Adapter error: {}", msg),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Json(msg) => write!(f, "JSON error: {}", msg),
            CliError::Toml(msg) => write!(f, "TOML error: {}", msg),
            CliError::Logging(msg) => write!(f, "Logging error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Json(err.to_string())
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        CliError::Toml(err.to_string())
    }
}

impl From<Report<HtbError>> for CliError {
    fn from(report: Report<HtbError>) -> Self {
        match report.current_context() {
            HtbError::Configuration { .. } => CliError::Config(format!("{:?}", report)),
            HtbError::Request { .. } | HtbError::Response { .. } => {
                CliError::Adapter(format!("{:?}", report))
            }
        }
    }
}
