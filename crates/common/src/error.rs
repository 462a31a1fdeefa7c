//! Error types for the header-bidding adapter.
//!
//! The matching core never fails: missing demand degrades to a pass. Errors
//! only come from the surrounding layers (settings, request encoding,
//! response decoding) and travel as [`error_stack::Report`]s so callers keep
//! the full context chain.

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum HtbError {
    /// Settings could not be loaded, merged, or validated.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// The outbound bid request could not be built.
    #[display("Request error: {message}")]
    Request { message: String },

    /// A response or partner payload could not be decoded.
    #[display("Response error: {message}")]
    Response { message: String },
}
