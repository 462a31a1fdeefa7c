//! Trait definitions for partner adapters and the wrapper services they use.

use error_stack::Report;
use serde::Serialize;
use serde_json::Value as Json;

use crate::error::HtbError;

use super::request::{PageContext, RequestObject};
use super::types::{HeaderStats, SlotEvent, SlotRequest};

/// Trait implemented by every partner adapter.
pub trait PartnerAdapter: Send + Sync {
    /// Partner identifier (e.g., "JustPremiumHtb").
    fn partner_id(&self) -> &str;

    /// Build the outbound bid request for the given slot requests.
    ///
    /// Implementations may trigger fire-and-forget side effects such as loading
    /// a companion rendering script.
    fn build_request(
        &self,
        slots: &[SlotRequest],
        page: &PageContext,
    ) -> Result<RequestObject, Report<HtbError>>;

    /// Attach demand from a raw response payload to each slot request.
    ///
    /// Every slot ends with a result: missing or malformed demand is a pass.
    fn parse_response(&self, session_id: &str, response: &Json, slots: &mut [SlotRequest]);

    /// Check if this adapter is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Converts a raw bid price into the string form expected downstream.
pub trait PriceTransform: Send + Sync {
    fn apply(&self, price: f64) -> String;
}

/// Creative registration for wrapper-side rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdRegistration {
    pub session_id: String,
    pub partner_id: String,
    /// Markup written into the ad frame on render.
    pub creative: String,
    /// Tracking pixel fired on render, empty when unused.
    pub pixel_url: String,
    /// Epoch milliseconds after which the ad is stale, 0 for no expiry.
    pub expiry_ms: i64,
}

/// How a line-item registration is keyed in the ad server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKey {
    Size([f64; 2]),
    Price(String),
}

/// Creative registration addressed by request id plus size or price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemRegistration {
    pub ad: AdRegistration,
    pub request_id: String,
    pub key: LineItemKey,
}

/// Wrapper render service. Both calls return an opaque render handle.
pub trait RenderService: Send + Sync {
    fn register_ad(&self, ad: &AdRegistration) -> String;

    fn register_ad_by_line_item(&self, ad: &LineItemRegistration) -> String;
}

/// Wrapper analytics sink.
pub trait StatsEmitter: Send + Sync {
    fn emit(&self, session_id: &str, event: SlotEvent, stats: &HeaderStats);
}

/// Loads a script into the page without waiting for it.
pub trait ScriptLoader: Send + Sync {
    fn load_script(&self, url: &str);
}
