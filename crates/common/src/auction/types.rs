//! Core types for slot requests, raw bids and normalized results.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

use super::zone::ZoneId;

/// Targeting type reported for every JustPremium result.
pub const TARGETING_TYPE_SLOT: &str = "slot";

/// One publisher ad slot's eligibility rule for one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotConstraint {
    /// `None` when the configured value has no leading integer; such a slot
    /// never matches a zone.
    #[serde(default, deserialize_with = "lenient_zone")]
    pub zone_id: Option<ZoneId>,
    /// When non-empty only these formats are eligible.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub allow: Vec<String>,
    /// Consulted only when `allow` is empty.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub exclude: Vec<String>,
}

impl SlotConstraint {
    #[must_use]
    pub fn new(zone_id: impl Into<ZoneId>) -> Self {
        Self {
            zone_id: Some(zone_id.into()),
            allow: Vec::new(),
            exclude: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_allow<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = formats.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_exclude<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = formats.into_iter().map(Into::into).collect();
        self
    }

    /// True when the slot places no format restriction on its zone.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.allow.is_empty() && self.exclude.is_empty()
    }

    /// Check a bid format against this slot's allow/exclude lists.
    ///
    /// A non-empty allow list wins over the exclude list. A bid without a
    /// format never satisfies an allow list and never hits an exclude list.
    #[must_use]
    pub fn accepts(&self, format: Option<&str>) -> bool {
        if !self.allow.is_empty() {
            return format.is_some_and(|f| self.allow.iter().any(|a| a == f));
        }

        if !self.exclude.is_empty() {
            return format.map_or(true, |f| !self.exclude.iter().any(|e| e == f));
        }

        true
    }
}

/// One outstanding request for demand on a publisher slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRequest {
    /// Rendering-surface id of the wrapper slot.
    pub ht_slot_id: String,
    /// Name of the partner slot mapped onto it.
    pub x_slot_name: String,
    /// Wrapper-generated id used as the `id` targeting value.
    pub request_id: String,
    pub constraint: SlotConstraint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SlotResult>,
}

impl SlotRequest {
    #[must_use]
    pub fn new(
        ht_slot_id: impl Into<String>,
        x_slot_name: impl Into<String>,
        request_id: impl Into<String>,
        constraint: SlotConstraint,
    ) -> Self {
        Self {
            ht_slot_id: ht_slot_id.into(),
            x_slot_name: x_slot_name.into(),
            request_id: request_id.into(),
            constraint,
            result: None,
        }
    }

    /// Header-stats payload identifying this slot in analytics events.
    #[must_use]
    pub fn header_stats(&self) -> HeaderStats {
        HeaderStats(BTreeMap::from([(
            self.ht_slot_id.clone(),
            vec![self.x_slot_name.clone()],
        )]))
    }

    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self.result, Some(SlotResult::Pass))
    }

    #[must_use]
    pub fn bid(&self) -> Option<&BidResult> {
        match &self.result {
            Some(SlotResult::Bid(bid)) => Some(bid),
            _ => None,
        }
    }
}

/// One candidate bid returned for a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBid {
    #[serde(
        rename = "zoneId",
        default,
        deserialize_with = "lenient_zone",
        skip_serializing_if = "Option::is_none"
    )]
    pub zone_id: Option<ZoneId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub format: Option<String>,
    #[serde(default = "not_a_number", deserialize_with = "lenient_number")]
    pub price: f64,
    #[serde(default = "not_a_number", deserialize_with = "lenient_number")]
    pub width: f64,
    #[serde(default = "not_a_number", deserialize_with = "lenient_number")]
    pub height: f64,
    /// Creative markup. Anything other than a string is treated as absent.
    #[serde(default, deserialize_with = "lenient_markup")]
    pub adm: Option<String>,
    #[serde(
        rename = "dealid",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub deal_id: Option<String>,
    #[serde(
        rename = "requestRef",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_ref: Option<String>,
}

impl RawBid {
    #[must_use]
    pub fn size(&self) -> [f64; 2] {
        [self.width, self.height]
    }
}

/// Outcome attached to a slot request after response parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SlotResult {
    Pass,
    Bid(BidResult),
}

/// Normalized demand for one slot in the wrapper's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResult {
    pub size: [f64; 2],
    pub targeting_type: String,
    /// Ad-server targeting, every value a single-element list.
    pub targeting: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    /// Handle returned by internal render registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_kit_ad_id: Option<String>,
}

/// Analytics payload: wrapper slot id to the partner slot names involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct HeaderStats(pub BTreeMap<String, Vec<String>>);

/// Per-slot analytics outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotEvent {
    #[serde(rename = "hs_slot_bid")]
    Bid,
    #[serde(rename = "hs_slot_pass")]
    Pass,
}

impl SlotEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SlotEvent::Bid => "hs_slot_bid",
            SlotEvent::Pass => "hs_slot_pass",
        }
    }
}

/// Format a size as the `WIDTHxHEIGHT` key used in targeting values.
#[must_use]
pub fn size_key(size: [f64; 2]) -> String {
    format!("{}x{}", size[0], size[1])
}

fn not_a_number() -> f64 {
    f64::NAN
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Numeric coercion for payload fields: numbers pass through, numeric
/// strings are parsed, blank strings and `null` become 0, anything else NaN.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_number(&Json::deserialize(deserializer)?))
}

pub(crate) fn coerce_number(value: &Json) -> f64 {
    match value {
        Json::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Json::String(s) if s.trim().is_empty() => 0.0,
        Json::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Json::Bool(b) => f64::from(u8::from(*b)),
        Json::Null => 0.0,
        Json::Array(_) | Json::Object(_) => f64::NAN,
    }
}

/// Strings and numbers become `Some`; empty strings, zero and other JSON
/// types are treated as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Json::deserialize(deserializer)? {
        Json::String(s) if !s.is_empty() => Some(s),
        Json::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_markup<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Json::deserialize(deserializer)? {
        Json::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_zone<'de, D>(deserializer: D) -> Result<Option<ZoneId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Json::deserialize(deserializer)? {
        Json::String(s) => ZoneId::parse(&s),
        Json::Number(n) => n.as_f64().and_then(ZoneId::from_f64),
        _ => None,
    })
}
