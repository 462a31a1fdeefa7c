//! JustPremium header-bidding adapter.
//!
//! Builds one zone-keyed bid request per auction (or per slot in the
//! multi-request architecture) and matches the zone-keyed response back onto
//! the slot requests it was built from.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use error_stack::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auction::bid_transformer::{BidTransformer, BidTransformerConfig};
use crate::auction::conditions::compile_zone_conditions;
use crate::auction::matcher::ZoneBids;
use crate::auction::provider::{
    AdRegistration, LineItemKey, LineItemRegistration, PartnerAdapter, PriceTransform,
    RenderService, ScriptLoader, StatsEmitter,
};
use crate::auction::request::{distinct_zones, PageContext, RequestData, RequestObject};
use crate::auction::types::{
    size_key, BidResult, RawBid, SlotEvent, SlotRequest, SlotResult, TARGETING_TYPE_SLOT,
};
use crate::error::HtbError;
use crate::settings::Settings;

// ============================================================================
// Configuration
// ============================================================================

/// How creatives are keyed when registered for ad-server line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemType {
    IdAndSize,
    IdAndPrice,
    None,
}

/// Request architecture of the wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// Single request architecture.
    Sra,
    /// Full single request architecture.
    Fsra,
    /// Multi request architecture: one request per slot.
    Mra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackType {
    None,
    Id,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Ajax,
    Jsonp,
    Any,
}

/// Behaviour switches for response normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// Emit targeting keys and register creatives by line item.
    #[serde(default = "default_true")]
    pub gpt_line_items: bool,
    /// Attach the creative markup to the result.
    #[serde(default = "default_true")]
    pub return_creative: bool,
    /// Attach the transformed price to the result.
    #[serde(default = "default_true")]
    pub return_price: bool,
    /// Register the creative with the render service and attach the handle.
    #[serde(default = "default_true")]
    pub internal_render: bool,
    /// Treat a bid priced at or below zero as a pass.
    #[serde(default = "default_true")]
    pub zero_price_pass: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            gpt_line_items: true,
            return_creative: true,
            return_price: true,
            internal_render: true,
            zero_price_pass: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analytics {
    /// Emit a bid or pass event for every slot.
    #[serde(default = "default_true")]
    pub request_time: bool,
}

impl Default for Analytics {
    fn default() -> Self {
        Self { request_time: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DemandExpiry {
    #[serde(default)]
    pub enabled: bool,
    /// Lifetime of registered demand in milliseconds.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub value_ms: i64,
}

/// Ad-server targeting key names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TargetingKeys {
    /// Request identity.
    #[serde(default = "default_id_key")]
    #[validate(length(min = 1))]
    pub id: String,
    /// Open-market price.
    #[serde(default = "default_cpm_key")]
    #[validate(length(min = 1))]
    pub om: String,
    /// Deal price.
    #[serde(default = "default_cpm_key")]
    #[validate(length(min = 1))]
    pub pm: String,
    /// Deal id.
    #[serde(default = "default_deal_key")]
    #[validate(length(min = 1))]
    pub pmid: String,
}

impl Default for TargetingKeys {
    fn default() -> Self {
        Self {
            id: default_id_key(),
            om: default_cpm_key(),
            pm: default_cpm_key(),
            pmid: default_deal_key(),
        }
    }
}

/// Price transformers for ad-server targeting and reported price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Transformers {
    #[serde(default = "BidTransformerConfig::targeting_default")]
    #[validate(nested)]
    pub targeting: BidTransformerConfig,
    #[serde(default = "BidTransformerConfig::price_default")]
    #[validate(nested)]
    pub price: BidTransformerConfig,
}

impl Default for Transformers {
    fn default() -> Self {
        Self {
            targeting: BidTransformerConfig::targeting_default(),
            price: BidTransformerConfig::price_default(),
        }
    }
}

/// Configuration for the JustPremium adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct JustPremiumConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_partner_id")]
    #[validate(length(min = 1))]
    pub partner_id: String,

    /// Profile namespace reported to the wrapper. Not read by the adapter.
    #[serde(default = "default_partner_id")]
    #[validate(length(min = 1))]
    pub namespace: String,

    /// Short id used in stats and targeting key names. Profile only: the
    /// configured targeting keys already carry it.
    #[serde(default = "default_stats_id")]
    #[validate(length(min = 1))]
    pub stats_id: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Protocol-relative bid endpoint.
    #[serde(default = "default_endpoint")]
    #[validate(custom(function = "validate_protocol_relative"))]
    pub endpoint: String,

    /// Protocol-relative directory of the companion rendering script.
    #[serde(default = "default_loader_url")]
    #[validate(custom(function = "validate_protocol_relative"))]
    pub loader_url: String,

    #[serde(default = "default_loader_script")]
    #[validate(length(min = 1))]
    pub loader_script: String,

    /// Cookie whose value is spliced into the companion script path.
    #[serde(default = "default_loader_cookie")]
    pub loader_cookie: String,

    #[serde(default = "default_line_item_type")]
    pub line_item_type: LineItemType,

    #[serde(default = "default_architecture")]
    pub architecture: Architecture,

    /// How the wrapper routes the response back. Profile only.
    #[serde(default = "default_callback_type")]
    pub callback_type: CallbackType,

    /// Transport the wrapper uses for the request. Profile only.
    #[serde(default = "default_request_type")]
    pub request_type: RequestType,

    #[serde(default)]
    pub features: Features,

    #[serde(default)]
    pub analytics: Analytics,

    #[serde(default)]
    #[validate(nested)]
    pub demand_expiry: DemandExpiry,

    #[serde(default)]
    #[validate(nested)]
    pub targeting_keys: TargetingKeys,

    #[serde(default)]
    #[validate(nested)]
    pub transformers: Transformers,

    /// Publisher override of the targeting transformer.
    #[serde(default, alias = "bidTransformer", skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub bid_transformer: Option<BidTransformerConfig>,
}

fn default_true() -> bool {
    true
}

fn default_partner_id() -> String {
    "JustPremiumHtb".to_string()
}

fn default_stats_id() -> String {
    "JUSTP".to_string()
}

fn default_version() -> String {
    "2.0.0".to_string()
}

fn default_endpoint() -> String {
    "//pre.ads.justpremium.com/v/2.0/t/ixhr".to_string()
}

fn default_loader_url() -> String {
    "//cdn-cf.justpremium.com/js/".to_string()
}

fn default_loader_script() -> String {
    "jpx.js".to_string()
}

fn default_loader_cookie() -> String {
    "jpxhbjs".to_string()
}

fn default_line_item_type() -> LineItemType {
    LineItemType::IdAndSize
}

fn default_architecture() -> Architecture {
    Architecture::Fsra
}

fn default_callback_type() -> CallbackType {
    CallbackType::None
}

fn default_request_type() -> RequestType {
    RequestType::Ajax
}

fn default_id_key() -> String {
    "ix_justp_id".to_string()
}

fn default_cpm_key() -> String {
    "ix_justp_cpm".to_string()
}

fn default_deal_key() -> String {
    "ix_justp_dealid".to_string()
}

/// Accept `//host/path` urls, which take the page protocol at request time.
fn validate_protocol_relative(value: &str) -> Result<(), ValidationError> {
    let valid = value.starts_with("//") && url::Url::parse(&format!("https:{value}")).is_ok();
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("protocol_relative_url"))
    }
}

impl Default for JustPremiumConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            partner_id: default_partner_id(),
            namespace: default_partner_id(),
            stats_id: default_stats_id(),
            version: default_version(),
            endpoint: default_endpoint(),
            loader_url: default_loader_url(),
            loader_script: default_loader_script(),
            loader_cookie: default_loader_cookie(),
            line_item_type: default_line_item_type(),
            architecture: default_architecture(),
            callback_type: default_callback_type(),
            request_type: default_request_type(),
            features: Features::default(),
            analytics: Analytics::default(),
            demand_expiry: DemandExpiry::default(),
            targeting_keys: TargetingKeys::default(),
            transformers: Transformers::default(),
            bid_transformer: None,
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Wrapper services the adapter reports to.
#[derive(Clone)]
pub struct Services {
    pub render: Arc<dyn RenderService>,
    pub stats: Arc<dyn StatsEmitter>,
    pub scripts: Arc<dyn ScriptLoader>,
}

/// Resolve the targeting and price transformer configs.
///
/// A publisher override replaces the targeting config outright and carries its
/// input unit over to the price config, so both read prices the same way.
fn resolve_transformers(
    transformers: &Transformers,
    publisher: Option<&BidTransformerConfig>,
) -> (BidTransformerConfig, BidTransformerConfig) {
    match publisher {
        Some(targeting) => {
            let price = BidTransformerConfig {
                input_cents_multiplier: targeting.input_cents_multiplier,
                ..transformers.price.clone()
            };
            (targeting.clone(), price)
        }
        None => (transformers.targeting.clone(), transformers.price.clone()),
    }
}

/// JustPremium partner adapter.
pub struct JustPremiumAdapter {
    config: JustPremiumConfig,
    services: Services,
    targeting: BidTransformer,
    price: BidTransformer,
}

impl JustPremiumAdapter {
    #[must_use]
    pub fn new(config: JustPremiumConfig, services: Services) -> Self {
        let (targeting, price) =
            resolve_transformers(&config.transformers, config.bid_transformer.as_ref());

        Self {
            config,
            services,
            targeting: BidTransformer::new(targeting),
            price: BidTransformer::new(price),
        }
    }

    /// Apply a publisher `bidTransformer` from a partner config.
    #[must_use]
    pub fn with_bid_transformer(mut self, publisher: &BidTransformerConfig) -> Self {
        let (targeting, price) = resolve_transformers(&self.config.transformers, Some(publisher));
        self.targeting = BidTransformer::new(targeting);
        self.price = BidTransformer::new(price);
        self
    }

    #[must_use]
    pub fn config(&self) -> &JustPremiumConfig {
        &self.config
    }

    /// Url of the companion rendering script for this page.
    #[must_use]
    pub fn loader_script_url(&self, page: &PageContext) -> String {
        let version = page.cookie(&self.config.loader_cookie).unwrap_or_default();
        page.absolute_url(&format!(
            "{}{}{}",
            self.config.loader_url, version, self.config.loader_script
        ))
    }

    /// Build the bid requests the configured architecture calls for: one per
    /// slot for `mra`, otherwise a single request covering every slot.
    ///
    /// # Errors
    ///
    /// Returns an error if a request cannot be built.
    pub fn build_requests(
        &self,
        slots: &[SlotRequest],
        page: &PageContext,
    ) -> Result<Vec<RequestObject>, Report<HtbError>> {
        match self.config.architecture {
            Architecture::Mra => slots
                .chunks(1)
                .map(|slot| self.build_request(slot, page))
                .collect(),
            Architecture::Sra | Architecture::Fsra => Ok(vec![self.build_request(slots, page)?]),
        }
    }

    /// Pair each slot request with demand from the pool, in slot order.
    ///
    /// Every slot ends with a result. Claimed bids leave the pool, so bids
    /// still in it afterwards matched no slot.
    pub fn match_slots(&self, session_id: &str, bids: &mut ZoneBids, slots: &mut [SlotRequest]) {
        for slot in slots.iter_mut() {
            let result = match bids.take_matching(&slot.constraint) {
                None => {
                    log::debug!(
                        "No bid for slot {} on {}",
                        slot.x_slot_name,
                        slot.ht_slot_id
                    );
                    None
                }
                Some(bid) if self.config.features.zero_price_pass && bid.price <= 0.0 => {
                    log::debug!(
                        "Zero-price bid for slot {} on {} is a pass",
                        slot.x_slot_name,
                        slot.ht_slot_id
                    );
                    None
                }
                Some(bid) => Some(self.normalize(session_id, slot, &bid)),
            };

            slot.result = Some(match result {
                Some(bid) => SlotResult::Bid(bid),
                None => {
                    self.emit(session_id, SlotEvent::Pass, slot);
                    SlotResult::Pass
                }
            });
        }

        if !bids.is_empty() {
            log::debug!("{} bids matched no slot", bids.remaining());
        }
    }

    /// Convert a claimed bid into the wrapper's result shape, registering the
    /// creative with the render service as configured.
    fn normalize(&self, session_id: &str, slot: &SlotRequest, bid: &RawBid) -> BidResult {
        self.emit(session_id, SlotEvent::Bid, slot);

        let size = bid.size();
        let creative = bid.adm.clone().unwrap_or_default();
        let features = &self.config.features;
        let mut targeting = BTreeMap::new();

        if features.gpt_line_items {
            let cpm = self.targeting.apply(bid.price);
            let size_label = size_key(size);
            let keys = &self.config.targeting_keys;

            if let Some(deal_id) = &bid.deal_id {
                targeting.insert(keys.pmid.clone(), vec![format!("{size_label}_{deal_id}")]);
                targeting.insert(keys.pm.clone(), vec![format!("{size_label}_{cpm}")]);
            } else {
                targeting.insert(keys.om.clone(), vec![format!("{size_label}_{cpm}")]);
            }
            targeting.insert(keys.id.clone(), vec![slot.request_id.clone()]);

            let key = match self.config.line_item_type {
                LineItemType::IdAndSize => Some(LineItemKey::Size(size)),
                LineItemType::IdAndPrice => Some(LineItemKey::Price(cpm)),
                LineItemType::None => None,
            };
            if let Some(key) = key {
                let handle = self.services.render.register_ad_by_line_item(&LineItemRegistration {
                    ad: self.registration(session_id, &creative),
                    request_id: slot.request_id.clone(),
                    key,
                });
                log::debug!("Registered line item {} for {}", handle, slot.request_id);
            }
        }

        let price = features
            .return_price
            .then(|| self.price.apply(bid.price).parse().unwrap_or(f64::NAN));

        let pub_kit_ad_id = features.internal_render.then(|| {
            self.services
                .render
                .register_ad(&self.registration(session_id, &creative))
        });

        log::info!(
            "Bid for slot {}: {} {} at {}",
            slot.x_slot_name,
            bid.format.as_deref().unwrap_or("-"),
            size_key(size),
            bid.price
        );

        BidResult {
            size,
            targeting_type: TARGETING_TYPE_SLOT.to_string(),
            targeting,
            price,
            adm: if features.return_creative {
                bid.adm.clone()
            } else {
                None
            },
            pub_kit_ad_id,
        }
    }

    fn registration(&self, session_id: &str, creative: &str) -> AdRegistration {
        AdRegistration {
            session_id: session_id.to_string(),
            partner_id: self.config.partner_id.clone(),
            creative: creative.to_string(),
            pixel_url: String::new(),
            expiry_ms: self.expiry_ms(),
        }
    }

    fn expiry_ms(&self) -> i64 {
        if self.config.demand_expiry.enabled {
            Utc::now().timestamp_millis() + self.config.demand_expiry.value_ms
        } else {
            0
        }
    }

    fn emit(&self, session_id: &str, event: SlotEvent, slot: &SlotRequest) {
        if self.config.analytics.request_time {
            self.services
                .stats
                .emit(session_id, event, &slot.header_stats());
        }
    }
}

impl PartnerAdapter for JustPremiumAdapter {
    fn partner_id(&self) -> &str {
        &self.config.partner_id
    }

    fn build_request(
        &self,
        slots: &[SlotRequest],
        page: &PageContext,
    ) -> Result<RequestObject, Report<HtbError>> {
        let script = self.loader_script_url(page);
        log::debug!("Loading companion script {}", script);
        self.services.scripts.load_script(&script);

        let conditions = compile_zone_conditions(slots.iter().map(|slot| &slot.constraint));
        let encoded = conditions.to_json()?;
        log::trace!("Zone conditions: {}", encoded);

        let data = RequestData {
            hostname: page.hostname.clone(),
            protocol: page.scheme().to_string(),
            sw: page.screen_width,
            sh: page.screen_height,
            ww: page.viewport_width,
            wh: page.viewport_height,
            i: Utc::now().timestamp_millis(),
            zones: distinct_zones(slots),
            c: urlencoding::encode(&encoded).into_owned(),
        };

        let request = RequestObject {
            url: page.absolute_url(&self.config.endpoint),
            data,
            callback_id: Uuid::new_v4().to_string(),
        };

        log::info!(
            "Built JustPremium request for {} slots across {} zones",
            slots.len(),
            request.data.zones.len()
        );

        Ok(request)
    }

    fn parse_response(&self, session_id: &str, response: &Json, slots: &mut [SlotRequest]) {
        let mut bids = ZoneBids::from_json(response);
        self.match_slots(session_id, &mut bids, slots);
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Create the adapters enabled in `settings`.
#[must_use]
pub fn register_adapters(settings: &Settings, services: &Services) -> Vec<Arc<dyn PartnerAdapter>> {
    let mut adapters: Vec<Arc<dyn PartnerAdapter>> = Vec::new();

    let config = &settings.justpremium;
    if config.enabled {
        log::info!(
            "Registering JustPremium adapter (partner_id: {}, endpoint: {})",
            config.partner_id,
            config.endpoint
        );
        adapters.push(Arc::new(JustPremiumAdapter::new(
            config.clone(),
            services.clone(),
        )));
    } else {
        log::debug!("JustPremium integration is disabled");
    }

    adapters
}

// ============================================================================
// Tests
// ============================================================================
