//! Zone-condition compilation, bid matching and the collaborator traits a
//! partner adapter is written against.
//!
//! The adapter itself lives in `crate::integrations::justpremium`.

pub mod bid_transformer;
pub mod conditions;
pub mod matcher;
pub mod partner_config;
pub mod provider;
pub mod recording;
pub mod request;
pub mod types;
pub mod zone;

pub use bid_transformer::{BidTransformer, BidTransformerConfig};
pub use conditions::{compile_zone_conditions, ZoneCondition, ZoneConditions};
pub use matcher::ZoneBids;
pub use partner_config::PartnerConfig;
pub use provider::{PartnerAdapter, PriceTransform, RenderService, ScriptLoader, StatsEmitter};
pub use request::{PageContext, RequestObject};
pub use types::{BidResult, RawBid, SlotConstraint, SlotRequest, SlotResult};
pub use zone::ZoneId;
