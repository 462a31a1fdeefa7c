//! Command implementations. Each returns the JSON (or TOML) to print.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use justpremium_htb_common::auction::matcher::parse_payload;
use justpremium_htb_common::auction::provider::{AdRegistration, LineItemRegistration};
use justpremium_htb_common::auction::recording::{
    RecordedEvent, RecordingRenderService, RecordingScriptLoader, RecordingStatsEmitter,
};
use justpremium_htb_common::auction::{
    compile_zone_conditions, PageContext, PartnerAdapter, PartnerConfig, RequestObject,
    SlotRequest,
};
use justpremium_htb_common::integrations::{JustPremiumAdapter, Services};
use justpremium_htb_common::settings::Settings;
use serde::Serialize;
use validator::Validate;

use crate::error::CliError;

/// Load settings from `file`, or the embedded settings when absent.
///
/// Environment variables prefixed with `JUSTPREMIUM_HTB__` override values
/// from either source.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the settings are invalid.
pub fn load_settings(file: Option<&Path>) -> Result<Settings, CliError> {
    let settings = match file {
        Some(file) => {
            log::debug!("Loading settings from {}", file.display());
            let content = fs::read_to_string(file)?;
            Settings::from_toml(&content)?
        }
        None => Settings::new()?,
    };

    settings
        .validate()
        .map_err(|e| CliError::Config(format!("Settings validation failed: {e}")))?;

    Ok(settings)
}

fn load_partner_config(file: &Path) -> Result<PartnerConfig, CliError> {
    let content = fs::read_to_string(file)?;
    Ok(PartnerConfig::from_json_str(&content)?)
}

/// Recording services plus the adapter wired to them.
struct Harness {
    render: Arc<RecordingRenderService>,
    stats: Arc<RecordingStatsEmitter>,
    scripts: Arc<RecordingScriptLoader>,
    adapter: JustPremiumAdapter,
}

impl Harness {
    fn new(settings: &Settings, partner: &PartnerConfig) -> Result<Self, CliError> {
        let render = Arc::new(RecordingRenderService::new());
        let stats = Arc::new(RecordingStatsEmitter::new());
        let scripts = Arc::new(RecordingScriptLoader::new());

        let services = Services {
            render: render.clone(),
            stats: stats.clone(),
            scripts: scripts.clone(),
        };

        let mut adapter = JustPremiumAdapter::new(settings.justpremium.clone(), services);
        if !adapter.is_enabled() {
            return Err(CliError::Config(
                "JustPremium integration is disabled in settings".to_string(),
            ));
        }
        if let Some(transformer) = &partner.bid_transformer {
            adapter = adapter.with_bid_transformer(transformer);
        }

        Ok(Self {
            render,
            stats,
            scripts,
            adapter,
        })
    }
}

/// Compiled zone conditions as JSON.
///
/// # Errors
///
/// Returns an error if the partner config cannot be loaded.
pub fn conditions(partner_config: &Path) -> Result<String, CliError> {
    let partner = load_partner_config(partner_config)?;
    let slots = partner.slot_requests();

    let conditions = compile_zone_conditions(slots.iter().map(|slot| &slot.constraint));
    log::info!(
        "Compiled {} zone conditions from {} slots",
        conditions.len(),
        slots.len()
    );

    Ok(serde_json::to_string_pretty(&conditions)?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuiltRequest {
    #[serde(flatten)]
    request: RequestObject,
    full_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestReport {
    slots: Vec<SlotRequest>,
    requests: Vec<BuiltRequest>,
    scripts: Vec<String>,
}

/// Bid requests for a partner config, with the scripts the adapter loaded.
///
/// # Errors
///
/// Returns an error if an input cannot be loaded or a request cannot be built.
pub fn request(
    settings: &Settings,
    partner_config: &Path,
    page: &PageContext,
) -> Result<String, CliError> {
    let partner = load_partner_config(partner_config)?;
    let harness = Harness::new(settings, &partner)?;
    let slots = partner.slot_requests();

    let requests = harness
        .adapter
        .build_requests(&slots, page)?
        .into_iter()
        .map(|request| {
            let full_url = request.full_url()?;
            Ok(BuiltRequest { request, full_url })
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    let report = RequestReport {
        slots,
        requests,
        scripts: harness.scripts.urls(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseReport {
    slots: Vec<SlotRequest>,
    events: Vec<RecordedEvent>,
    ads: Vec<AdRegistration>,
    line_items: Vec<LineItemRegistration>,
}

/// Slot results for a recorded response, with every collaborator call.
///
/// # Errors
///
/// Returns an error if an input cannot be loaded or the response is not JSON.
pub fn parse(
    settings: &Settings,
    partner_config: &Path,
    response: &Path,
    session_id: &str,
) -> Result<String, CliError> {
    let partner = load_partner_config(partner_config)?;
    let harness = Harness::new(settings, &partner)?;
    let mut slots = partner.slot_requests();

    let body = fs::read_to_string(response)?;
    let payload = parse_payload(&body)?;
    harness
        .adapter
        .parse_response(session_id, &payload, &mut slots);

    let bids = slots.iter().filter(|slot| slot.bid().is_some()).count();
    log::info!("{} of {} slots received a bid", bids, slots.len());

    let report = ParseReport {
        slots,
        events: harness.stats.events(),
        ads: harness.render.ads(),
        line_items: harness.render.line_items(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Effective settings as TOML.
///
/// # Errors
///
/// Returns an error if the settings cannot be encoded.
pub fn settings(settings: &Settings) -> Result<String, CliError> {
    Ok(toml::to_string_pretty(settings)?)
}
