//! In-memory collaborators that record every call.
//!
//! Used by the offline CLI to show what a live wrapper would have received,
//! and by tests to assert on side effects.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use super::provider::{
    AdRegistration, LineItemRegistration, RenderService, ScriptLoader, StatsEmitter,
};
use super::types::{HeaderStats, SlotEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Render service that hands out sequential handles.
#[derive(Debug, Default)]
pub struct RecordingRenderService {
    next_handle: AtomicUsize,
    ads: Mutex<Vec<AdRegistration>>,
    line_items: Mutex<Vec<LineItemRegistration>>,
}

impl RecordingRenderService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, prefix: &str) -> String {
        let n = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{n}")
    }

    #[must_use]
    pub fn ads(&self) -> Vec<AdRegistration> {
        lock(&self.ads).clone()
    }

    #[must_use]
    pub fn line_items(&self) -> Vec<LineItemRegistration> {
        lock(&self.line_items).clone()
    }
}

impl RenderService for RecordingRenderService {
    fn register_ad(&self, ad: &AdRegistration) -> String {
        lock(&self.ads).push(ad.clone());
        self.handle("ad")
    }

    fn register_ad_by_line_item(&self, ad: &LineItemRegistration) -> String {
        lock(&self.line_items).push(ad.clone());
        self.handle("li")
    }
}

/// One recorded analytics event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    pub session_id: String,
    pub event: SlotEvent,
    pub stats: HeaderStats,
}

#[derive(Debug, Default)]
pub struct RecordingStatsEmitter {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingStatsEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        lock(&self.events).clone()
    }
}

impl StatsEmitter for RecordingStatsEmitter {
    fn emit(&self, session_id: &str, event: SlotEvent, stats: &HeaderStats) {
        log::trace!("stats event {} for session {}", event.as_str(), session_id);
        lock(&self.events).push(RecordedEvent {
            session_id: session_id.to_string(),
            event,
            stats: stats.clone(),
        });
    }
}

#[derive(Debug, Default)]
pub struct RecordingScriptLoader {
    urls: Mutex<Vec<String>>,
}

impl RecordingScriptLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        lock(&self.urls).clone()
    }
}

impl ScriptLoader for RecordingScriptLoader {
    fn load_script(&self, url: &str) {
        lock(&self.urls).push(url.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::provider::LineItemKey;

    fn registration() -> AdRegistration {
        AdRegistration {
            session_id: "s1".to_string(),
            partner_id: "JustPremiumHtb".to_string(),
            creative: "<div></div>".to_string(),
            pixel_url: String::new(),
            expiry_ms: 0,
        }
    }

    #[test]
    fn test_render_handles_are_unique() {
        let render = RecordingRenderService::new();
        let first = render.register_ad(&registration());
        let second = render.register_ad_by_line_item(&LineItemRegistration {
            ad: registration(),
            request_id: "_r1".to_string(),
            key: LineItemKey::Size([300.0, 250.0]),
        });

        assert_eq!(first, "ad-1");
        assert_eq!(second, "li-2");
        assert_eq!(render.ads().len(), 1);
        assert_eq!(render.line_items()[0].request_id, "_r1");
    }

    #[test]
    fn test_stats_and_scripts_are_recorded() {
        let stats = RecordingStatsEmitter::new();
        stats.emit("s1", SlotEvent::Pass, &HeaderStats::default());
        assert_eq!(stats.events()[0].event, SlotEvent::Pass);

        let scripts = RecordingScriptLoader::new();
        scripts.load_script("https://cdn.example/jpx.js");
        assert_eq!(scripts.urls(), vec!["https://cdn.example/jpx.js"]);
    }
}
