//! Tab records — the pairing of an identity, a surface, and the mutable
//! display metadata the UI renders for it.
//!
//! The metadata is the single source of truth for "what should the UI show
//! for this tab right now". It is mutated only by surface lifecycle events
//! and by explicit zoom commands; navigation results arrive asynchronously
//! through events, never through command return values.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::surface::{self, Surface, SurfaceEvent};

/// Title shown until the first title-changed event arrives.
pub const PLACEHOLDER_TITLE: &str = "New Tab";

/// Blank URL sentinel: the no-navigation "home" state. Creating a tab at
/// home issues no network request.
pub const HOME_URL: &str = "";

pub const ZOOM_MIN: f64 = 0.3;
pub const ZOOM_MAX: f64 = 3.0;

/// Stable identifier for a tab, unique within its window for the window's
/// lifetime.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display metadata for one tab, pushed whole to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabMeta {
    pub id: TabId,
    pub title: String,
    pub url: String,
    pub loading: bool,
    pub favicon: Option<String>,
    pub zoom: f64,
}

impl TabMeta {
    pub(crate) fn new(id: TabId, url: &str, zoom: f64) -> Self {
        Self {
            id,
            title: PLACEHOLDER_TITLE.to_string(),
            url: url.to_string(),
            loading: false,
            favicon: None,
            zoom,
        }
    }
}

/// What the owning window must do after a tab absorbed an event.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TabEventEffect {
    /// Push a "loading" notification if the tab is active.
    LoadingStarted,
    /// Push the full metadata record if the tab is active.
    MetadataUpdated,
    /// Open a new tab in the same window with this URL (denied popup).
    OpenTab(String),
    /// Nothing to push.
    None,
}

/// One browsing context: metadata plus the surface that renders it.
///
/// The surface reference is live from creation to destruction; dropping
/// the tab drops the surface with it.
pub(crate) struct Tab {
    pub(crate) meta: TabMeta,
    pub(crate) surface: Box<dyn Surface>,
}

impl Tab {
    pub(crate) fn new(meta: TabMeta, surface: Box<dyn Surface>) -> Self {
        Self { meta, surface }
    }

    /// Applies a surface lifecycle event to the metadata.
    pub(crate) fn apply_event(&mut self, event: SurfaceEvent) -> TabEventEffect {
        match event {
            SurfaceEvent::LoadingStarted => {
                self.meta.loading = true;
                TabEventEffect::LoadingStarted
            }
            SurfaceEvent::LoadingStopped => {
                self.meta.loading = false;
                TabEventEffect::MetadataUpdated
            }
            SurfaceEvent::Navigated(url) => {
                self.meta.url = url;
                TabEventEffect::MetadataUpdated
            }
            SurfaceEvent::TitleChanged(title) => {
                self.meta.title = title;
                TabEventEffect::MetadataUpdated
            }
            SurfaceEvent::IconChanged(uri) => {
                self.meta.favicon = Some(uri);
                TabEventEffect::MetadataUpdated
            }
            SurfaceEvent::LoadFailed { code, description } => {
                if surface::is_cancellation(code) {
                    // In-flight navigation cancelled (rapid re-navigation,
                    // tab closed mid-load). Expected, not a failure.
                    debug!(tab = %self.meta.id, code, "navigation cancelled");
                } else {
                    // Diagnostics only: the previous content stays
                    // visible and the load is not retried.
                    warn!(tab = %self.meta.id, code, %description, "page load failed");
                }
                TabEventEffect::None
            }
            SurfaceEvent::NewTargetRequested(url) => TabEventEffect::OpenTab(url),
        }
    }

    /// Tears down the event wiring. Called exactly once, right before the
    /// surface is destroyed, so no dangling callback can reference it.
    pub(crate) fn unwire(&mut self) {
        self.surface.clear_observer();
    }
}

/// One zoom step up, clamped. Steps land on 0.1 boundaries.
pub(crate) fn zoom_step_up(zoom: f64) -> f64 {
    (((zoom + 0.1) * 10.0).round() / 10.0).min(ZOOM_MAX)
}

/// One zoom step down, clamped.
pub(crate) fn zoom_step_down(zoom: f64) -> f64 {
    (((zoom - 0.1) * 10.0).round() / 10.0).max(ZOOM_MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_step_up_clamps_at_max() {
        let mut zoom = 1.0;
        for _ in 0..40 {
            zoom = zoom_step_up(zoom);
            assert!(zoom <= ZOOM_MAX);
        }
        assert_eq!(zoom, ZOOM_MAX);
    }

    #[test]
    fn test_zoom_step_down_clamps_at_min() {
        let mut zoom = 1.0;
        for _ in 0..40 {
            zoom = zoom_step_down(zoom);
            assert!(zoom >= ZOOM_MIN);
        }
        assert_eq!(zoom, ZOOM_MIN);
    }

    #[test]
    fn test_zoom_steps_stay_on_tenths() {
        let mut zoom = 1.0;
        for _ in 0..5 {
            zoom = zoom_step_up(zoom);
        }
        assert_eq!(zoom, 1.5);
        for _ in 0..7 {
            zoom = zoom_step_down(zoom);
        }
        assert_eq!(zoom, 0.8);
    }

    #[test]
    fn test_meta_starts_with_placeholder() {
        let meta = TabMeta::new(TabId(1), "https://example.com", 1.0);
        assert_eq!(meta.title, PLACEHOLDER_TITLE);
        assert_eq!(meta.url, "https://example.com");
        assert!(!meta.loading);
        assert!(meta.favicon.is_none());
    }
}
