//! Per-window tab registry and active-tab cursor.
//!
//! A `WindowSession` owns every tab of one top-level window. Tabs are kept
//! in insertion order (the tab-strip order); at most one is active, and
//! exactly the active tab's surface is attached to the window's visible
//! area, positioned below the reserved chrome strip.
//!
//! Every operation that references a tab id tolerates the id being gone:
//! the UI may race ahead of tab teardown and a stale command is a silent
//! no-op, never an error.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::address;
use crate::coordinator::EventHub;
use crate::downloads::Download;
use crate::store::{PersistentStore, SessionSnapshot, SnapshotTab};
use crate::surface::{SurfaceBounds, SurfaceEvent, SurfaceFactory};
use crate::tab::{self, Tab, TabEventEffect, TabId, TabMeta};

/// Opaque handle of a top-level window, supplied by the embedder.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub u64);

/// Push channel from the core to one window's UI layer.
///
/// Pushes are keyed by tab id; `metadata_updated` always carries the full
/// record, and after a tab switch it is sent even when nothing changed —
/// the UI treats it as "this tab is now authoritative for the address bar".
pub trait UiSink {
    fn tab_created(&self, meta: &TabMeta);
    fn loading_started(&self, tab: TabId);
    fn metadata_updated(&self, meta: &TabMeta);
    fn download_created(&self, download: &Download);
    fn download_updated(&self, download: &Download);
    fn download_completed(&self, download: &Download);
}

/// Tab registry and active cursor for one top-level window.
pub struct WindowSession {
    window: WindowHandle,
    /// Insertion order is the tab-strip order.
    tabs: Vec<Tab>,
    active: Option<TabId>,
    next_tab_id: u64,
    content_size: (u32, u32),
    /// Pixels reserved at the top of the content area for the chrome.
    chrome_height: u32,
    ui: Rc<dyn UiSink>,
    store: Rc<RefCell<PersistentStore>>,
    factory: Rc<dyn SurfaceFactory>,
    hub: EventHub,
}

impl WindowSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        window: WindowHandle,
        content_size: (u32, u32),
        chrome_height: u32,
        ui: Rc<dyn UiSink>,
        store: Rc<RefCell<PersistentStore>>,
        factory: Rc<dyn SurfaceFactory>,
        hub: EventHub,
    ) -> Self {
        Self {
            window,
            tabs: Vec::new(),
            active: None,
            next_tab_id: 1,
            content_size,
            chrome_height,
            ui,
            store,
            factory,
            hub,
        }
    }

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.active
    }

    pub(crate) fn ui(&self) -> &Rc<dyn UiSink> {
        &self.ui
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Full metadata of every tab, in tab-strip order.
    pub fn tabs(&self) -> Vec<TabMeta> {
        self.tabs.iter().map(|t| t.meta.clone()).collect()
    }

    // ── Tab lifecycle ──────────────────────────────────────────────────

    /// Creates a tab, wires its surface events, starts navigating to
    /// `url` (unless it is the blank home sentinel) and activates it.
    ///
    /// Returns placeholder metadata immediately; the real title and URL
    /// arrive asynchronously through surface events. Returns `None` when
    /// the engine could not create a surface.
    pub fn create_tab(&mut self, url: &str) -> Option<TabMeta> {
        let id = TabId(self.next_tab_id);
        let Some(mut surface) = self.factory.create_surface(self.window, id) else {
            warn!(window = ?self.window, "surface creation failed, tab not created");
            return None;
        };
        self.next_tab_id += 1;

        // Event wiring: the observer only enqueues — delivery happens on
        // the next pump, on this same thread.
        let hub = self.hub.clone();
        let window = self.window;
        surface.set_observer(Box::new(move |event| hub.push(window, id, event)));

        let zoom = self.store.borrow().settings().default_zoom;
        let meta = TabMeta::new(id, url, zoom);
        let mut tab = Tab::new(meta.clone(), surface);

        if url != tab::HOME_URL {
            tab.surface.load(url);
        }
        self.tabs.push(tab);

        self.ui.tab_created(&meta);
        self.switch_tab(id);
        Some(meta)
    }

    /// Closes a tab and destroys its surface. If it was active, the first
    /// remaining tab (in tab-strip order) becomes active; if none remain
    /// the active pointer is cleared and the caller is expected to close
    /// the window.
    pub fn close_tab(&mut self, id: TabId) {
        let Some(index) = self.tabs.iter().position(|t| t.meta.id == id) else {
            debug!(tab = %id, "close for unknown tab ignored");
            return;
        };

        let was_active = self.active == Some(id);
        let mut tab = self.tabs.remove(index);
        if was_active {
            tab.surface.detach();
        }
        // Unsubscribe before the surface goes away so no event can be
        // routed to a freed tab.
        tab.unwire();
        drop(tab);

        if was_active {
            self.active = None;
            if let Some(first) = self.tabs.first().map(|t| t.meta.id) {
                self.switch_tab(first);
            }
        }
    }

    /// Makes `id` the active tab: detaches the previous surface, attaches
    /// the target at the window's content bounds minus the chrome strip,
    /// restores the tab's remembered zoom, and pushes its full metadata.
    ///
    /// No-op if `id` does not resolve to a live tab.
    pub fn switch_tab(&mut self, id: TabId) {
        if !self.tabs.iter().any(|t| t.meta.id == id) {
            debug!(tab = %id, "switch to unknown tab ignored");
            return;
        }

        if let Some(active) = self.active
            && let Some(current) = self.tab_mut(active)
        {
            current.surface.detach();
        }

        let bounds = self.surface_bounds();
        self.active = Some(id);
        if let Some(tab) = self.tab_mut(id) {
            tab.surface.attach(bounds);
            let zoom = tab.meta.zoom;
            tab.surface.set_zoom(zoom);
            let meta = tab.meta.clone();
            self.ui.metadata_updated(&meta);
        }
    }

    /// Opens a fresh tab on the target's current URL. Navigation history,
    /// zoom and scroll position are not copied — a new surface, not a
    /// clone.
    pub fn duplicate_tab(&mut self, id: TabId) -> Option<TabMeta> {
        let url = self.tab(id)?.meta.url.clone();
        self.create_tab(&url)
    }

    /// Session restore: creates the tab and seeds the saved title so the
    /// strip doesn't show placeholders until the first title event.
    pub(crate) fn restore_tab(&mut self, url: &str, title: &str) -> Option<TabMeta> {
        let meta = self.create_tab(url)?;
        if !title.is_empty()
            && let Some(tab) = self.tab_mut(meta.id)
        {
            tab.meta.title = title.to_string();
        }
        self.tab(meta.id).map(|t| t.meta.clone())
    }

    // ── Navigation (active tab only) ───────────────────────────────────

    /// Resolves address-bar input (URL vs. search query) and dispatches
    /// the load to the active tab's surface. No-op without an active tab.
    pub fn navigate(&mut self, input: &str) {
        let Some(id) = self.active else { return };
        let template = self.store.borrow().settings().search_engine.clone();
        let Some(url) = address::resolve(input, &template) else {
            return;
        };
        if let Some(tab) = self.tab_mut(id) {
            tab.surface.load(&url);
        }
    }

    /// Navigates the active tab to the configured home page.
    pub fn navigate_home(&mut self) {
        let home = self.store.borrow().settings().home_page.clone();
        if home.is_empty() {
            return;
        }
        if let Some(tab) = self.active_tab_mut() {
            tab.surface.load(&home);
        }
    }

    pub fn go_back(&mut self) {
        if let Some(tab) = self.active_tab_mut()
            && tab.surface.can_go_back()
        {
            tab.surface.go_back();
        }
    }

    pub fn go_forward(&mut self) {
        if let Some(tab) = self.active_tab_mut()
            && tab.surface.can_go_forward()
        {
            tab.surface.go_forward();
        }
    }

    pub fn reload(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            tab.surface.reload();
        }
    }

    pub fn stop(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            tab.surface.stop();
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.active_tab_ref().map(|t| t.surface.can_go_back()).unwrap_or(false)
    }

    pub fn can_go_forward(&self) -> bool {
        self.active_tab_ref().map(|t| t.surface.can_go_forward()).unwrap_or(false)
    }

    // ── Zoom (per tab, remembered across switches) ─────────────────────

    pub fn zoom_in(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            tab.meta.zoom = tab::zoom_step_up(tab.meta.zoom);
            let zoom = tab.meta.zoom;
            tab.surface.set_zoom(zoom);
        }
    }

    pub fn zoom_out(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            tab.meta.zoom = tab::zoom_step_down(tab.meta.zoom);
            let zoom = tab.meta.zoom;
            tab.surface.set_zoom(zoom);
        }
    }

    pub fn zoom_reset(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            tab.meta.zoom = 1.0;
            tab.surface.set_zoom(1.0);
        }
    }

    pub fn active_zoom(&self) -> Option<f64> {
        self.active_tab_ref().map(|t| t.meta.zoom)
    }

    // ── Find / devtools ────────────────────────────────────────────────

    pub fn find_in_page(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(tab) = self.active_tab_mut() {
            tab.surface.find_in_page(text);
        }
    }

    pub fn stop_find_in_page(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            tab.surface.stop_find_in_page();
        }
    }

    pub fn toggle_devtools(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            if tab.surface.is_devtools_open() {
                tab.surface.close_devtools();
            } else {
                tab.surface.open_devtools();
            }
        }
    }

    // ── Surface visibility (UI overlay support) ────────────────────────

    /// Detaches the active surface without deactivating the tab, so the
    /// UI can overlay a full-window panel.
    pub fn hide_active(&mut self) {
        if let Some(tab) = self.active_tab_mut() {
            tab.surface.detach();
        }
    }

    /// Re-attaches and re-positions the active surface.
    pub fn show_active(&mut self) {
        let bounds = self.surface_bounds();
        if let Some(tab) = self.active_tab_mut() {
            tab.surface.attach(bounds);
        }
    }

    /// The window content area changed; re-position the active surface.
    pub fn resized(&mut self, width: u32, height: u32) {
        self.content_size = (width, height);
        let bounds = self.surface_bounds();
        if let Some(tab) = self.active_tab_mut() {
            tab.surface.attach(bounds);
        }
    }

    // ── Events & teardown ──────────────────────────────────────────────

    /// Applies one surface lifecycle event. Events for tabs that no
    /// longer exist are dropped silently — closing a tab with a load in
    /// flight makes this a normal occurrence.
    pub(crate) fn apply_surface_event(&mut self, tab_id: TabId, event: SurfaceEvent) {
        let effect = match self.tab_mut(tab_id) {
            Some(tab) => tab.apply_event(event),
            None => {
                debug!(tab = %tab_id, "event for unknown tab dropped");
                return;
            }
        };

        match effect {
            TabEventEffect::LoadingStarted => {
                if self.active == Some(tab_id) {
                    self.ui.loading_started(tab_id);
                }
            }
            TabEventEffect::MetadataUpdated => {
                if self.active == Some(tab_id)
                    && let Some(tab) = self.tab(tab_id)
                {
                    self.ui.metadata_updated(&tab.meta);
                }
            }
            TabEventEffect::OpenTab(url) => {
                // Denied popup: satisfied as a tab in this window, never
                // as an implicit second top-level window.
                self.create_tab(&url);
            }
            TabEventEffect::None => {}
        }
    }

    /// Serializes the current tab list for the session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        let active_index = self
            .active
            .and_then(|id| self.tabs.iter().position(|t| t.meta.id == id))
            .unwrap_or(0);
        SessionSnapshot {
            tabs: self
                .tabs
                .iter()
                .map(|t| SnapshotTab {
                    url: t.meta.url.clone(),
                    title: t.meta.title.clone(),
                })
                .collect(),
            active_index,
        }
    }

    /// Destroys every tab and surface. Event wiring is cleared first so
    /// nothing can call back into freed surfaces.
    pub(crate) fn teardown(&mut self) {
        if let Some(active) = self.active.take()
            && let Some(tab) = self.tab_mut(active)
        {
            tab.surface.detach();
        }
        for tab in &mut self.tabs {
            tab.unwire();
        }
        self.tabs.clear();
    }

    // ── Internal ───────────────────────────────────────────────────────

    fn surface_bounds(&self) -> SurfaceBounds {
        SurfaceBounds {
            x: 0,
            y: self.chrome_height as i32,
            width: self.content_size.0,
            height: self.content_size.1.saturating_sub(self.chrome_height),
        }
    }

    fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.meta.id == id)
    }

    fn tab_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.meta.id == id)
    }

    fn active_tab_ref(&self) -> Option<&Tab> {
        self.active.and_then(|id| self.tab(id))
    }

    fn active_tab_mut(&mut self) -> Option<&mut Tab> {
        let id = self.active?;
        self.tab_mut(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test support
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_ui {
    //! A UiSink that records every push as a readable line.

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::UiSink;
    use crate::downloads::Download;
    use crate::tab::{TabId, TabMeta};

    /// Test log output, filtered by `RUST_LOG` as usual.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[derive(Default)]
    pub struct RecordingUi {
        pushes: RefCell<Vec<String>>,
    }

    impl RecordingUi {
        pub fn new() -> Rc<Self> {
            Rc::new(Self::default())
        }

        pub fn pushes(&self) -> Vec<String> {
            self.pushes.borrow().clone()
        }

        pub fn clear(&self) {
            self.pushes.borrow_mut().clear();
        }
    }

    impl UiSink for RecordingUi {
        fn tab_created(&self, meta: &TabMeta) {
            self.pushes.borrow_mut().push(format!("tab-created {}", meta.id));
        }

        fn loading_started(&self, tab: TabId) {
            self.pushes.borrow_mut().push(format!("loading {tab}"));
        }

        fn metadata_updated(&self, meta: &TabMeta) {
            self.pushes.borrow_mut().push(format!(
                "metadata {} url={} title={} loading={}",
                meta.id, meta.url, meta.title, meta.loading
            ));
        }

        fn download_created(&self, download: &Download) {
            self.pushes.borrow_mut().push(format!("download-created {}", download.id));
        }

        fn download_updated(&self, download: &Download) {
            self.pushes
                .borrow_mut()
                .push(format!("download-updated {} {}", download.id, download.received_bytes));
        }

        fn download_completed(&self, download: &Download) {
            self.pushes.borrow_mut().push(format!("download-completed {}", download.id));
        }
    }
}
