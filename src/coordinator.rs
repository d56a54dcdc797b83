//! Process-wide session coordination.
//!
//! The `SessionCoordinator` is the registry of every live window session
//! and the router between them and the outside world: control messages
//! from the UI come in through [`SessionCoordinator::route_command`],
//! surface lifecycle events come in through the [`EventHub`] and are
//! drained by [`SessionCoordinator::pump`], and download signals from the
//! embedded subsystem come in through the `download_*` methods.
//!
//! ## Event flow
//!
//! ```text
//! Engine glue (per surface)
//!         │ observer closure
//!         ▼
//!   EventHub (FIFO queue, same thread)
//!         │ pump() — called by the embedder between event-loop turns
//!         ▼
//!   WindowSession::apply_surface_event → UiSink push
//! ```
//!
//! Surface observers only enqueue; nothing re-enters the coordinator from
//! inside an engine callback. Window teardown is the one strictly ordered
//! operation: the session snapshot is captured and persisted synchronously
//! in [`SessionCoordinator::close_window`], before the window handle is
//! released and the live tab state becomes unrecoverable.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::downloads::{Download, DownloadTracker};
use crate::filter::RequestFilter;
use crate::store::{Bookmark, HistoryItem, PersistentStore, Settings, SettingsPatch};
use crate::surface::{SurfaceEvent, SurfaceFactory};
use crate::tab::{TabId, TabMeta};
use crate::window::{UiSink, WindowHandle, WindowSession};

// ─────────────────────────────────────────────────────────────────────────────
// EventHub : surface events → coordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Single-threaded FIFO carrying surface lifecycle events to the
/// coordinator.
///
/// Each tab's observer closure holds a clone and enqueues `(window, tab,
/// event)`; the embedder drains it with [`SessionCoordinator::pump`].
/// Events whose window or tab died between enqueue and drain are dropped
/// silently — that race is normal during teardown.
#[derive(Clone, Default)]
pub struct EventHub {
    queue: Rc<RefCell<VecDeque<(WindowHandle, TabId, SurfaceEvent)>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, window: WindowHandle, tab: TabId, event: SurfaceEvent) {
        self.queue.borrow_mut().push_back((window, tab, event));
    }

    pub(crate) fn pop(&self) -> Option<(WindowHandle, TabId, SurfaceEvent)> {
        self.queue.borrow_mut().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shell delegate : coordinator → embedder
// ─────────────────────────────────────────────────────────────────────────────

/// The few things the core must ask the embedder to do with top-level
/// windows — it cannot create or close OS windows itself.
pub trait ShellDelegate {
    /// Open a new top-level window. The embedder creates the window and
    /// reports back via `open_window` / `notify_ui_ready` with its handle.
    fn open_window_requested(&self, initial_url: Option<String>);

    /// The window's last tab was closed — an empty window is a valid
    /// terminal condition, and the embedder should now close it, which
    /// comes back as a `close_window` call.
    fn close_window_requested(&self, window: WindowHandle);
}

// ─────────────────────────────────────────────────────────────────────────────
// Control-message surface
// ─────────────────────────────────────────────────────────────────────────────

/// Inbound control messages from a window's UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    Navigate { url: String },
    NavigateHome,
    Back,
    Forward,
    Reload,
    Stop,
    CreateTab { url: Option<String> },
    CloseTab { id: TabId },
    SwitchTab { id: TabId },
    DuplicateTab { id: TabId },
    DetachTab { id: TabId, url: String, title: String },
    ListTabs,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    ToggleDevtools,
    FindInPage { text: String },
    StopFindInPage,
    HideSurface,
    ShowSurface,
    CanGoBack,
    CanGoForward,
    AddBookmark { title: String, url: String },
    RemoveBookmark { id: String },
    GetBookmarks,
    AddHistory { title: String, url: String },
    GetHistory,
    ClearHistory,
    GetSettings,
    UpdateSettings { patch: SettingsPatch },
    GetDownloads,
}

/// Reply to a routed command. Fire-and-forget commands answer `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CommandResult {
    None,
    Tab { meta: TabMeta },
    Tabs { tabs: Vec<TabMeta> },
    Flag { value: bool },
    Bookmark { bookmark: Bookmark },
    Bookmarks { bookmarks: Vec<Bookmark> },
    History { items: Vec<HistoryItem> },
    Settings { settings: Settings },
    Downloads { downloads: Vec<Download> },
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionCoordinator
// ─────────────────────────────────────────────────────────────────────────────

struct WindowEntry {
    session: WindowSession,
    /// This window's dedicated handle onto the shared profile documents.
    store: Rc<RefCell<PersistentStore>>,
}

/// Registry and router across all window sessions.
pub struct SessionCoordinator {
    config: Config,
    profile_dir: PathBuf,
    windows: Vec<WindowEntry>,
    hub: EventHub,
    factory: Rc<dyn SurfaceFactory>,
    shell: Rc<dyn ShellDelegate>,
    /// Process-level store handle: download persistence and download-dir
    /// resolution (the per-window handles serve the command surface).
    store: Rc<RefCell<PersistentStore>>,
    downloads: DownloadTracker,
    filter: RequestFilter,
    /// Session restore runs at most once per process, on the first window
    /// whose UI becomes ready.
    restore_attempted: bool,
    /// Windows opened but whose UI has not signalled readiness yet, with
    /// the URL their first tab should load.
    pending_first_tab: Vec<(WindowHandle, Option<String>)>,
}

impl SessionCoordinator {
    pub fn new(config: Config, factory: Rc<dyn SurfaceFactory>, shell: Rc<dyn ShellDelegate>) -> Self {
        let profile_dir = config.profile_dir();
        let store = Rc::new(RefCell::new(PersistentStore::open(&profile_dir)));
        info!(profile = %profile_dir.display(), "session coordinator ready");
        Self {
            config,
            profile_dir,
            windows: Vec::new(),
            hub: EventHub::new(),
            factory,
            shell,
            store,
            downloads: DownloadTracker::new(),
            filter: RequestFilter::new(),
            restore_attempted: false,
            pending_first_tab: Vec::new(),
        }
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn session(&self, window: WindowHandle) -> Option<&WindowSession> {
        self.windows
            .iter()
            .find(|e| e.session.window() == window)
            .map(|e| &e.session)
    }

    /// The request filter consulted by the engine glue for every outbound
    /// request.
    pub fn request_filter(&self) -> &RequestFilter {
        &self.filter
    }

    pub fn request_filter_mut(&mut self) -> &mut RequestFilter {
        &mut self.filter
    }

    // ── Window lifecycle ───────────────────────────────────────────────

    /// Registers a new top-level window: creates its session and its
    /// dedicated store handle. The first tab is *not* created here — tabs
    /// must not exist before the window's UI can receive their initial
    /// push, so it is deferred until [`Self::notify_ui_ready`].
    pub fn open_window(&mut self, window: WindowHandle, ui: Rc<dyn UiSink>, initial_url: Option<String>) {
        if self.index_of(window).is_some() {
            debug!(?window, "window already registered");
            return;
        }

        let store = Rc::new(RefCell::new(PersistentStore::open(&self.profile_dir)));
        let session = WindowSession::new(
            window,
            (self.config.window.width, self.config.window.height),
            self.config.chrome.height,
            ui,
            store.clone(),
            self.factory.clone(),
            self.hub.clone(),
        );
        self.windows.push(WindowEntry { session, store });
        self.pending_first_tab.push((window, initial_url));
        info!(?window, windows = self.windows.len(), "window registered");
    }

    /// The window's presentation layer is ready to receive pushes; create
    /// its first tab. On the first window of the process this restores
    /// the saved session instead, when settings ask for it — a missing or
    /// corrupt snapshot is not an error and falls back to a single
    /// default tab.
    pub fn notify_ui_ready(&mut self, window: WindowHandle) {
        let Some(pending) = self.pending_first_tab.iter().position(|(w, _)| *w == window) else {
            return;
        };
        let (_, initial_url) = self.pending_first_tab.remove(pending);
        let Some(index) = self.index_of(window) else {
            return;
        };

        let try_restore = !self.restore_attempted;
        self.restore_attempted = true;

        let mut restored = false;
        if try_restore {
            let snapshot = {
                let store = self.windows[index].store.borrow();
                if store.settings().restore_session {
                    store.restore_session_snapshot()
                } else {
                    None
                }
            };
            if let Some(snapshot) = snapshot
                && !snapshot.tabs.is_empty()
            {
                info!(tabs = snapshot.tabs.len(), "restoring previous session");
                let entry = &mut self.windows[index];
                for saved in &snapshot.tabs {
                    entry.session.restore_tab(&saved.url, &saved.title);
                }
                let metas = entry.session.tabs();
                if let Some(meta) = metas.get(snapshot.active_index) {
                    entry.session.switch_tab(meta.id);
                }
                restored = entry.session.tab_count() > 0;
            }
        }

        if !restored {
            let url = match initial_url {
                Some(url) => url,
                None => self.windows[index].store.borrow().settings().home_page.clone(),
            };
            self.windows[index].session.create_tab(&url);
        }
    }

    /// Window-close notification. Captures and persists the session
    /// snapshot synchronously — after this returns the window handle may
    /// become invalid — then tears the session down and unregisters it.
    pub fn close_window(&mut self, window: WindowHandle) {
        let Some(index) = self.index_of(window) else {
            debug!(?window, "close for unknown window ignored");
            return;
        };

        let mut entry = self.windows.remove(index);
        let snapshot = entry.session.snapshot();
        entry.store.borrow_mut().save_session_snapshot(&snapshot);
        entry.session.teardown();
        self.pending_first_tab.retain(|(w, _)| *w != window);
        info!(?window, tabs = snapshot.tabs.len(), "window closed, session saved");
    }

    /// The window content area changed; the active surface is
    /// re-positioned against the new bounds.
    pub fn window_resized(&mut self, window: WindowHandle, width: u32, height: u32) {
        if let Some(index) = self.index_of(window) {
            self.windows[index].session.resized(width, height);
        }
    }

    // ── Command routing ────────────────────────────────────────────────

    /// Routes a control message to the originating window's session or
    /// store. A command from a window that is no longer registered (the
    /// UI racing teardown) is a silent no-op answering
    /// [`CommandResult::None`].
    pub fn route_command(&mut self, window: WindowHandle, command: Command) -> CommandResult {
        let Some(index) = self.index_of(window) else {
            debug!(?window, ?command, "command for unknown window dropped");
            return CommandResult::None;
        };

        match command {
            // ── Navigation ─────────────────────────────────────────
            Command::Navigate { url } => {
                self.windows[index].session.navigate(&url);
                CommandResult::None
            }
            Command::NavigateHome => {
                self.windows[index].session.navigate_home();
                CommandResult::None
            }
            Command::Back => {
                self.windows[index].session.go_back();
                CommandResult::None
            }
            Command::Forward => {
                self.windows[index].session.go_forward();
                CommandResult::None
            }
            Command::Reload => {
                self.windows[index].session.reload();
                CommandResult::None
            }
            Command::Stop => {
                self.windows[index].session.stop();
                CommandResult::None
            }
            Command::CanGoBack => CommandResult::Flag {
                value: self.windows[index].session.can_go_back(),
            },
            Command::CanGoForward => CommandResult::Flag {
                value: self.windows[index].session.can_go_forward(),
            },

            // ── Tabs ───────────────────────────────────────────────
            Command::CreateTab { url } => {
                let url = match url {
                    Some(url) => url,
                    None => self.windows[index].store.borrow().settings().home_page.clone(),
                };
                match self.windows[index].session.create_tab(&url) {
                    Some(meta) => CommandResult::Tab { meta },
                    None => CommandResult::None,
                }
            }
            Command::CloseTab { id } => {
                let now_empty = {
                    let session = &mut self.windows[index].session;
                    session.close_tab(id);
                    session.tab_count() == 0
                };
                if now_empty {
                    self.shell.close_window_requested(window);
                }
                CommandResult::None
            }
            Command::SwitchTab { id } => {
                self.windows[index].session.switch_tab(id);
                CommandResult::None
            }
            Command::DuplicateTab { id } => {
                match self.windows[index].session.duplicate_tab(id) {
                    Some(meta) => CommandResult::Tab { meta },
                    None => CommandResult::None,
                }
            }
            Command::DetachTab { id, url, title: _ } => {
                // Close locally, then ask the embedder for a fresh
                // top-level window carrying the URL.
                let now_empty = {
                    let session = &mut self.windows[index].session;
                    session.close_tab(id);
                    session.tab_count() == 0
                };
                self.shell.open_window_requested(Some(url));
                if now_empty {
                    self.shell.close_window_requested(window);
                }
                CommandResult::None
            }
            Command::ListTabs => CommandResult::Tabs {
                tabs: self.windows[index].session.tabs(),
            },

            // ── Zoom / devtools / find ─────────────────────────────
            Command::ZoomIn => {
                self.windows[index].session.zoom_in();
                CommandResult::None
            }
            Command::ZoomOut => {
                self.windows[index].session.zoom_out();
                CommandResult::None
            }
            Command::ZoomReset => {
                self.windows[index].session.zoom_reset();
                CommandResult::None
            }
            Command::ToggleDevtools => {
                self.windows[index].session.toggle_devtools();
                CommandResult::None
            }
            Command::FindInPage { text } => {
                self.windows[index].session.find_in_page(&text);
                CommandResult::None
            }
            Command::StopFindInPage => {
                self.windows[index].session.stop_find_in_page();
                CommandResult::None
            }
            Command::HideSurface => {
                self.windows[index].session.hide_active();
                CommandResult::None
            }
            Command::ShowSurface => {
                self.windows[index].session.show_active();
                CommandResult::None
            }

            // ── Bookmarks / history / settings / downloads ─────────
            Command::AddBookmark { title, url } => CommandResult::Bookmark {
                bookmark: self.windows[index].store.borrow_mut().add_bookmark(&title, &url),
            },
            Command::RemoveBookmark { id } => CommandResult::Flag {
                value: self.windows[index].store.borrow_mut().remove_bookmark(&id),
            },
            Command::GetBookmarks => CommandResult::Bookmarks {
                bookmarks: self.windows[index].store.borrow().bookmarks().to_vec(),
            },
            Command::AddHistory { title, url } => {
                self.windows[index].store.borrow_mut().add_history(&title, &url);
                CommandResult::None
            }
            Command::GetHistory => CommandResult::History {
                items: self.windows[index].store.borrow().history(),
            },
            Command::ClearHistory => {
                self.windows[index].store.borrow_mut().clear_history();
                CommandResult::None
            }
            Command::GetSettings => CommandResult::Settings {
                settings: self.windows[index].store.borrow().settings().clone(),
            },
            Command::UpdateSettings { patch } => CommandResult::Settings {
                settings: self.windows[index].store.borrow_mut().update_settings(patch),
            },
            Command::GetDownloads => CommandResult::Downloads {
                downloads: self.store.borrow().downloads().to_vec(),
            },
        }
    }

    // ── Surface events ─────────────────────────────────────────────────

    /// Drains the event queue, routing each event to the window that owns
    /// the originating surface. Events for windows or tabs that died
    /// in-flight are dropped.
    pub fn pump(&mut self) {
        while let Some((window, tab, event)) = self.hub.pop() {
            match self.index_of(window) {
                Some(index) => self.windows[index].session.apply_surface_event(tab, event),
                None => debug!(?window, %tab, "event for unknown window dropped"),
            }
        }
    }

    // ── Downloads ──────────────────────────────────────────────────────

    /// The embedded subsystem reported a new download. The destination is
    /// resolved from the current settings' download directory.
    pub fn download_started(&mut self, filename: &str, url: &str, total_bytes: u64) -> Download {
        let dir = PathBuf::from(self.store.borrow().settings().download_dir.clone());
        let download = self.downloads.begin(filename, url, total_bytes, &dir);
        self.store.borrow_mut().add_download(&download);
        self.broadcast(|ui| ui.download_created(&download));
        download
    }

    /// A progress tick. Persisted on every tick so the last known counts
    /// survive an unexpected shutdown. Ticks for terminal or unknown
    /// downloads are discarded.
    pub fn download_progress(&mut self, id: &str, received_bytes: u64, total_bytes: u64) {
        if let Some(download) = self.downloads.progress(id, received_bytes, total_bytes) {
            self.store.borrow_mut().update_download(&download);
            self.broadcast(|ui| ui.download_updated(&download));
        }
    }

    pub fn download_interrupted(&mut self, id: &str) {
        if let Some(download) = self.downloads.interrupt(id) {
            self.store.borrow_mut().update_download(&download);
            self.broadcast(|ui| ui.download_updated(&download));
        }
    }

    pub fn download_completed(&mut self, id: &str) {
        if let Some(download) = self.downloads.complete(id) {
            self.store.borrow_mut().update_download(&download);
            self.broadcast(|ui| ui.download_completed(&download));
        }
    }

    pub fn download_cancelled(&mut self, id: &str) {
        if let Some(download) = self.downloads.cancel(id) {
            self.store.borrow_mut().update_download(&download);
            self.broadcast(|ui| ui.download_updated(&download));
        }
    }

    // ── Internal ───────────────────────────────────────────────────────

    fn index_of(&self, window: WindowHandle) -> Option<usize> {
        self.windows.iter().position(|e| e.session.window() == window)
    }

    /// Downloads are process-wide; every window's UI gets the push.
    fn broadcast<F: Fn(&dyn UiSink)>(&self, push: F) {
        for entry in &self.windows {
            push(entry.session.ui().as_ref());
        }
    }
}
