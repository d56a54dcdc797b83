//! Durable per-profile storage: bookmarks, history, settings, downloads,
//! session snapshot.
//!
//! One JSON document per concern under the profile directory. Each
//! document is the direct serialization of its in-memory value — no schema
//! version field, so every struct is `#[serde(default)]`-tolerant and a
//! missing field reads as its default.
//!
//! Storage never fails the caller: a read error falls back to defaults, a
//! write error is logged and the in-memory value stays authoritative for
//! the rest of the session.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::downloads::Download;

/// Maximum retained history entries; the oldest are dropped on write.
const HISTORY_CAP: usize = 1000;

// ─────────────────────────────────────────────────────────────────────────────
// Persisted records
// ─────────────────────────────────────────────────────────────────────────────

/// A saved bookmark. Never mutated in place — added and removed whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// One visited page. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Unix milliseconds.
    pub visited_at: i64,
}

/// An installed extension reference carried in settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionRef {
    pub id: String,
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub path: String,
}

/// User settings. A single record; the only writer is the
/// settings-update command, and the later write's full object replaces
/// the stored one across concurrent windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub home_page: String,
    /// Search template the query is appended to (`…?q=`).
    pub search_engine: String,
    pub default_zoom: f64,
    pub enable_javascript: bool,
    pub enable_images: bool,
    pub download_dir: String,
    pub restore_session: bool,
    pub theme: String,
    pub installed_extensions: Vec<ExtensionRef>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home_page: "https://duckduckgo.com".to_string(),
            search_engine: "https://duckduckgo.com/?q=".to_string(),
            default_zoom: 1.0,
            enable_javascript: true,
            enable_images: true,
            download_dir: default_download_dir(),
            restore_session: true,
            theme: "default".to_string(),
            installed_extensions: Vec::new(),
        }
    }
}

/// Partial settings update — only provided fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub home_page: Option<String>,
    pub search_engine: Option<String>,
    pub default_zoom: Option<f64>,
    pub enable_javascript: Option<bool>,
    pub enable_images: Option<bool>,
    pub download_dir: Option<String>,
    pub restore_session: Option<bool>,
    pub theme: Option<String>,
    pub installed_extensions: Option<Vec<ExtensionRef>>,
}

impl SettingsPatch {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.home_page {
            settings.home_page = v;
        }
        if let Some(v) = self.search_engine {
            settings.search_engine = v;
        }
        if let Some(v) = self.default_zoom {
            settings.default_zoom = v;
        }
        if let Some(v) = self.enable_javascript {
            settings.enable_javascript = v;
        }
        if let Some(v) = self.enable_images {
            settings.enable_images = v;
        }
        if let Some(v) = self.download_dir {
            settings.download_dir = v;
        }
        if let Some(v) = self.restore_session {
            settings.restore_session = v;
        }
        if let Some(v) = self.theme {
            settings.theme = v;
        }
        if let Some(v) = self.installed_extensions {
            settings.installed_extensions = v;
        }
    }
}

/// One tab entry inside a session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTab {
    pub url: String,
    pub title: String,
}

/// A window's tab list at shutdown, restored on next launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    pub tabs: Vec<SnapshotTab>,
    pub active_index: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Handle onto the profile directory's JSON documents.
///
/// Each window gets its own handle; all handles point at the same files,
/// so a write from one handle replaces whatever another handle wrote last
/// (last-write-wins, no merge).
pub struct PersistentStore {
    bookmarks_file: PathBuf,
    history_file: PathBuf,
    settings_file: PathBuf,
    downloads_file: PathBuf,
    session_file: PathBuf,

    bookmarks: Vec<Bookmark>,
    history: Vec<HistoryItem>,
    settings: Settings,
    downloads: Vec<Download>,
}

impl PersistentStore {
    /// Opens (and if needed creates) the profile directory and loads every
    /// document. Corrupt or missing documents load as empty/defaults.
    pub fn open(profile_dir: &Path) -> Self {
        if let Err(error) = fs::create_dir_all(profile_dir) {
            warn!(dir = %profile_dir.display(), %error, "cannot create profile directory");
        }

        let bookmarks_file = profile_dir.join("bookmarks.json");
        let history_file = profile_dir.join("history.json");
        let settings_file = profile_dir.join("settings.json");
        let downloads_file = profile_dir.join("downloads.json");
        let session_file = profile_dir.join("session.json");

        Self {
            bookmarks: load_doc(&bookmarks_file),
            history: load_doc(&history_file),
            settings: load_doc(&settings_file),
            downloads: load_doc(&downloads_file),
            bookmarks_file,
            history_file,
            settings_file,
            downloads_file,
            session_file,
        }
    }

    // ── Bookmarks ──────────────────────────────────────────────────────

    pub fn add_bookmark(&mut self, title: &str, url: &str) -> Bookmark {
        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            url: url.to_string(),
            created_at: now_millis(),
        };
        self.bookmarks.push(bookmark.clone());
        save_doc(&self.bookmarks_file, &self.bookmarks);
        bookmark
    }

    /// Returns `true` if a bookmark with `id` existed and was removed.
    pub fn remove_bookmark(&mut self, id: &str) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.id != id);
        let removed = self.bookmarks.len() != before;
        if removed {
            save_doc(&self.bookmarks_file, &self.bookmarks);
        }
        removed
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    // ── History ────────────────────────────────────────────────────────

    pub fn add_history(&mut self, title: &str, url: &str) {
        self.history.push(HistoryItem {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            url: url.to_string(),
            visited_at: now_millis(),
        });
        if self.history.len() > HISTORY_CAP {
            let excess = self.history.len() - HISTORY_CAP;
            self.history.drain(..excess);
        }
        save_doc(&self.history_file, &self.history);
    }

    /// Most-recent-first.
    pub fn history(&self) -> Vec<HistoryItem> {
        self.history.iter().rev().cloned().collect()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        save_doc(&self.history_file, &self.history);
    }

    // ── Settings ───────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Applies a partial update and persists the full record.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Settings {
        patch.apply(&mut self.settings);
        save_doc(&self.settings_file, &self.settings);
        self.settings.clone()
    }

    // ── Downloads ──────────────────────────────────────────────────────

    pub fn add_download(&mut self, download: &Download) {
        self.downloads.push(download.clone());
        save_doc(&self.downloads_file, &self.downloads);
    }

    /// Replaces the stored record with the same id. Unknown ids are added
    /// rather than dropped so a tick can never lose a record.
    pub fn update_download(&mut self, download: &Download) {
        match self.downloads.iter_mut().find(|d| d.id == download.id) {
            Some(existing) => *existing = download.clone(),
            None => self.downloads.push(download.clone()),
        }
        save_doc(&self.downloads_file, &self.downloads);
    }

    pub fn downloads(&self) -> &[Download] {
        &self.downloads
    }

    // ── Session snapshot ───────────────────────────────────────────────

    pub fn save_session_snapshot(&mut self, snapshot: &SessionSnapshot) {
        save_doc(&self.session_file, snapshot);
    }

    /// Returns `None` — never an error — when the snapshot is absent or
    /// does not parse.
    pub fn restore_session_snapshot(&self) -> Option<SessionSnapshot> {
        let content = fs::read_to_string(&self.session_file).ok()?;
        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                warn!(file = %self.session_file.display(), %error, "corrupt session snapshot, ignoring");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Document IO
// ─────────────────────────────────────────────────────────────────────────────

fn load_doc<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(error) => {
                warn!(file = %path.display(), %error, "corrupt document, using defaults");
                T::default()
            }
        },
        Err(_) => {
            debug!(file = %path.display(), "no document yet, using defaults");
            T::default()
        }
    }
}

fn save_doc<T: Serialize>(path: &Path, value: &T) {
    let content = match serde_json::to_string_pretty(value) {
        Ok(content) => content,
        Err(error) => {
            warn!(file = %path.display(), %error, "cannot serialize document");
            return;
        }
    };
    if let Err(error) = fs::write(path, content) {
        warn!(file = %path.display(), %error, "cannot write document, in-memory state stays authoritative");
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Platform downloads directory without adding a dependency.
fn default_download_dir() -> String {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE")
            .map(|home| format!("{home}\\Downloads"))
            .unwrap_or_else(|_| ".".to_string())
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME")
            .map(|home| format!("{home}/Downloads"))
            .unwrap_or_else(|_| ".".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloads::DownloadState;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, PersistentStore) {
        let dir = TempDir::new().unwrap();
        let store = PersistentStore::open(dir.path());
        (dir, store)
    }

    #[test]
    fn test_bookmark_add_remove_roundtrip() {
        let (dir, mut store) = open_temp();
        let bookmark = store.add_bookmark("Example", "https://example.com");
        assert_eq!(store.bookmarks().len(), 1);

        // A fresh handle sees the persisted bookmark.
        let reopened = PersistentStore::open(dir.path());
        assert_eq!(reopened.bookmarks().len(), 1);
        assert_eq!(reopened.bookmarks()[0].url, "https://example.com");

        assert!(store.remove_bookmark(&bookmark.id));
        assert!(store.bookmarks().is_empty());
        assert!(!store.remove_bookmark(&bookmark.id));
    }

    #[test]
    fn test_history_most_recent_first() {
        let (_dir, mut store) = open_temp();
        store.add_history("First", "https://a.example");
        store.add_history("Second", "https://b.example");

        let history = store.history();
        assert_eq!(history[0].title, "Second");
        assert_eq!(history[1].title, "First");
    }

    #[test]
    fn test_history_cap_drops_oldest() {
        let (_dir, mut store) = open_temp();
        for i in 0..(HISTORY_CAP + 5) {
            store.add_history(&format!("Page {i}"), "https://example.com");
        }
        assert_eq!(store.history.len(), HISTORY_CAP);
        // Oldest five dropped; newest retained.
        assert_eq!(store.history[0].title, "Page 5");
        assert_eq!(store.history().first().unwrap().title, format!("Page {}", HISTORY_CAP + 4));
    }

    #[test]
    fn test_clear_history() {
        let (_dir, mut store) = open_temp();
        store.add_history("Page", "https://example.com");
        store.clear_history();
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_settings_partial_merge() {
        let (_dir, mut store) = open_temp();
        let original_home = store.settings().home_page.clone();
        let original_zoom = store.settings().default_zoom;

        let updated = store.update_settings(SettingsPatch {
            theme: Some("ocean".to_string()),
            ..Default::default()
        });

        assert_eq!(updated.theme, "ocean");
        assert_eq!(updated.home_page, original_home);
        assert_eq!(updated.default_zoom, original_zoom);
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let (_dir, mut store) = open_temp();
        let before = store.settings().clone();
        let after = store.update_settings(SettingsPatch::default());
        assert_eq!(after.home_page, before.home_page);
        assert_eq!(after.theme, before.theme);
        assert_eq!(after.restore_session, before.restore_session);
    }

    #[test]
    fn test_settings_missing_fields_read_as_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("settings.json"), r#"{"theme": "ocean"}"#).unwrap();

        let store = PersistentStore::open(dir.path());
        assert_eq!(store.settings().theme, "ocean");
        assert_eq!(store.settings().default_zoom, 1.0);
        assert!(store.settings().restore_session);
    }

    #[test]
    fn test_corrupt_document_loads_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bookmarks.json"), "{not json").unwrap();

        let store = PersistentStore::open(dir.path());
        assert!(store.bookmarks().is_empty());
    }

    #[test]
    fn test_session_snapshot_roundtrip() {
        let (dir, mut store) = open_temp();
        let snapshot = SessionSnapshot {
            tabs: vec![
                SnapshotTab { url: "https://a.example".into(), title: "A".into() },
                SnapshotTab { url: "https://b.example".into(), title: "B".into() },
            ],
            active_index: 1,
        };
        store.save_session_snapshot(&snapshot);

        let reopened = PersistentStore::open(dir.path());
        assert_eq!(reopened.restore_session_snapshot(), Some(snapshot));
    }

    #[test]
    fn test_session_snapshot_absent_and_corrupt() {
        let (dir, store) = open_temp();
        assert_eq!(store.restore_session_snapshot(), None);

        fs::write(dir.path().join("session.json"), "][").unwrap();
        assert_eq!(store.restore_session_snapshot(), None);
    }

    #[test]
    fn test_download_update_replaces_by_id() {
        let (_dir, mut store) = open_temp();
        let mut download = Download {
            id: "d-1".into(),
            filename: "file.zip".into(),
            url: "https://example.com/file.zip".into(),
            total_bytes: 100,
            received_bytes: 0,
            state: DownloadState::Progressing,
            start_time: 0,
            save_path: "/tmp/file.zip".into(),
        };
        store.add_download(&download);

        download.received_bytes = 50;
        store.update_download(&download);

        assert_eq!(store.downloads().len(), 1);
        assert_eq!(store.downloads()[0].received_bytes, 50);
    }

    #[test]
    fn test_last_write_wins_across_handles() {
        let dir = TempDir::new().unwrap();
        let mut first = PersistentStore::open(dir.path());
        let mut second = PersistentStore::open(dir.path());

        first.update_settings(SettingsPatch {
            theme: Some("ocean".to_string()),
            ..Default::default()
        });
        second.update_settings(SettingsPatch {
            default_zoom: Some(1.5),
            ..Default::default()
        });

        // The second handle never saw the first write; its full object
        // replaced the stored one.
        let reopened = PersistentStore::open(dir.path());
        assert_eq!(reopened.settings().default_zoom, 1.5);
        assert_eq!(reopened.settings().theme, "default");
    }
}
