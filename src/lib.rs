//! # KiteBrows — Browser Shell Core
//!
//! Multi-window, multi-tab coordination layer around an embedded
//! web-rendering engine. The engine and the UI presentation layer are
//! external collaborators: the engine implements the [`surface`] contract,
//! the UI receives pushes through [`window::UiSink`] and sends control
//! messages through [`coordinator::SessionCoordinator::route_command`].
//!
//! ## Module map
//!
//! - [`coordinator`] : Process-wide registry of window sessions, command
//!   and event routing, session save/restore across restarts, download
//!   fan-out. The embedder drives it from its own event loop and drains
//!   surface events with `pump()`.
//!
//! - [`window`] : Per-window tab registry and active-tab cursor — tab
//!   create/close/switch/duplicate, navigation, per-tab zoom memory,
//!   surface placement below the reserved chrome strip.
//!
//! - [`tab`] : The identity + surface + metadata record for one browsing
//!   context, and how surface lifecycle events mutate it.
//!
//! - [`surface`] : The contract the engine glue implements — one isolated
//!   rendering context per tab, fire-and-forget operations, asynchronous
//!   lifecycle events.
//!
//! - [`store`] : Durable per-profile JSON documents: bookmarks, capped
//!   history, partial-merge settings, downloads, session snapshot.
//!   Storage errors never surface to callers; in-memory state stays
//!   authoritative.
//!
//! - [`downloads`] : Per-download terminal state machine fed by the
//!   embedded download subsystem, persisted on every tick.
//!
//! - [`filter`] : Allow/block predicate over outbound request URLs —
//!   blocked-host set plus fixed ad/tracker path patterns, fail-open.
//!
//! - [`address`] : Pure URL-vs-search-query classifier for address-bar
//!   input.
//!
//! - [`config`] : Static TOML shell configuration (window dimensions,
//!   reserved chrome height, profile directory).
//!
//! ## Threading
//!
//! Everything here runs on the embedder's main thread. Surface operations
//! never block — completion is observed only through events queued on the
//! [`coordinator::EventHub`] and delivered on the next `pump()`.

pub mod address;
pub mod config;
pub mod coordinator;
pub mod downloads;
pub mod filter;
pub mod store;
pub mod surface;
pub mod tab;
pub mod window;
