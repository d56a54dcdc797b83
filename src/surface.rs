//! The rendering-surface contract.
//!
//! A surface is an opaque, isolated rendering context bound to one
//! navigable document, owned by exactly one tab. The engine glue
//! implements [`Surface`] and [`SurfaceFactory`]; the core never sees the
//! engine itself.
//!
//! All operations are fire-and-forget: completion is observed only through
//! later [`SurfaceEvent`]s delivered to the registered observer, never
//! through a return value. Events may arrive long after the call — or
//! never, if the engine never resolves the navigation.

use crate::tab::TabId;
use crate::window::WindowHandle;

/// Load-failure code for a voluntarily aborted navigation (superseded by a
/// newer navigation, tab closed mid-load). Expected and frequent; not a
/// real failure.
pub const ERR_ABORTED: i32 = -3;

/// Returns `true` for failure codes of the cancellation class.
pub fn is_cancellation(code: i32) -> bool {
    code == ERR_ABORTED
}

/// Placement rectangle for an attached surface, in window-content pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Lifecycle events emitted by a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    LoadingStarted,
    LoadingStopped,
    /// The document URL changed (navigation, redirect, in-page).
    Navigated(String),
    /// The document title changed.
    TitleChanged(String),
    /// The document favicon changed (URI reference).
    IconChanged(String),
    /// A load ended in failure. Cancellation-class codes (see
    /// [`is_cancellation`]) are expected noise; everything else is
    /// recorded for diagnostics and leaves the previous content visible.
    LoadFailed { code: i32, description: String },
    /// The page asked for a new browsing context (`target="_blank"`,
    /// popup). The surface denies it; the owning window answers by
    /// opening a tab with this URL instead.
    NewTargetRequested(String),
}

/// Callback a tab registers on its surface. Must not be invoked after
/// [`Surface::clear_observer`].
pub type SurfaceObserver = Box<dyn Fn(SurfaceEvent)>;

/// One isolated rendering context.
pub trait Surface {
    fn load(&mut self, url: &str);
    fn reload(&mut self);
    fn stop(&mut self);

    fn go_back(&mut self);
    fn go_forward(&mut self);
    fn can_go_back(&self) -> bool;
    fn can_go_forward(&self) -> bool;

    fn set_zoom(&mut self, factor: f64);

    fn find_in_page(&mut self, text: &str);
    fn stop_find_in_page(&mut self);

    fn open_devtools(&mut self);
    fn close_devtools(&mut self);
    fn is_devtools_open(&self) -> bool;

    /// Attaches the surface to its window's visible area at `bounds`.
    /// At most one surface per window is attached at a time.
    fn attach(&mut self, bounds: SurfaceBounds);
    fn detach(&mut self);

    fn set_observer(&mut self, observer: SurfaceObserver);
    fn clear_observer(&mut self);
}

/// Creates surfaces for new tabs.
///
/// Returns `None` when the engine cannot create a rendering context; the
/// caller logs and skips tab creation. The factory is expected to log the
/// underlying reason itself.
pub trait SurfaceFactory {
    fn create_surface(&self, window: WindowHandle, tab: TabId) -> Option<Box<dyn Surface>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted fake for the test suite
// ─────────────────────────────────────────────────────────────────────────────
