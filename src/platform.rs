//! Platform seam: opaque OS handles and the traits the core drives.
//!
//! The state manager itself never touches the OS. Everything it needs from
//! the window system and the shell notification area is expressed here as
//! two narrow traits, implemented for real in `crate::win32` and by an
//! in-memory fake in the test suites. This keeps every transition and
//! dispatch path exercisable on any host.

use std::time::Duration;

use thiserror::Error;

use crate::registry::SlotIndex;

/// Opaque identifier of a live top-level window.
///
/// Wraps the raw OS handle value. Uniqueness per live window is an OS
/// guarantee; the registry relies on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowId(isize);

impl WindowId {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> isize {
        self.0
    }
}

/// Opaque icon image handle (HICON on Windows).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IconHandle(isize);

impl IconHandle {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> isize {
        self.0
    }
}

/// A shell notification call was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("shell rejected {operation} for slot {slot}")]
pub struct ShellError {
    /// Which notification operation failed ("add", "modify", ...).
    pub operation: &'static str,
    /// Slot whose icon the call targeted.
    pub slot: usize,
}

/// Everything a tray icon carries when it is registered with the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconDescriptor {
    /// Slot index, doubling as the shell icon ID.
    pub slot: SlotIndex,
    /// Icon image to display.
    pub icon: IconHandle,
    /// Tooltip text, pre-truncated to the shell limit.
    pub tooltip: String,
}

/// Window queries and commands used by the transition engine.
///
/// Query methods take `&self`; anything that changes window state takes
/// `&mut self` so the single-writer discipline is visible in the types.
pub trait WindowSystem {
    /// Whether the handle still refers to a live window.
    fn exists(&self, window: WindowId) -> bool;

    /// Whether the window is currently visible.
    fn is_visible(&self, window: WindowId) -> bool;

    /// Current window title (empty when unavailable).
    fn title(&self, window: WindowId) -> String;

    /// Best icon for the window, falling back to a system default.
    fn icon(&self, window: WindowId) -> IconHandle;

    /// Whether the window is an MDI child frame.
    fn is_mdi_child(&self, window: WindowId) -> bool;

    /// Whether the window is a child window rather than top-level.
    fn is_child(&self, window: WindowId) -> bool;

    /// Top-level ancestor of a child window.
    fn top_level_ancestor(&self, window: WindowId) -> WindowId;

    /// Whether the window carries a minimize box.
    fn has_minimize_box(&self, window: WindowId) -> bool;

    /// Current foreground window, if any.
    fn foreground_window(&self) -> Option<WindowId>;

    fn minimize(&mut self, window: WindowId);

    fn hide(&mut self, window: WindowId);

    fn restore(&mut self, window: WindowId);

    fn show(&mut self, window: WindowId);

    fn set_foreground(&mut self, window: WindowId);

    /// Ask the window to close without blocking on its answer.
    fn request_close(&mut self, window: WindowId);

    /// Block the event loop for a bounded delay (close-confirmation poll).
    fn sleep(&mut self, duration: Duration);
}

/// The shell notification-area protocol, keyed by slot ID.
pub trait NotifyArea {
    /// Register a new icon. Fails if the shell rejects it, including when
    /// an icon with the same ID is already present.
    fn add(&mut self, descriptor: &IconDescriptor) -> Result<(), ShellError>;

    /// Upgrade a freshly added icon to the richer callback protocol.
    fn set_version(&mut self, slot: SlotIndex) -> Result<(), ShellError>;

    /// Push a new tooltip for an existing icon, leaving icon and flags as
    /// they are.
    fn modify_tooltip(&mut self, slot: SlotIndex, tooltip: &str) -> Result<(), ShellError>;

    /// Delete the icon with this slot ID.
    fn delete(&mut self, slot: SlotIndex) -> Result<(), ShellError>;
}
