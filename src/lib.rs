//! Trayward: minimize any window to the notification area.
//!
//! The core is a window-to-tray state manager: a fixed 64-slot registry of
//! tracked windows, a transition engine for minimize/restore/close/refresh,
//! the tray-icon lifecycle protocol, and a single serialized event
//! dispatcher. The OS lives behind narrow traits so every state transition
//! is testable off-platform; the Win32 implementations and the message
//! loop sit in `win32`.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod hook;
pub mod hotkey;
pub mod icons;
pub mod menu;
pub mod platform;
pub mod registry;

#[cfg(windows)]
pub mod win32;
