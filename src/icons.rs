//! Tray icon lifecycle over the shell notification protocol.
//!
//! Each occupied registry slot owns exactly one shell icon, keyed by the
//! slot index. Registration is a two-step handshake (add, then version
//! upgrade); a failed upgrade deletes the icon again so the shell never
//! holds a half-registered entry.

use log::{debug, warn};
use thiserror::Error;

use crate::platform::{IconDescriptor, NotifyArea, ShellError, WindowId, WindowSystem};
use crate::registry::{SlotIndex, WindowRegistry};

/// Tooltip limit of the classic notification icon structure, in UTF-16
/// units including the terminator.
pub const TOOLTIP_MAX_UTF16: usize = 128;

/// Icon registration failures, by handshake step.
#[derive(Debug, Error)]
pub enum IconError {
    #[error("icon registration failed: {0}")]
    Register(ShellError),

    #[error("icon version upgrade failed: {0}")]
    Version(ShellError),

    #[error("icon removal failed: {0}")]
    Remove(ShellError),
}

/// Register a shell icon for `window` under `slot`.
///
/// Fetches the window's icon and title, adds the icon, then upgrades it to
/// the richer callback protocol. If the upgrade is rejected the icon is
/// deleted before reporting failure.
pub fn add_icon<P>(platform: &mut P, slot: SlotIndex, window: WindowId) -> Result<(), IconError>
where
    P: WindowSystem + NotifyArea,
{
    let descriptor = describe(platform, slot, window);
    platform.add(&descriptor).map_err(IconError::Register)?;
    if let Err(err) = platform.set_version(slot) {
        let _ = platform.delete(slot);
        return Err(IconError::Version(err));
    }
    Ok(())
}

/// Delete the icon registered under `slot`.
pub fn remove_icon<P: NotifyArea>(platform: &mut P, slot: SlotIndex) -> Result<(), IconError> {
    platform.delete(slot).map_err(IconError::Remove)
}

/// Re-fetch the window title and push only the tooltip field. Cheap enough
/// to run on every pointer-hover refresh.
pub fn update_tooltip<P>(platform: &mut P, slot: SlotIndex, window: WindowId)
where
    P: WindowSystem + NotifyArea,
{
    let tooltip = truncate_tooltip(&platform.title(window));
    if let Err(err) = platform.modify_tooltip(slot, &tooltip) {
        debug!("tooltip update skipped: {err}");
    }
}

/// Re-register every occupied slot's icon after the notification area was
/// recreated (shell restart). Duplicate adds are rejected by the shell and
/// tolerated here, which makes the operation idempotent.
pub fn re_add_all<P>(platform: &mut P, registry: &WindowRegistry)
where
    P: WindowSystem + NotifyArea,
{
    for (slot, window) in registry.occupied() {
        match add_icon(platform, slot, window) {
            Ok(()) => debug!("re-registered icon for slot {}", slot.index()),
            Err(IconError::Register(err)) => {
                debug!("icon for slot {} already present: {err}", slot.index());
            }
            Err(err) => {
                warn!("failed to re-register icon for slot {}: {err}", slot.index());
            }
        }
    }
}

fn describe<P: WindowSystem>(platform: &P, slot: SlotIndex, window: WindowId) -> IconDescriptor {
    IconDescriptor {
        slot,
        icon: platform.icon(window),
        tooltip: truncate_tooltip(&platform.title(window)),
    }
}

/// Truncate a title to what fits in the shell tooltip buffer.
pub fn truncate_tooltip(title: &str) -> String {
    let mut units = 0;
    let mut out = String::new();
    for ch in title.chars() {
        units += ch.len_utf16();
        if units >= TOOLTIP_MAX_UTF16 {
            break;
        }
        out.push(ch);
    }
    out
}
