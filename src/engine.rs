//! Window transition engine: Normal ⇄ Tray state changes.
//!
//! Each operation is a short critical section over the registry and the
//! shell icon set; there is no durable "in transition" state. The engine
//! keeps one invariant at all times: a window is either visible and
//! untracked, or hidden with exactly one occupied slot and one live icon.
//! Rollback paths exist so a failure can never strand a window hidden and
//! untracked.

use std::time::Duration;

use log::{debug, info, warn};

use crate::icons;
use crate::platform::{NotifyArea, WindowId, WindowSystem};
use crate::registry::{SlotIndex, WindowRegistry};

/// Bounded delays for the close-confirmation poll. Two short steps: check
/// after the first, sleep again only if the window is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePoll {
    pub first_delay: Duration,
    pub second_delay: Duration,
}

impl Default for ClosePoll {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_millis(50),
            second_delay: Duration::from_millis(50),
        }
    }
}

/// The transition engine. Owns the slot table and the platform handle; all
/// mutation goes through the four transition operations.
pub struct TrayEngine<P> {
    platform: P,
    registry: WindowRegistry,
    close_poll: ClosePoll,
}

impl<P> TrayEngine<P>
where
    P: WindowSystem + NotifyArea,
{
    pub fn new(platform: P, close_poll: ClosePoll) -> Self {
        Self {
            platform,
            registry: WindowRegistry::new(),
            close_poll,
        }
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Window currently tracked under `slot`, if any.
    pub fn window_at(&self, slot: SlotIndex) -> Option<WindowId> {
        self.registry.get(slot)
    }

    /// Normal → Tray. Returns `true` when the window ends up tracked.
    ///
    /// MDI children are refused outright: their parent frame is the unit
    /// of tray management. A child window resolves to its top-level
    /// ancestor first (minimize controls sometimes live in a child).
    pub fn minimize_to_tray(&mut self, window: WindowId) -> bool {
        if self.platform.is_mdi_child(window) {
            debug!("ignoring minimize of MDI child {:?}", window);
            return false;
        }
        let window = if self.platform.is_child(window) {
            self.platform.top_level_ancestor(window)
        } else {
            window
        };

        // Minimize before hiding: some window procedures post visibility
        // notifications synchronously from inside the minimize call, and a
        // refresh arriving then must not see a half-made entry.
        self.platform.minimize(window);
        self.platform.hide(window);

        if self.registry.find(window).is_some() {
            return true;
        }

        let Some(slot) = self.registry.find_empty() else {
            info!("tray table full, leaving {:?} on the taskbar", window);
            self.undo_minimize(window);
            return false;
        };

        self.registry.occupy(slot, window);
        if let Err(err) = icons::add_icon(&mut self.platform, slot, window) {
            warn!("could not register tray icon for {:?}: {err}", window);
            self.registry.clear(slot);
            self.undo_minimize(window);
            return false;
        }
        true
    }

    /// Tray → Normal. Restores placement, shows, focuses, then removes the
    /// tray entry, strictly in that order, so the entry only disappears
    /// once the window is visible again. Returns `false` without mutating
    /// anything when the window is not tracked.
    pub fn restore_from_tray(&mut self, window: WindowId) -> bool {
        let Some(slot) = self.registry.find(window) else {
            return false;
        };
        self.platform.restore(window);
        self.platform.show(window);
        self.platform.set_foreground(window);
        self.remove_entry(slot);
        true
    }

    /// Ask the tracked window to close, then poll briefly for it to
    /// disappear. An uncooperative window (close prompt, refusal) keeps
    /// its entry; its own dialog re-showing the window is reconciled by
    /// `refresh_in_tray` later.
    pub fn close_from_tray(&mut self, window: WindowId) {
        let Some(slot) = self.registry.find(window) else {
            return;
        };

        // Non-blocking request: a synchronous close would freeze the event
        // loop behind any "save changes?" prompt.
        self.platform.request_close(window);

        self.platform.sleep(self.close_poll.first_delay);
        if self.platform.exists(window) {
            self.platform.sleep(self.close_poll.second_delay);
        }

        if self.platform.exists(window) {
            warn!(
                "{:?} still alive after close poll, keeping its tray entry",
                window
            );
        } else {
            self.remove_entry(slot);
        }
    }

    /// Idempotent reconciliation for one window. Removes the entry when
    /// the window died or became visible again behind our back; otherwise
    /// just refreshes the tooltip.
    pub fn refresh_in_tray(&mut self, window: WindowId) {
        let Some(slot) = self.registry.find(window) else {
            return;
        };
        if !self.platform.exists(window) || self.platform.is_visible(window) {
            self.remove_entry(slot);
        } else {
            icons::update_tooltip(&mut self.platform, slot, window);
        }
    }

    /// Re-register all icons after the shell notification area was
    /// recreated.
    pub fn re_add_all(&mut self) {
        icons::re_add_all(&mut self.platform, &self.registry);
    }

    /// Destroy slot and icon as one unit. If the shell refuses the delete
    /// the slot stays occupied so the pair remains consistent; a later
    /// refresh retries the removal.
    fn remove_entry(&mut self, slot: SlotIndex) {
        match icons::remove_icon(&mut self.platform, slot) {
            Ok(()) => self.registry.clear(slot),
            Err(err) => warn!("slot {} kept, icon delete failed: {err}", slot.index()),
        }
    }

    fn undo_minimize(&mut self, window: WindowId) {
        self.platform.restore(window);
        self.platform.show(window);
        self.platform.set_foreground(window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockPlatform, MockWindow};
    use crate::registry::MAX_TRAY_ITEMS;

    fn zero_poll() -> ClosePoll {
        ClosePoll {
            first_delay: Duration::ZERO,
            second_delay: Duration::ZERO,
        }
    }

    fn engine_with(platform: MockPlatform) -> TrayEngine<MockPlatform> {
        TrayEngine::new(platform, zero_poll())
    }

    /// Occupied slots and live icons must agree after any sequence.
    fn assert_no_leak_no_ghost(engine: &TrayEngine<MockPlatform>) {
        assert_eq!(
            engine.registry().occupied_count(),
            engine.platform().icons.len(),
            "slot table and icon set out of sync"
        );
    }

    #[test]
    fn test_minimize_hides_window_and_creates_entry() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Editor");
        let mut engine = engine_with(platform);

        assert!(engine.minimize_to_tray(window));

        assert!(!engine.platform().is_visible(window));
        assert_eq!(engine.registry().find(window).map(|s| s.index()), Some(0));
        assert_eq!(
            engine.platform().icons.values().next().map(String::as_str),
            Some("Editor")
        );
        assert_no_leak_no_ghost(&engine);
    }

    #[test]
    fn test_minimize_rejects_mdi_child() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_window(
            1,
            MockWindow {
                mdi_child: true,
                ..MockWindow::default()
            },
        );
        let mut engine = engine_with(platform);

        assert!(!engine.minimize_to_tray(window));
        assert!(engine.platform().is_visible(window));
        assert_eq!(engine.registry().occupied_count(), 0);
    }

    #[test]
    fn test_minimize_of_child_walks_to_top_level_ancestor() {
        let mut platform = MockPlatform::new();
        let frame = platform.insert_titled(1, "Frame");
        let control = platform.insert_window(
            2,
            MockWindow {
                child_of: Some(frame),
                ..MockWindow::default()
            },
        );
        let mut engine = engine_with(platform);

        assert!(engine.minimize_to_tray(control));

        // The frame is what gets tracked, not the child control.
        assert!(engine.registry().find(frame).is_some());
        assert!(engine.registry().find(control).is_none());
        assert!(!engine.platform().is_visible(frame));
    }

    #[test]
    fn test_minimize_already_tracked_window_adds_nothing() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Editor");
        let mut engine = engine_with(platform);

        assert!(engine.minimize_to_tray(window));
        assert!(engine.minimize_to_tray(window));

        assert_eq!(engine.registry().occupied_count(), 1);
        assert_eq!(engine.platform().icons.len(), 1);
    }

    #[test]
    fn test_minimize_rolls_back_when_table_full() {
        let mut platform = MockPlatform::new();
        let mut windows = Vec::new();
        for i in 0..MAX_TRAY_ITEMS + 1 {
            windows.push(platform.insert_titled(i as isize + 1, "w"));
        }
        let mut engine = engine_with(platform);

        for window in &windows[..MAX_TRAY_ITEMS] {
            assert!(engine.minimize_to_tray(*window));
        }
        let extra = windows[MAX_TRAY_ITEMS];
        assert!(!engine.minimize_to_tray(extra));

        // The overflow window is visible, focused, and untracked; the
        // table is unchanged.
        assert!(engine.platform().is_visible(extra));
        assert_eq!(engine.platform().foreground, Some(extra));
        assert_eq!(engine.registry().occupied_count(), MAX_TRAY_ITEMS);
        assert_no_leak_no_ghost(&engine);
    }

    #[test]
    fn test_minimize_rolls_back_when_shell_rejects_icon() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Editor");
        platform.fail_add = true;
        let mut engine = engine_with(platform);

        assert!(!engine.minimize_to_tray(window));

        assert!(engine.platform().is_visible(window));
        assert_eq!(engine.registry().occupied_count(), 0);
        assert_no_leak_no_ghost(&engine);
    }

    #[test]
    fn test_minimize_rolls_back_when_version_upgrade_fails() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Editor");
        platform.fail_set_version = true;
        let mut engine = engine_with(platform);

        assert!(!engine.minimize_to_tray(window));

        assert!(engine.platform().is_visible(window));
        assert_eq!(engine.registry().occupied_count(), 0);
        assert!(engine.platform().icons.is_empty());
    }

    #[test]
    fn test_one_free_slot_scenario() {
        let mut platform = MockPlatform::new();
        let mut windows = Vec::new();
        for i in 0..MAX_TRAY_ITEMS + 1 {
            windows.push(platform.insert_titled(i as isize + 1, "w"));
        }
        let mut engine = engine_with(platform);

        // Fill all but one slot.
        for window in &windows[..MAX_TRAY_ITEMS - 1] {
            assert!(engine.minimize_to_tray(*window));
        }
        let a = windows[MAX_TRAY_ITEMS - 1];
        let b = windows[MAX_TRAY_ITEMS];

        assert!(engine.minimize_to_tray(a));
        assert!(engine.registry().find(a).is_some());

        assert!(!engine.minimize_to_tray(b));
        assert!(engine.platform().is_visible(b));
        assert!(engine.registry().find(b).is_none());
        assert_no_leak_no_ghost(&engine);
    }

    #[test]
    fn test_restore_shows_focuses_and_clears_entry() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Editor");
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(window);
        assert!(engine.restore_from_tray(window));

        assert!(engine.platform().is_visible(window));
        assert_eq!(engine.platform().foreground, Some(window));
        assert_eq!(engine.registry().occupied_count(), 0);
        assert_no_leak_no_ghost(&engine);
    }

    #[test]
    fn test_restore_untracked_is_noop() {
        let mut platform = MockPlatform::new();
        let tracked = platform.insert_titled(1, "A");
        let stranger = platform.insert_titled(2, "B");
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(tracked);
        assert!(!engine.restore_from_tray(stranger));

        assert_eq!(engine.registry().occupied_count(), 1);
        assert_eq!(engine.platform().icons.len(), 1);
    }

    #[test]
    fn test_slot_ids_stay_stable_across_neighbour_restore() {
        let mut platform = MockPlatform::new();
        let a = platform.insert_titled(1, "A");
        let b = platform.insert_titled(2, "B");
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(a);
        engine.minimize_to_tray(b);
        let slot_b = engine.registry().find(b).unwrap();

        engine.restore_from_tray(a);

        // B keeps its slot (and therefore its shell icon ID).
        assert_eq!(engine.registry().find(b), Some(slot_b));
    }

    #[test]
    fn test_close_cooperative_window_removes_entry() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_window(
            1,
            MockWindow {
                close_after_sleeps: Some(1),
                ..MockWindow::default()
            },
        );
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(window);
        engine.close_from_tray(window);

        assert_eq!(engine.registry().occupied_count(), 0);
        assert!(engine.platform().icons.is_empty());
    }

    #[test]
    fn test_close_slow_window_caught_by_second_poll() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_window(
            1,
            MockWindow {
                close_after_sleeps: Some(2),
                ..MockWindow::default()
            },
        );
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(window);
        engine.close_from_tray(window);

        assert_eq!(engine.platform().sleeps.len(), 2);
        assert_eq!(engine.registry().occupied_count(), 0);
    }

    #[test]
    fn test_close_uncooperative_window_keeps_entry() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_window(
            1,
            MockWindow {
                close_after_sleeps: None,
                ..MockWindow::default()
            },
        );
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(window);
        engine.close_from_tray(window);

        // The window refused to close; the entry stays, bounded wait only.
        assert_eq!(engine.registry().occupied_count(), 1);
        assert_eq!(engine.platform().icons.len(), 1);
        assert_eq!(engine.platform().sleeps.len(), 2);
        assert_no_leak_no_ghost(&engine);
    }

    #[test]
    fn test_close_untracked_window_does_nothing() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "A");
        let mut engine = engine_with(platform);

        engine.close_from_tray(window);
        assert!(engine.platform().sleeps.is_empty());
        assert!(engine.platform().exists(window));
    }

    #[test]
    fn test_refresh_removes_entry_for_revisible_window() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Editor");
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(window);
        // The window re-shows itself (e.g. its own dialog de-hid it).
        engine.platform_mut().show(window);

        engine.refresh_in_tray(window);
        assert_eq!(engine.registry().occupied_count(), 0);
        assert!(engine.platform().icons.is_empty());

        // Idempotent: repeated refreshes change nothing further.
        engine.refresh_in_tray(window);
        engine.refresh_in_tray(window);
        assert_eq!(engine.registry().occupied_count(), 0);
    }

    #[test]
    fn test_refresh_removes_entry_for_dead_window() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Editor");
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(window);
        engine.platform_mut().windows.get_mut(&window).unwrap().exists = false;

        engine.refresh_in_tray(window);
        assert_eq!(engine.registry().occupied_count(), 0);
        assert!(engine.platform().icons.is_empty());
    }

    #[test]
    fn test_refresh_updates_tooltip_for_hidden_tracked_window() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Old");
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(window);
        engine
            .platform_mut()
            .windows
            .get_mut(&window)
            .unwrap()
            .title = "New".to_string();

        engine.refresh_in_tray(window);

        let slot = engine.registry().find(window).unwrap();
        assert_eq!(
            engine.platform().icons.get(&slot).map(String::as_str),
            Some("New")
        );
    }

    #[test]
    fn test_failed_icon_delete_keeps_slot_until_refresh_heals() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Editor");
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(window);
        engine.platform_mut().fail_delete = true;
        engine.restore_from_tray(window);

        // Delete was refused: the pair stays together, slot and icon both
        // present, even though the window is visible again.
        assert_eq!(engine.registry().occupied_count(), 1);
        assert_eq!(engine.platform().icons.len(), 1);

        // Once the shell cooperates, the next refresh clears the entry.
        engine.platform_mut().fail_delete = false;
        engine.refresh_in_tray(window);
        assert_eq!(engine.registry().occupied_count(), 0);
        assert!(engine.platform().icons.is_empty());
    }

    #[test]
    fn test_refresh_untracked_is_noop() {
        let mut platform = MockPlatform::new();
        let window = platform.insert_titled(1, "Editor");
        let mut engine = engine_with(platform);

        engine.refresh_in_tray(window);
        assert_eq!(engine.registry().occupied_count(), 0);
    }

    #[test]
    fn test_minimize_restore_sequences_never_desync() {
        let mut platform = MockPlatform::new();
        let a = platform.insert_titled(1, "A");
        let b = platform.insert_titled(2, "B");
        let c = platform.insert_titled(3, "C");
        let mut engine = engine_with(platform);

        engine.minimize_to_tray(a);
        assert_no_leak_no_ghost(&engine);
        engine.minimize_to_tray(b);
        assert_no_leak_no_ghost(&engine);
        engine.restore_from_tray(a);
        assert_no_leak_no_ghost(&engine);
        engine.minimize_to_tray(c);
        assert_no_leak_no_ghost(&engine);
        engine.restore_from_tray(b);
        assert_no_leak_no_ghost(&engine);
        engine.restore_from_tray(c);
        assert_no_leak_no_ghost(&engine);
        assert_eq!(engine.registry().occupied_count(), 0);
    }
}
