//! Fixed-capacity slot table mapping slot indices to tracked windows.
//!
//! The slot index is the stable identity of a tray entry: it is handed to
//! the shell as the notification icon ID and must not change while the
//! slot is occupied. Lookups are linear scans over the 64-entry table.

use crate::platform::WindowId;

/// Maximum number of simultaneously tracked windows.
pub const MAX_TRAY_ITEMS: usize = 64;

/// Index of one slot in the tracking table, also used as the shell icon ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(usize);

impl SlotIndex {
    /// Build a slot index from a raw value, rejecting out-of-range input
    /// (shell callbacks echo the ID back and are not trusted blindly).
    pub fn new(index: usize) -> Option<Self> {
        (index < MAX_TRAY_ITEMS).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// The slot table. A window handle occupies at most one slot at a time;
/// callers uphold that by checking `find` before `occupy`.
#[derive(Debug)]
pub struct WindowRegistry {
    slots: [Option<WindowId>; MAX_TRAY_ITEMS],
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self {
            slots: [None; MAX_TRAY_ITEMS],
        }
    }

    /// Slot currently holding `window`, if it is tracked.
    pub fn find(&self, window: WindowId) -> Option<SlotIndex> {
        self.slots
            .iter()
            .position(|slot| *slot == Some(window))
            .map(SlotIndex)
    }

    /// First empty slot (first-fit), or `None` when the table is full.
    pub fn find_empty(&self) -> Option<SlotIndex> {
        self.slots
            .iter()
            .position(|slot| slot.is_none())
            .map(SlotIndex)
    }

    pub fn occupy(&mut self, slot: SlotIndex, window: WindowId) {
        debug_assert!(self.find(window).is_none(), "window already tracked");
        self.slots[slot.0] = Some(window);
    }

    pub fn clear(&mut self, slot: SlotIndex) {
        self.slots[slot.0] = None;
    }

    /// Window held by `slot`, if any.
    pub fn get(&self, slot: SlotIndex) -> Option<WindowId> {
        self.slots[slot.0]
    }

    /// Iterate over occupied slots in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (SlotIndex, WindowId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|window| (SlotIndex(i), window)))
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(raw: isize) -> WindowId {
        WindowId::from_raw(raw)
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = WindowRegistry::new();
        assert_eq!(registry.occupied_count(), 0);
        assert_eq!(registry.find_empty(), SlotIndex::new(0));
    }

    #[test]
    fn test_find_empty_is_first_fit() {
        let mut registry = WindowRegistry::new();
        let s0 = registry.find_empty().unwrap();
        registry.occupy(s0, w(1));
        let s1 = registry.find_empty().unwrap();
        registry.occupy(s1, w(2));
        assert_eq!(s0.index(), 0);
        assert_eq!(s1.index(), 1);

        // Clearing the lower slot makes it the next candidate again.
        registry.clear(s0);
        assert_eq!(registry.find_empty(), Some(s0));
    }

    #[test]
    fn test_find_locates_occupied_slot() {
        let mut registry = WindowRegistry::new();
        let slot = registry.find_empty().unwrap();
        registry.occupy(slot, w(42));

        assert_eq!(registry.find(w(42)), Some(slot));
        assert_eq!(registry.get(slot), Some(w(42)));
        assert_eq!(registry.find(w(43)), None);
    }

    #[test]
    fn test_clear_releases_slot() {
        let mut registry = WindowRegistry::new();
        let slot = registry.find_empty().unwrap();
        registry.occupy(slot, w(7));
        registry.clear(slot);

        assert_eq!(registry.find(w(7)), None);
        assert_eq!(registry.get(slot), None);
        assert_eq!(registry.occupied_count(), 0);
    }

    #[test]
    fn test_full_table_has_no_empty_slot() {
        let mut registry = WindowRegistry::new();
        for i in 0..MAX_TRAY_ITEMS {
            let slot = registry.find_empty().unwrap();
            registry.occupy(slot, w(i as isize + 1));
        }
        assert_eq!(registry.find_empty(), None);
        assert_eq!(registry.occupied_count(), MAX_TRAY_ITEMS);
    }

    #[test]
    fn test_occupied_iterates_in_index_order() {
        let mut registry = WindowRegistry::new();
        registry.occupy(SlotIndex::new(5).unwrap(), w(50));
        registry.occupy(SlotIndex::new(2).unwrap(), w(20));

        let entries: Vec<_> = registry.occupied().collect();
        assert_eq!(
            entries,
            vec![
                (SlotIndex::new(2).unwrap(), w(20)),
                (SlotIndex::new(5).unwrap(), w(50)),
            ]
        );
    }

    #[test]
    fn test_slot_index_bounds() {
        assert!(SlotIndex::new(0).is_some());
        assert!(SlotIndex::new(MAX_TRAY_ITEMS - 1).is_some());
        assert!(SlotIndex::new(MAX_TRAY_ITEMS).is_none());
    }
}
