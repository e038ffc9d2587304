use std::fmt;

/// A lightweight handle for items in a diagram (states, transitions,
/// comments). Internally a `u64` minted per diagram — Copy, Eq, Hash in
/// O(1), ordered by creation time.
///
/// Ids are never reused: once an item is deleted its id stops resolving,
/// and any stale reference (an undo entry, a transition endpoint) is
/// detectable as a plain lookup miss. Undo re-inserts an item under its
/// original id, so handles held by the command history stay meaningful
/// across delete/undo cycles.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        ItemId(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out `ItemId`s for one diagram, monotonically.
#[derive(Debug, Clone, Default)]
pub struct IdMinter {
    next: u64,
}

impl IdMinter {
    pub fn mint(&mut self) -> ItemId {
        let id = ItemId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_unique_and_ordered() {
        let mut minter = IdMinter::default();
        let a = minter.mint();
        let b = minter.mint();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn display_is_hash_prefixed() {
        let mut minter = IdMinter::default();
        let id = minter.mint();
        assert_eq!(format!("{id}"), "#0");
    }
}
