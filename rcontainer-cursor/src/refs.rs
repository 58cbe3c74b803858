//! The tag -> object/class reference table shared by forked cursors.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Key used in a [`Cursor`](crate::Cursor)'s reference table. Widened to
/// `u64` to hold `record_relative_offset + kMapOffset` arithmetic without
/// truncating on large files, even though the wire tag itself is 32 bits.
pub type RefKey = u64;

/// Shared tag -> object/class reference table: a mapping from 32-bit tag to
/// either a class descriptor or a decoded object.
///
/// This crate has no opinion on what a "class descriptor" or "decoded
/// object" is -- that is the format-specific crate's business -- so the
/// table is generic over an opaque, cheaply-cloneable payload. Cloning a
/// `RefTable` shares the same underlying map, which is how
/// [`Cursor::copied`](crate::Cursor::copied) implements forks that
/// represent the same logical decode scope.
#[derive(Clone)]
pub struct RefTable<T>(Rc<RefCell<HashMap<RefKey, T>>>);

impl<T> Default for RefTable<T> {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(HashMap::new())))
    }
}

impl<T: Clone> RefTable<T> {
    /// Creates a fresh, empty reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `key`, overwriting any previous entry.
    pub fn insert(&self, key: RefKey, value: T) {
        self.0.borrow_mut().insert(key, value);
    }

    /// Looks up `key`.
    pub fn get(&self, key: RefKey) -> Option<T> {
        self.0.borrow().get(&key).cloned()
    }

    /// Returns `true` if `key` has a registered entry.
    pub fn contains(&self, key: RefKey) -> bool {
        self.0.borrow().contains_key(&key)
    }

    /// The number of entries currently registered.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// True if no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}
