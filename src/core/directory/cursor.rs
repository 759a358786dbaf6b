//! Cursor over the section directory

use crate::core::directory::store::SectionStore;

/// Positioned cursor over the keys of a section store
///
/// A failed move leaves the cursor where it was.
pub struct DirectoryCursor<'a, S: SectionStore + ?Sized> {
    store: &'a S,
    current: Option<u64>,
}

impl<'a, S: SectionStore + ?Sized> DirectoryCursor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        DirectoryCursor {
            store,
            current: None,
        }
    }

    /// Position at the first key >= `key`
    pub fn seek(&mut self, key: u64) -> bool {
        self.reposition(self.store.seek_ge(key))
    }

    pub fn seek_to_first(&mut self) -> bool {
        self.reposition(self.store.first_key())
    }

    pub fn seek_to_last(&mut self) -> bool {
        self.reposition(self.store.last_key())
    }

    pub fn move_next(&mut self) -> bool {
        let next = self.current.and_then(|key| self.store.next_key(key));
        self.reposition(next)
    }

    pub fn move_prev(&mut self) -> bool {
        let prev = self.current.and_then(|key| self.store.prev_key(key));
        self.reposition(prev)
    }

    pub fn current_key(&self) -> Option<u64> {
        self.current
    }

    fn reposition(&mut self, key: Option<u64>) -> bool {
        match key {
            Some(key) => {
                self.current = Some(key);
                true
            }
            None => false,
        }
    }
}
