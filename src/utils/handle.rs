use std::hash::Hash;
use std::marker::PhantomData;

/// Generational index into a [`Pool`].
///
/// A handle stays valid until the slot it names is released; releasing bumps
/// the slot generation so stale copies resolve to `None`.
pub struct Handle<T> {
    pub slot: u16,
    pub generation: u32,
    phantom: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(slot: u16, generation: u32) -> Self {
        Self {
            slot,
            generation,
            phantom: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("slot", &self.slot)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

pub struct Pool<T> {
    items: Vec<Option<T>>,
    empty: Vec<usize>,
    generation: Vec<u32>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        const INITIAL_SIZE: usize = 1024;
        Self::new(INITIAL_SIZE)
    }
}

impl<T> Pool<T> {
    pub fn new(initial_size: usize) -> Self {
        let initial_size = initial_size.min(u16::MAX as usize + 1);
        let mut p = Pool {
            items: Vec::with_capacity(initial_size),
            // Reversed so the first insert lands in slot 0.
            empty: (0..initial_size).rev().collect(),
            generation: vec![0; initial_size],
        };
        p.items.resize_with(initial_size, || None);
        p
    }

    pub fn insert(&mut self, item: T) -> Option<Handle<T>> {
        let empty_slot = self.empty.pop()?;
        self.items[empty_slot] = Some(item);
        Some(Handle::new(empty_slot as u16, self.generation[empty_slot]))
    }

    /// Removes the item behind `item`, returning it. Stale handles yield `None`.
    pub fn release(&mut self, item: Handle<T>) -> Option<T> {
        let slot = item.slot as usize;
        if self.generation.get(slot).copied() != Some(item.generation) {
            return None;
        }
        let value = self.items[slot].take()?;
        self.generation[slot] = self.generation[slot].wrapping_add(1);
        self.empty.push(slot);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.items.len() - self.empty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_handles_go_stale() {
        let mut pool: Pool<u32> = Pool::new(4);
        let a = pool.insert(7).unwrap();
        assert_eq!(pool.release(a), Some(7));
        assert_eq!(pool.release(a), None);

        let b = pool.insert(9).unwrap();
        assert_eq!(b.slot, a.slot);
        assert_ne!(b, a);
    }

    #[test]
    fn insert_fails_when_full() {
        let mut pool: Pool<u8> = Pool::new(2);
        assert!(pool.insert(1).is_some());
        assert!(pool.insert(2).is_some());
        assert!(pool.insert(3).is_none());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn stale_handles_survive_many_slot_reuses() {
        let mut pool: Pool<u32> = Pool::new(1);
        let stale = pool.insert(0).unwrap();
        pool.release(stale);
        for i in 0..=u16::MAX as u32 {
            let live = pool.insert(i).unwrap();
            assert_ne!(live, stale);
            assert_eq!(pool.release(live), Some(i));
        }
        let live = pool.insert(1).unwrap();
        assert_eq!(live.slot, stale.slot);
        assert_eq!(pool.release(stale), None);
        assert_eq!(pool.release(live), Some(1));
    }
}
