//! Grow-only object pools for per-step contact data.

/// Pool of reusable `T` values addressed by slot index.
///
/// [`ObjectPool::allocate`] hands out the next unused slot and doubles the
/// backing storage when it runs out. [`ObjectPool::free_all`] makes every slot
/// available again without dropping anything. A slot keeps whatever the
/// previous user left in it, so callers overwrite every field after allocating.
#[derive(Debug)]
pub struct ObjectPool<T> {
    items: Vec<T>,
    used: usize,
}

impl<T: Default> ObjectPool<T> {
    pub fn new(initial_size: usize) -> Self {
        let mut items = Vec::with_capacity(initial_size);
        items.resize_with(initial_size, T::default);
        Self { items, used: 0 }
    }

    /// Take the next free slot.
    pub fn allocate(&mut self) -> usize {
        if self.used >= self.items.len() {
            let grow_to = (self.items.len() * 2).max(1);
            self.items.resize_with(grow_to, T::default);
        }
        let slot = self.used;
        self.used += 1;
        slot
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.items[..self.used].get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.items[..self.used].get_mut(slot)
    }

    /// Release every slot. Backing storage is kept.
    pub fn free_all(&mut self) {
        self.used = 0;
    }

    /// Number of slots handed out since the last [`ObjectPool::free_all`].
    pub fn used(&self) -> usize {
        self.used
    }

    /// Number of slots backed by storage.
    pub fn capacity(&self) -> usize {
        self.items.len()
    }
}

impl<T: Default> Default for ObjectPool<T> {
    fn default() -> Self {
        Self::new(1)
    }
}
