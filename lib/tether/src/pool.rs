/// Bounded LIFO free-list for reusing allocation-heavy objects. `acquire`
/// pops the most recently released item or manufactures a fresh one;
/// `release` caches the item unless the pool is already full, in which case
/// the item is simply dropped.
pub struct Pool<T> {
    slots: Vec<T>,
    capacity: usize,
    create: Box<dyn FnMut() -> T>,
}

pub const DEFAULT_POOL_CAPACITY: usize = 100;

impl<T> Pool<T> {
    #[inline]
    pub fn new<F: FnMut() -> T + 'static>(create: F) -> Pool<T> {
        Self::with_capacity(DEFAULT_POOL_CAPACITY, create)
    }

    #[inline]
    pub fn with_capacity<F: FnMut() -> T + 'static>(capacity: usize, create: F) -> Pool<T> {
        Pool {
            slots: Vec::with_capacity(capacity),
            capacity,
            create: Box::new(create),
        }
    }

    /// Provides a cached item if one is available, creates a new one
    /// otherwise.
    #[inline]
    pub fn acquire(&mut self) -> T {
        let create = &mut self.create;
        self.slots.pop().unwrap_or_else(|| create())
    }

    /// Reclaim the supplied item into the pool. Items released beyond the
    /// capacity are dropped.
    #[inline]
    pub fn release(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        }
    }

    /// Number of cached items currently in the pool.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
