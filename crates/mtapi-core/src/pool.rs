//! Fixed-capacity slab pool with generational handles.
//!
//! Two pieces, grounded directly in the reference C runtime this pool
//! design was distilled from:
//!
//! - [`IdPool`]: a lock-protected ring buffer of free slot ids, `1..=capacity`
//!   with `0` reserved as the permanently-invalid id. `allocate` pops the
//!   next free id under the lock; `deallocate` pushes an id back. The ring
//!   (rather than a stack) is deliberate — it spreads reuse across the whole
//!   id space instead of always handing back the most-recently-freed slot.
//! - [`Pool<T>`]: wraps an `IdPool` with parallel storage. `allocate`
//!   stamps the returned handle's `tag` from the slot's current generation;
//!   `deallocate` clears the slot and bumps its generation so any handle
//!   still pointing at it fails [`Pool::is_valid`] forever after.

use crate::handle::Handle;
use crate::spinlock::SpinLock;
use std::sync::atomic::{AtomicU32, Ordering};

const INVALID_ID: u32 = 0;

struct IdPoolInner {
    buffer: Vec<u32>,
    capacity: u32,
    get_pos: u32,
    put_pos: u32,
    available: u32,
}

/// A lock-protected ring buffer of free ids in `1..=capacity`.
pub struct IdPool {
    inner: SpinLock<IdPoolInner>,
}

impl IdPool {
    pub fn new(capacity: u32) -> Self {
        let mut buffer = vec![0u32; capacity as usize + 1];
        buffer[0] = INVALID_ID;
        for (i, slot) in buffer.iter_mut().enumerate().skip(1) {
            *slot = i as u32;
        }
        IdPool {
            inner: SpinLock::new(IdPoolInner {
                buffer,
                capacity,
                get_pos: 1,
                put_pos: 0,
                available: capacity,
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.inner.lock().capacity
    }

    pub fn available(&self) -> u32 {
        self.inner.lock().available
    }

    /// Pop a free id, or `INVALID_ID` if the pool is exhausted.
    pub fn allocate(&self) -> u32 {
        let mut inner = self.inner.lock();
        if inner.available == 0 {
            return INVALID_ID;
        }
        inner.available -= 1;

        let pos = inner.get_pos;
        inner.get_pos += 1;
        if inner.get_pos > inner.capacity {
            inner.get_pos = 0;
        }

        let id = inner.buffer[pos as usize];
        inner.buffer[pos as usize] = INVALID_ID;
        id
    }

    /// Return `id` to the pool.
    pub fn deallocate(&self, id: u32) {
        let mut inner = self.inner.lock();
        if inner.available >= inner.capacity {
            return;
        }
        let pos = inner.put_pos;
        inner.put_pos += 1;
        if inner.put_pos > inner.capacity {
            inner.put_pos = 0;
        }
        inner.buffer[pos as usize] = id;
        inner.available += 1;
    }
}

struct Slot<T> {
    tag: AtomicU32,
    value: SpinLock<Option<T>>,
}

/// A fixed-capacity pool of `T`, addressed by generational [`Handle<T>`].
pub struct Pool<T> {
    id_pool: IdPool,
    slots: Vec<Slot<T>>,
}

impl<T> Pool<T> {
    pub fn new(capacity: u32) -> Self {
        let mut slots = Vec::with_capacity(capacity as usize);
        slots.resize_with(capacity as usize, || Slot {
            tag: AtomicU32::new(0),
            value: SpinLock::new(None),
        });
        Pool {
            id_pool: IdPool::new(capacity),
            slots,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn allocated_count(&self) -> u32 {
        self.capacity() - self.id_pool.available()
    }

    /// Allocate a slot and initialize it via `make`, which receives the
    /// handle the slot was just stamped with (so `T` can keep a copy of its
    /// own handle, the way task/action records do for self-reference).
    /// Returns `None` if the pool is exhausted.
    pub fn allocate_with(&self, make: impl FnOnce(Handle<T>) -> T) -> Option<Handle<T>> {
        let id = self.id_pool.allocate();
        if id == INVALID_ID {
            return None;
        }
        let idx = (id - 1) as usize;
        let tag = self.slots[idx].tag.load(Ordering::Acquire);
        let handle = Handle::new(id, tag);
        *self.slots[idx].value.lock() = Some(make(handle));
        Some(handle)
    }

    /// Free the slot named by `handle`, bumping its generation tag so any
    /// other copy of this handle becomes invalid. Returns the stored value,
    /// or `None` if the handle was already stale.
    pub fn deallocate(&self, handle: Handle<T>) -> Option<T> {
        if !self.is_valid(handle) {
            return None;
        }
        let idx = (handle.id - 1) as usize;
        let value = self.slots[idx].value.lock().take();
        self.slots[idx].tag.fetch_add(1, Ordering::AcqRel);
        self.id_pool.deallocate(handle.id);
        value
    }

    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        if handle.id == INVALID_ID || handle.id > self.capacity() {
            return false;
        }
        let idx = (handle.id - 1) as usize;
        self.slots[idx].tag.load(Ordering::Acquire) == handle.tag
    }

    pub fn with<R>(&self, handle: Handle<T>, f: impl FnOnce(&T) -> R) -> Option<R> {
        if !self.is_valid(handle) {
            return None;
        }
        let idx = (handle.id - 1) as usize;
        let guard = self.slots[idx].value.lock();
        guard.as_ref().map(f)
    }

    pub fn with_mut<R>(&self, handle: Handle<T>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        if !self.is_valid(handle) {
            return None;
        }
        let idx = (handle.id - 1) as usize;
        let mut guard = self.slots[idx].value.lock();
        guard.as_mut().map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_pool_allocates_all_then_exhausts() {
        let pool = IdPool::new(4);
        let mut seen = vec![];
        for _ in 0..4 {
            let id = pool.allocate();
            assert_ne!(id, INVALID_ID);
            seen.push(id);
        }
        assert_eq!(pool.allocate(), INVALID_ID);
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[test]
    fn id_pool_reuses_after_deallocate() {
        let pool = IdPool::new(2);
        let a = pool.allocate();
        let _b = pool.allocate();
        assert_eq!(pool.allocate(), INVALID_ID);
        pool.deallocate(a);
        let c = pool.allocate();
        assert_eq!(c, a);
    }

    struct Widget(u32);

    #[test]
    fn pool_allocate_and_access() {
        let pool: Pool<Widget> = Pool::new(8);
        let h = pool.allocate_with(|_h| Widget(42)).unwrap();
        assert!(pool.is_valid(h));
        let v = pool.with(h, |w| w.0).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn handle_invalid_after_deallocate_and_reuse() {
        let pool: Pool<Widget> = Pool::new(1);
        let h1 = pool.allocate_with(|_| Widget(1)).unwrap();
        pool.deallocate(h1);
        assert!(!pool.is_valid(h1));

        let h2 = pool.allocate_with(|_| Widget(2)).unwrap();
        assert_eq!(h2.id, h1.id);
        assert_ne!(h2.tag, h1.tag);
        assert!(!pool.is_valid(h1));
        assert!(pool.is_valid(h2));
    }

    #[test]
    fn pool_exhaustion_returns_none() {
        let pool: Pool<Widget> = Pool::new(1);
        let _h = pool.allocate_with(|_| Widget(0)).unwrap();
        assert!(pool.allocate_with(|_| Widget(1)).is_none());
    }

    #[test]
    fn concurrent_allocate_yields_unique_handles() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let pool: Arc<Pool<Widget>> = Arc::new(Pool::new(256));
        let mut handles = vec![];
        for t in 0..8u32 {
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                let mut got = vec![];
                for i in 0..32 {
                    if let Some(h) = pool.allocate_with(|_| Widget(t * 100 + i)) {
                        got.push(h);
                    }
                }
                got
            }));
        }
        let mut all_ids = HashSet::new();
        for h in handles {
            for handle in h.join().unwrap() {
                assert!(all_ids.insert(handle.id), "duplicate id allocated");
            }
        }
        assert_eq!(all_ids.len(), 256);
    }
}
