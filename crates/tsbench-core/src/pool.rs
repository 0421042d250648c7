//! Explicit reuse pools on top of `opool`.
//!
//! A `Pool` is constructed by its owner and handed to the components that
//! draw from it. Values come back when their `Pooled` guard drops, so they
//! are released on every exit path, error paths included. The allocator
//! resets them before they are handed out again.

use opool::{PoolAllocator, RcGuard};
use std::sync::Arc;

/// Scratch buffers grown past this are dropped instead of kept
pub const MAX_RETAINED_SCRATCH: usize = 16 * 1024 * 1024;

/// A value on loan from a `Pool`; returned to it when dropped
pub type Pooled<A, T> = RcGuard<A, T>;

/// Cloneable handle to a shared, lock-free object pool
pub struct Pool<A: PoolAllocator<T>, T> {
    inner: Arc<opool::Pool<A, T>>,
}

impl<A: PoolAllocator<T>, T> Clone for Pool<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: PoolAllocator<T>, T> Pool<A, T> {
    /// Pool keeping at most `capacity` idle values
    pub fn new(capacity: usize, allocator: A) -> Self {
        Self {
            inner: Arc::new(opool::Pool::new(capacity.max(1), allocator)),
        }
    }

    /// Take an idle value, allocating when none is left.
    ///
    /// The guard owns a handle on the pool, so it can be held across
    /// `.await` points and moved between tasks.
    #[inline]
    pub fn acquire(&self) -> Pooled<A, T> {
        Arc::clone(&self.inner).get_rc()
    }
}

/// Allocator for request encoding buffers
#[derive(Debug, Clone, Copy)]
pub struct ScratchAllocator {
    capacity: usize,
}

impl ScratchAllocator {
    pub const fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl PoolAllocator<Vec<u8>> for ScratchAllocator {
    #[inline]
    fn allocate(&self) -> Vec<u8> {
        Vec::with_capacity(self.capacity)
    }

    #[inline]
    fn reset(&self, obj: &mut Vec<u8>) {
        obj.clear();
    }

    #[inline]
    fn is_valid(&self, obj: &Vec<u8>) -> bool {
        obj.capacity() <= MAX_RETAINED_SCRATCH
    }
}

pub type ScratchPool = Pool<ScratchAllocator, Vec<u8>>;

/// Pool of encoding buffers starting at `buffer_size` bytes
pub fn scratch_pool(capacity: usize, buffer_size: usize) -> ScratchPool {
    Pool::new(capacity, ScratchAllocator::new(buffer_size))
}
