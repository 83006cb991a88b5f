//! Thread-local record builder pool
//!
//! Marshaling stages every field before laying out the record. Reusing the
//! staging buffers means that after warmup the hot path allocates only the
//! returned record.

use crate::record::RecordBuilder;
use std::cell::RefCell;

/// Maximum builders kept per thread
pub const MAX_POOL_SIZE: usize = 4;

thread_local! {
    static BUILDER_POOL: RefCell<Vec<RecordBuilder>> = RefCell::new(Vec::with_capacity(MAX_POOL_SIZE));
}

/// Builder pool operations
pub struct ScratchPool;

impl ScratchPool {
    /// Take a reset builder from the pool, or allocate one
    pub fn acquire() -> RecordBuilder {
        BUILDER_POOL.with(|pool| match pool.borrow_mut().pop() {
            Some(mut builder) => {
                builder.reset();
                builder
            }
            None => RecordBuilder::new(),
        })
    }

    /// Return a builder; dropped if the pool is full
    pub fn release(builder: RecordBuilder) {
        BUILDER_POOL.with(|pool| {
            let mut pool = pool.borrow_mut();
            if pool.len() < MAX_POOL_SIZE {
                pool.push(builder);
            }
        });
    }

    /// Builders currently pooled on this thread
    pub fn pool_size() -> usize {
        BUILDER_POOL.with(|pool| pool.borrow().len())
    }

    #[cfg(test)]
    pub(crate) fn clear() {
        BUILDER_POOL.with(|pool| pool.borrow_mut().clear());
    }
}
