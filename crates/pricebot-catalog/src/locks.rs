//! Advisory locks per `(product, vendor)` pair
//!
//! Concurrent uploads touching the same pair must not interleave their
//! read-plan-apply cycles on the span set. The embedded database has no
//! `SELECT ... FOR UPDATE`, so serialization is an in-process async mutex
//! keyed by the pair hash, held from span load to mutation apply.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Lock table shared by every ingestion path
#[derive(Default)]
pub struct PairLocks {
    locks: Mutex<HashMap<u64, Arc<AsyncMutex<()>>>>,
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding one `(product, vendor)` pair
    pub fn lock_for(&self, product_id: &Uuid, vendor_id: &Uuid) -> Arc<AsyncMutex<()>> {
        let mut hasher = DefaultHasher::new();
        product_id.hash(&mut hasher);
        vendor_id.hash(&mut hasher);
        let key = hasher.finish();

        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key).or_default())
    }
}
