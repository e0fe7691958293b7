//! The live route table shared between dispatch and rebuilds.

use std::sync::Arc;

use parking_lot::RwLock;

use funcdev_core::RouteTable;

/// Swappable handle on the active route table.
///
/// Readers grab an `Arc` snapshot and keep it for the whole request, so a
/// swap mid-request never mixes old and new routes. The write lock is
/// held only for the pointer swap.
#[derive(Clone, Default)]
pub struct SharedRoutes {
    inner: Arc<RwLock<Arc<RouteTable>>>,
}

impl SharedRoutes {
    /// Create a handle over an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the active table.
    pub fn current(&self) -> Arc<RouteTable> {
        Arc::clone(&self.inner.read())
    }

    /// Replace the active table.
    pub fn swap(&self, table: RouteTable) {
        *self.inner.write() = Arc::new(table);
    }
}
