//! The seam between the rebuild machinery and the HTTP front.
//!
//! Rebuild passes hand completed route tables to a [`RoutePublisher`]
//! instead of touching server state directly. The production publisher is
//! the server session (which binds the listener on first publication and
//! swaps the table afterwards); tests substitute a capture mock, so the
//! Cold/Warm machinery is testable without a bound port.

use async_trait::async_trait;

use crate::route::RouteTable;
use funcdev_common::DevServerError;

/// Receives the route table produced by a completed rebuild pass.
#[async_trait]
pub trait RoutePublisher: Send + Sync {
    /// Make `table` the active route table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table could not be made live (e.g. the
    /// listener failed to bind); the rebuild pass that produced the table
    /// fails with it.
    async fn publish(&self, table: RouteTable) -> Result<(), DevServerError>;
}

/// Publishers are commonly shared between the rebuild loop and the
/// shutdown path.
#[async_trait]
impl<T: RoutePublisher + ?Sized> RoutePublisher for std::sync::Arc<T> {
    async fn publish(&self, table: RouteTable) -> Result<(), DevServerError> {
        (**self).publish(table).await
    }
}
