//! HTTP front for funcdev.
//!
//! Every request funnels through a single fallback handler that consults
//! the live route table, so the axum router itself never changes: warm
//! rebuilds swap the table behind a lock and in-flight requests keep the
//! table they started with. [`ServerSession`] is the production
//! [`RoutePublisher`]: the first published table binds the listener, later
//! ones only swap.
//!
//! [`RoutePublisher`]: funcdev_core::RoutePublisher

pub mod dispatch;
pub mod router;
pub mod session;
pub mod state;

pub use dispatch::AppState;
pub use router::build_router;
pub use session::ServerSession;
pub use state::SharedRoutes;
