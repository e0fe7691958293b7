//! Build pipeline for funcdev: staging workspace management, the external
//! compile/install stages, the Cold/Warm rebuild state machine, and the
//! file watcher that drives it.
//!
//! The flow per pass:
//! - **Cold**: re-read the digest, recreate the staging workspace, write
//!   the build descriptor, install every digest dependency in order, then
//!   fall through to Warm.
//! - **Warm**: sync function sources into staging, clear old artifacts,
//!   run the compiler once over the workspace, load the outputs into a
//!   fresh route table, and hand it to the [`RoutePublisher`].
//!
//! [`RoutePublisher`]: funcdev_core::RoutePublisher

pub mod command;
pub mod rebuild;
pub mod staging;
pub mod watcher;

pub use rebuild::{Change, Rebuilder};
pub use staging::StagingWorkspace;
pub use watcher::FunctionWatcher;
