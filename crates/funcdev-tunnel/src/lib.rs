//! Public tunnel control-plane client for funcdev.
//!
//! The control plane maps a project id to the developer's local port and
//! hands out a short-lived lease (roughly thirty minutes). [`TunnelClient`]
//! speaks the wire protocol; [`TunnelManager`] owns the lease lifecycle:
//! register on startup (fatal if it fails), renew on a timer comfortably
//! inside the expiry window, deregister on shutdown.

pub mod client;
pub mod manager;

pub use client::{TunnelClient, TunnelCredentials};
pub use manager::TunnelManager;
