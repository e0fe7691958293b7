//! Wasm module loading, route inference, and handler invocation for funcdev.
//!
//! This crate turns a directory of compiled function modules into a
//! [`RouteTable`] and executes individual handlers per request:
//! - [`WasmEngine`]: shared Wasmtime engine with epoch-based timeouts
//! - [`CompiledModule`]: a loaded module plus its probed routing metadata
//! - [`ModuleLoader`]: artifact directory scan with per-file isolation
//! - [`Invoker`]: per-request handler execution over the guest ABI
//! - [`RoutePublisher`]: the seam through which rebuilds hand a fresh
//!   table to the HTTP front

pub mod abi;
pub mod engine;
pub mod invoke;
pub mod loader;
pub mod module;
pub mod publisher;
pub mod route;

pub use engine::{EpochTicker, WasmEngine};
pub use invoke::{HandlerRequest, Invoker};
pub use loader::{LoadOutcome, ModuleLoader};
pub use module::{CompiledModule, ModuleMetadata};
pub use publisher::RoutePublisher;
pub use route::{HttpMethod, RouteDescriptor, RouteTable, derive_path};
