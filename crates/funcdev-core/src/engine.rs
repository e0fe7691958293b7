//! Wasmtime engine configuration and creation.
//!
//! The [`WasmEngine`] is shared across all module loads and invocations.
//! It is configured with async support (every instantiation and call in
//! this crate uses the `_async` variants) and epoch interruption, which
//! backs the per-invocation execution timeout: an [`EpochTicker`] advances
//! the engine epoch on a fixed period and a store whose deadline has passed
//! traps instead of hanging the request.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;
use wasmtime::{Config, Engine, Store};

use crate::abi::GuestContext;
use funcdev_common::{DevServerError, EngineConfig};

/// Thread-safe WebAssembly engine wrapper.
///
/// Contains no per-request state; each invocation creates its own
/// [`wasmtime::Store`].
#[derive(Clone)]
pub struct WasmEngine {
    engine: Arc<Engine>,
    config: EngineConfig,
}

impl WasmEngine {
    /// Create a new WebAssembly engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wasmtime configuration is rejected.
    pub fn new(config: &EngineConfig) -> Result<Self, DevServerError> {
        let mut wasmtime_config = Config::new();

        // All instantiations and calls in this crate are async
        wasmtime_config.async_support(true);

        // Epoch interruption backs the execution timeout
        wasmtime_config.epoch_interruption(true);

        wasmtime_config.cranelift_opt_level(wasmtime::OptLevel::Speed);

        let engine = Engine::new(&wasmtime_config)
            .map_err(|e| DevServerError::invalid_config(format!("Engine creation failed: {e}")))?;

        debug!(
            timeout_ms = config.timeout_ms,
            epoch_tick_ms = config.epoch_tick_ms,
            "Wasm engine created"
        );

        Ok(Self {
            engine: Arc::new(engine),
            config: config.clone(),
        })
    }

    /// Get the underlying Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a fresh store for one invocation.
    ///
    /// The store's epoch deadline is set from the configured timeout, so a
    /// runaway handler traps once the ticker advances past it.
    pub fn create_store(&self, request_id: impl Into<String>) -> Store<GuestContext> {
        let mut store = Store::new(&self.engine, GuestContext::new(request_id));
        store.set_epoch_deadline(self.config.deadline_ticks());
        store
    }

    /// Start the epoch ticker task.
    ///
    /// Without a running ticker the engine epoch never advances and
    /// invocation deadlines never fire; the dev server starts exactly one
    /// ticker for the lifetime of the process.
    pub fn start_epoch_ticker(&self) -> EpochTicker {
        let engine = self.engine.clone();
        let period = self.config.epoch_tick();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                engine.increment_epoch();
            }
        });

        EpochTicker { handle }
    }
}

/// Handle for the background epoch ticker task.
///
/// Dropping the ticker stops the task; stores created afterwards simply
/// never hit their deadlines.
pub struct EpochTicker {
    handle: JoinHandle<()>,
}

impl Drop for EpochTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
