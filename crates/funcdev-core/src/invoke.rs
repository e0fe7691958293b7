//! Per-request handler invocation.
//!
//! Each request gets a fresh [`wasmtime::Store`], so handler state never
//! leaks between requests. The request document is marshaled into guest
//! memory through the `alloc` export, the `handle` export runs, and the
//! packed response is read back and parsed as JSON. Traps and malformed
//! responses surface as [`DevServerError::Invocation`], which the HTTP
//! front converts to a generic 500 — they never escalate further.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use wasmtime::{Linker, TypedFunc};

use crate::abi::{self, GuestContext, HANDLER_EXPORT};
use crate::engine::WasmEngine;
use crate::module::CompiledModule;
use funcdev_common::DevServerError;

/// The request document passed to a handler.
///
/// `body` is the decoded payload for verbs that carry one (POST, PUT,
/// PATCH) and `Value::Null` for all others.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerRequest {
    /// Decoded query parameters.
    pub query: BTreeMap<String, String>,
    /// Decoded request body, or null.
    pub body: Value,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
}

impl HandlerRequest {
    /// Create an empty request with a null body.
    pub fn new() -> Self {
        Self {
            query: BTreeMap::new(),
            body: Value::Null,
            headers: BTreeMap::new(),
        }
    }
}

impl Default for HandlerRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes handlers against the shared engine.
#[derive(Clone)]
pub struct Invoker {
    engine: WasmEngine,
}

impl Invoker {
    /// Create a new invoker over the given engine.
    pub fn new(engine: WasmEngine) -> Self {
        Self { engine }
    }

    /// The engine this invoker executes on.
    pub fn engine(&self) -> &WasmEngine {
        &self.engine
    }

    /// Invoke a module's handler for one request.
    ///
    /// # Errors
    ///
    /// Returns [`DevServerError::Invocation`] if instantiation or the call
    /// traps (including epoch-deadline timeouts), or if the guest returns
    /// something that is not UTF-8 JSON.
    pub async fn invoke(
        &self,
        module: &CompiledModule,
        request: &HandlerRequest,
        request_id: &str,
    ) -> Result<Value, DevServerError> {
        let mut store = self.engine.create_store(request_id);
        let linker: Linker<GuestContext> = Linker::new(self.engine.inner());

        let instance = linker
            .instantiate_async(&mut store, module.inner())
            .await
            .map_err(|e| DevServerError::invocation(format!("instantiation failed: {e}")))?;

        let request_json = serde_json::to_vec(request)
            .map_err(|e| DevServerError::invocation(format!("request encoding failed: {e}")))?;

        let (ptr, len) = abi::write_bytes(&mut store, &instance, &request_json).await?;

        let handle: TypedFunc<(i32, i32), i64> = instance
            .get_typed_func(&mut store, HANDLER_EXPORT)
            .map_err(|e| {
                DevServerError::invocation(format!("missing '{HANDLER_EXPORT}' export: {e}"))
            })?;

        let packed = handle
            .call_async(&mut store, (ptr, len))
            .await
            .map_err(|e| DevServerError::invocation(format!("handler trapped: {e}")))?;

        let memory = abi::get_memory(&mut store, &instance)?;
        let response = abi::read_bytes(&mut store, &memory, packed)?;

        debug!(
            module = module.name(),
            request_id,
            response_len = response.len(),
            "handler returned"
        );

        serde_json::from_slice(&response)
            .map_err(|e| DevServerError::invocation(format!("handler returned invalid JSON: {e}")))
    }
}
