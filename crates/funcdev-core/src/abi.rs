//! The guest ABI shared by every compiled function module.
//!
//! A routed module exports:
//! - `memory`: its linear memory
//! - `alloc(len: i32) -> i32`: allocator used to pass the request in
//! - `handle(ptr: i32, len: i32) -> i64`: the default handler; takes a
//!   UTF-8 JSON request document and returns a packed pointer to the UTF-8
//!   JSON response
//! - `route() -> i64` (optional): packed pointer to a path override
//! - `method() -> i64` (optional): packed pointer to a verb override
//!
//! Packed pointers encode `(ptr << 32) | len` in an `i64`, the widest type
//! a core wasm export can return in one value.

use wasmtime::{Instance, Memory, Store, TypedFunc};

use funcdev_common::DevServerError;

/// Linear memory export name.
pub const MEMORY_EXPORT: &str = "memory";
/// Guest allocator export name.
pub const ALLOC_EXPORT: &str = "alloc";
/// Default handler export name.
pub const HANDLER_EXPORT: &str = "handle";
/// Optional route-path override export name.
pub const ROUTE_EXPORT: &str = "route";
/// Optional HTTP-verb override export name.
pub const METHOD_EXPORT: &str = "method";

/// Per-invocation store context.
///
/// Each request (and each load-time metadata probe) gets a fresh store, so
/// guest state never leaks across invocations.
pub struct GuestContext {
    /// Request identifier for tracing; "probe" during metadata extraction.
    pub request_id: String,
}

impl GuestContext {
    /// Create a new context for the given request id.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

/// Split a packed `(ptr << 32) | len` value into pointer and length.
pub fn unpack(packed: i64) -> (usize, usize) {
    let packed = packed as u64;
    ((packed >> 32) as usize, (packed & 0xffff_ffff) as usize)
}

/// Read a packed byte range out of guest memory.
///
/// # Errors
///
/// Returns an error if the range falls outside the guest's linear memory.
pub fn read_bytes(
    store: &mut Store<GuestContext>,
    memory: &Memory,
    packed: i64,
) -> Result<Vec<u8>, DevServerError> {
    let (ptr, len) = unpack(packed);
    let data = memory.data(&store);

    let end = ptr
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            DevServerError::invocation(format!(
                "guest returned out-of-bounds range ptr={ptr} len={len}"
            ))
        })?;

    Ok(data[ptr..end].to_vec())
}

/// Read a packed UTF-8 string out of guest memory.
///
/// # Errors
///
/// Returns an error if the range is out of bounds or not valid UTF-8.
pub fn read_string(
    store: &mut Store<GuestContext>,
    memory: &Memory,
    packed: i64,
) -> Result<String, DevServerError> {
    let bytes = read_bytes(store, memory, packed)?;
    String::from_utf8(bytes)
        .map_err(|e| DevServerError::invocation(format!("guest returned invalid UTF-8: {e}")))
}

/// Copy `bytes` into guest memory via the module's `alloc` export.
///
/// Returns the guest pointer and length to pass to the handler.
///
/// # Errors
///
/// Returns an error if the module lacks the `alloc` or `memory` exports,
/// the allocation call traps, or the returned region is out of bounds.
pub async fn write_bytes(
    store: &mut Store<GuestContext>,
    instance: &Instance,
    bytes: &[u8],
) -> Result<(i32, i32), DevServerError> {
    let len = i32::try_from(bytes.len())
        .map_err(|_| DevServerError::invocation("request body exceeds guest address space"))?;

    let alloc: TypedFunc<i32, i32> = instance
        .get_typed_func(&mut *store, ALLOC_EXPORT)
        .map_err(|e| DevServerError::invocation(format!("missing '{ALLOC_EXPORT}' export: {e}")))?;

    let ptr = alloc
        .call_async(&mut *store, len)
        .await
        .map_err(|e| DevServerError::invocation(format!("guest allocation trapped: {e}")))?;

    let memory = get_memory(store, instance)?;
    let data = memory.data_mut(&mut *store);

    let start = usize::try_from(ptr)
        .map_err(|_| DevServerError::invocation("guest allocator returned a negative pointer"))?;
    let end = start
        .checked_add(bytes.len())
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            DevServerError::invocation(format!(
                "guest allocator returned out-of-bounds region ptr={ptr} len={len}"
            ))
        })?;

    data[start..end].copy_from_slice(bytes);
    Ok((ptr, len))
}

/// Get the module's exported linear memory.
///
/// # Errors
///
/// Returns an error if the module does not export `memory`.
pub fn get_memory(
    store: &mut Store<GuestContext>,
    instance: &Instance,
) -> Result<Memory, DevServerError> {
    instance
        .get_memory(store, MEMORY_EXPORT)
        .ok_or_else(|| DevServerError::invocation(format!("missing '{MEMORY_EXPORT}' export")))
}
