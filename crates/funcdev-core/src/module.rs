//! Compiled module wrapping and metadata probing.
//!
//! A [`CompiledModule`] wraps a Wasmtime [`Module`] together with the name
//! it was loaded under. At load time the module is instantiated once to
//! probe its [`ModuleMetadata`]: whether it exposes a usable handler, and
//! any route/verb overrides it declares.

use std::path::Path;

use tracing::{debug, instrument};
use wasmtime::{Linker, Module, TypedFunc};

use crate::abi::{self, ALLOC_EXPORT, HANDLER_EXPORT, METHOD_EXPORT, ROUTE_EXPORT};
use crate::engine::WasmEngine;
use funcdev_common::DevServerError;

/// A compiled WebAssembly function module.
#[derive(Clone)]
pub struct CompiledModule {
    /// Name the module was loaded under (the file stem).
    name: String,
    /// The compiled Wasmtime module.
    module: Module,
}

/// Routing metadata probed from a module's exports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMetadata {
    /// Explicit route-path override, if the module declares one.
    pub route: Option<String>,
    /// Explicit verb override, if the module declares one.
    pub method: Option<String>,
}

impl CompiledModule {
    /// Compile a module from WebAssembly bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a wasm binary or compilation
    /// fails.
    #[instrument(skip(engine, bytes), fields(name = %name, bytes_len = bytes.len()))]
    pub fn from_bytes(
        engine: &WasmEngine,
        name: &str,
        bytes: &[u8],
    ) -> Result<Self, DevServerError> {
        validate_wasm_header(name, bytes)?;

        let module = Module::new(engine.inner(), bytes)
            .map_err(|e| DevServerError::module_load(name, format!("compilation failed: {e}")))?;

        debug!("module compiled");

        Ok(Self {
            name: name.to_string(),
            module,
        })
    }

    /// Compile a module from WebAssembly text format.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed or compiled.
    pub fn from_wat(engine: &WasmEngine, name: &str, wat: &str) -> Result<Self, DevServerError> {
        let module = Module::new(engine.inner(), wat.as_bytes())
            .map_err(|e| DevServerError::module_load(name, format!("compilation failed: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            module,
        })
    }

    /// Load a compiled output file (`.wasm` binary or `.wat` text).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or compiled.
    pub fn from_file(engine: &WasmEngine, path: &Path) -> Result<Self, DevServerError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                DevServerError::module_load(path.display().to_string(), "unusable file name")
            })?
            .to_string();

        let bytes = std::fs::read(path).map_err(|e| {
            DevServerError::module_load(path.display().to_string(), format!("read failed: {e}"))
        })?;

        if path.extension().is_some_and(|ext| ext == "wat") {
            let text = String::from_utf8(bytes).map_err(|e| {
                DevServerError::module_load(path.display().to_string(), format!("not UTF-8: {e}"))
            })?;
            Self::from_wat(engine, &name, &text)
        } else {
            Self::from_bytes(engine, &name, &bytes)
        }
    }

    /// Name the module was loaded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.module
    }

    /// Whether the module exposes the full handler ABI.
    ///
    /// Checked statically against the export list; a module failing this
    /// check is skipped by the loader with a warning.
    pub fn has_handler(&self) -> bool {
        let has_export = |name: &str| self.module.get_export(name).is_some();
        has_export(HANDLER_EXPORT) && has_export(ALLOC_EXPORT) && has_export(abi::MEMORY_EXPORT)
    }

    /// Instantiate once and read the module's routing metadata exports.
    ///
    /// # Errors
    ///
    /// Returns an error if instantiation traps or a declared metadata
    /// export misbehaves (traps or returns an invalid string).
    pub async fn probe_metadata(
        &self,
        engine: &WasmEngine,
    ) -> Result<ModuleMetadata, DevServerError> {
        let mut store = engine.create_store("probe");
        let linker: Linker<abi::GuestContext> = Linker::new(engine.inner());

        let instance = linker
            .instantiate_async(&mut store, &self.module)
            .await
            .map_err(|e| {
                DevServerError::module_load(&self.name, format!("instantiation failed: {e}"))
            })?;

        let memory = abi::get_memory(&mut store, &instance)
            .map_err(|e| DevServerError::module_load(&self.name, e.to_string()))?;

        let mut metadata = ModuleMetadata::default();

        for (export, slot) in [
            (ROUTE_EXPORT, &mut metadata.route),
            (METHOD_EXPORT, &mut metadata.method),
        ] {
            let func: Result<TypedFunc<(), i64>, _> = instance.get_typed_func(&mut store, export);
            let Ok(func) = func else { continue };

            let packed = func.call_async(&mut store, ()).await.map_err(|e| {
                DevServerError::module_load(&self.name, format!("'{export}' export trapped: {e}"))
            })?;

            let value = abi::read_string(&mut store, &memory, packed)
                .map_err(|e| DevServerError::module_load(&self.name, e.to_string()))?;
            *slot = Some(value);
        }

        Ok(metadata)
    }
}

/// Check the 4-byte wasm magic number.
fn validate_wasm_header(name: &str, bytes: &[u8]) -> Result<(), DevServerError> {
    const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

    if bytes.len() < 4 || bytes[..4] != WASM_MAGIC {
        return Err(DevServerError::module_load(name, "not a wasm binary"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use funcdev_common::EngineConfig;

    fn test_engine() -> WasmEngine {
        WasmEngine::new(&EngineConfig::default()).unwrap()
    }

    const FULL_ABI: &str = r#"
        (module
          (memory (export "memory") 1)
          (global $next (mut i32) (i32.const 4096))
          (func (export "alloc") (param $len i32) (result i32)
            (local $ptr i32)
            global.get $next
            local.set $ptr
            global.get $next
            local.get $len
            i32.add
            global.set $next
            local.get $ptr)
          (data (i32.const 8) "{\"ok\":true}")
          (func (export "handle") (param i32 i32) (result i64)
            (i64.or (i64.shl (i64.const 8) (i64.const 32)) (i64.const 11)))
          (data (i32.const 64) "/custom")
          (func (export "route") (result i64)
            (i64.or (i64.shl (i64.const 64) (i64.const 32)) (i64.const 7)))
          (data (i32.const 96) "post")
          (func (export "method") (result i64)
            (i64.or (i64.shl (i64.const 96) (i64.const 32)) (i64.const 4)))
        )
    "#;

    const NO_HANDLER: &str = r#"(module (memory (export "memory") 1))"#;

    #[test]
    fn test_invalid_header_rejected() {
        let engine = test_engine();
        let result = CompiledModule::from_bytes(&engine, "bad", b"\x7fELF...");
        assert!(matches!(result, Err(DevServerError::ModuleLoad { .. })));
    }

    #[test]
    fn test_has_handler() {
        let engine = test_engine();
        let with = CompiledModule::from_wat(&engine, "with", FULL_ABI).unwrap();
        let without = CompiledModule::from_wat(&engine, "without", NO_HANDLER).unwrap();
        assert!(with.has_handler());
        assert!(!without.has_handler());
    }

    #[tokio::test]
    async fn test_probe_metadata_overrides() {
        let engine = test_engine();
        let module = CompiledModule::from_wat(&engine, "admin", FULL_ABI).unwrap();

        let metadata = module.probe_metadata(&engine).await.unwrap();
        assert_eq!(metadata.route.as_deref(), Some("/custom"));
        assert_eq!(metadata.method.as_deref(), Some("post"));
    }

    #[tokio::test]
    async fn test_probe_metadata_absent_exports() {
        let engine = test_engine();
        let module = CompiledModule::from_wat(&engine, "plain", NO_HANDLER).unwrap();

        let metadata = module.probe_metadata(&engine).await.unwrap();
        assert_eq!(metadata, ModuleMetadata::default());
    }

    #[tokio::test]
    async fn test_from_file_wat() {
        let engine = test_engine();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.wat");
        std::fs::write(&path, FULL_ABI).unwrap();

        let module = CompiledModule::from_file(&engine, &path).unwrap();
        assert_eq!(module.name(), "index");
        assert!(module.has_handler());
    }
}
