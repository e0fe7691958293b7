//! Artifact directory scanning and route table construction.
//!
//! The loader turns one compiled artifact directory into a fresh
//! [`RouteTable`]. Per-file failures (unreadable file, missing handler,
//! misbehaving metadata export) are recorded as warnings and skip only
//! that file — one broken function must not take down the rest of the
//! project. Only an unreadable artifact directory fails the whole pass.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::WasmEngine;
use crate::module::CompiledModule;
use crate::route::{HttpMethod, RouteDescriptor, RouteTable, derive_path};
use funcdev_common::{DevServerError, Digest};

/// Result of loading an artifact directory.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// The freshly built route table.
    pub table: RouteTable,
    /// Operator-facing warnings recorded during the load.
    pub warnings: Vec<String>,
}

/// Loads compiled output files and infers their routes.
#[derive(Clone)]
pub struct ModuleLoader {
    engine: WasmEngine,
}

impl ModuleLoader {
    /// Create a new loader over the given engine.
    pub fn new(engine: WasmEngine) -> Self {
        Self { engine }
    }

    /// Load every compiled output file in `artifact_dir` into a route table.
    ///
    /// Files are visited in name order so repeated passes over identical
    /// artifacts build identical tables.
    ///
    /// # Errors
    ///
    /// Returns an error only if the artifact directory itself cannot be
    /// read; individual file failures become warnings in the outcome.
    pub async fn load_dir(
        &self,
        artifact_dir: &Path,
        digest: &Digest,
    ) -> Result<LoadOutcome, DevServerError> {
        let mut files: Vec<_> = std::fs::read_dir(artifact_dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == "wasm" || ext == "wat")
            })
            .collect();
        files.sort();

        let mut outcome = LoadOutcome::default();

        for path in files {
            if let Err(reason) = self.load_file(&path, digest, &mut outcome).await {
                outcome
                    .warnings
                    .push(format!("Skipping {}: {reason}", path.display()));
            }
        }

        for warning in &outcome.warnings {
            warn!("{warning}");
        }

        info!(routes = outcome.table.len(), "route table built");
        Ok(outcome)
    }

    /// Load a single file; any returned error skips just this file.
    async fn load_file(
        &self,
        path: &Path,
        digest: &Digest,
        outcome: &mut LoadOutcome,
    ) -> Result<(), String> {
        let module = CompiledModule::from_file(&self.engine, path).map_err(|e| e.to_string())?;

        if !module.has_handler() {
            return Err("module does not export a usable default handler".to_string());
        }

        let metadata = module
            .probe_metadata(&self.engine)
            .await
            .map_err(|e| e.to_string())?;

        let route_path = derive_path(module.name(), metadata.route.as_deref());

        if digest.excludes(&route_path) {
            debug!(path = %route_path, "route excluded by digest");
            return Ok(());
        }

        let method = match metadata.method.as_deref() {
            Some(declared) => {
                let (method, coerced) = HttpMethod::parse_or_default(declared);
                if coerced {
                    outcome.warnings.push(format!(
                        "Invalid method '{declared}' for route '{route_path}', defaulting to GET"
                    ));
                }
                method
            }
            None => HttpMethod::default(),
        };

        let descriptor = RouteDescriptor {
            path: route_path.clone(),
            method,
            module: Arc::new(module),
        };

        if let Some(replaced) = outcome.table.insert(descriptor) {
            outcome.warnings.push(format!(
                "Route collision: {method} '{route_path}' from '{}' was shadowed",
                replaced.module.name()
            ));
        }

        info!(method = %method, path = %route_path, "route registered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funcdev_common::EngineConfig;

    /// Build a WAT handler module with optional route/method overrides.
    fn handler_wat(response: &str, route: Option<&str>, method: Option<&str>) -> String {
        let escaped = response.replace('"', "\\\"");
        let mut wat = format!(
            r#"(module
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
              (data (i32.const 8) "{escaped}")
              (func (export "handle") (param i32 i32) (result i64)
                (i64.or (i64.shl (i64.const 8) (i64.const 32)) (i64.const {})))
            "#,
            response.len()
        );
        if let Some(route) = route {
            wat.push_str(&format!(
                r#"(data (i32.const 1024) "{route}")
                   (func (export "route") (result i64)
                     (i64.or (i64.shl (i64.const 1024) (i64.const 32)) (i64.const {})))
                "#,
                route.len()
            ));
        }
        if let Some(method) = method {
            wat.push_str(&format!(
                r#"(data (i32.const 2048) "{method}")
                   (func (export "method") (result i64)
                     (i64.or (i64.shl (i64.const 2048) (i64.const 32)) (i64.const {})))
                "#,
                method.len()
            ));
        }
        wat.push(')');
        wat
    }

    fn write_fixture(dir: &Path, name: &str, wat: &str) {
        std::fs::write(dir.join(name), wat).unwrap();
    }

    fn loader() -> ModuleLoader {
        ModuleLoader::new(WasmEngine::new(&EngineConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_filename_derivation_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "index.wat", &handler_wat(r#"{"ok":true}"#, None, None));
        write_fixture(dir.path(), "admin.wat", &handler_wat("1", None, Some("post")));
        write_fixture(dir.path(), "other.wat", &handler_wat("2", Some("/custom"), None));

        let outcome = loader().load_dir(dir.path(), &Digest::default()).await.unwrap();

        assert_eq!(outcome.table.len(), 3);
        assert!(outcome.table.lookup("/", HttpMethod::Get).is_some());
        assert!(outcome.table.lookup("/admin", HttpMethod::Post).is_some());
        assert!(outcome.table.lookup("/custom", HttpMethod::Get).is_some());
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_method_coerces_to_get_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "weird.wat", &handler_wat("1", None, Some("trace")));

        let outcome = loader().load_dir(dir.path(), &Digest::default()).await.unwrap();

        assert!(outcome.table.lookup("/weird", HttpMethod::Get).is_some());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("trace"));
    }

    #[tokio::test]
    async fn test_routeless_paths_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "health.wat", &handler_wat("1", Some("/health"), None));
        write_fixture(dir.path(), "index.wat", &handler_wat("2", None, None));

        let digest = Digest {
            modules: vec![],
            routeless: vec!["/health".to_string()],
        };
        let outcome = loader().load_dir(dir.path(), &digest).await.unwrap();

        assert_eq!(outcome.table.len(), 1);
        assert!(!outcome.table.contains_path("/health"));
        // Exclusion is intentional, not a warning
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_broken_module_skipped_others_load() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "good.wat", &handler_wat("1", None, None));
        write_fixture(
            dir.path(),
            "nohandler.wat",
            r#"(module (memory (export "memory") 1))"#,
        );
        std::fs::write(dir.path().join("garbage.wasm"), b"not wasm").unwrap();

        let outcome = loader().load_dir(dir.path(), &Digest::default()).await.unwrap();

        assert_eq!(outcome.table.len(), 1);
        assert!(outcome.table.lookup("/good", HttpMethod::Get).is_some());
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[tokio::test]
    async fn test_non_module_files_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), "index.wat", &handler_wat("1", None, None));
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let outcome = loader().load_dir(dir.path(), &Digest::default()).await.unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_artifact_dir_fails_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("dist");

        let result = loader().load_dir(&missing, &Digest::default()).await;
        assert!(result.is_err());
    }
}
