//! The staging workspace: an isolated copy of the function source tree.
//!
//! The workspace lives in a hidden directory inside the functions
//! directory (hidden so the watcher never sees build output as source
//! changes). It is recreated wholesale on every cold pass; warm passes
//! refresh the source copy and clear the artifact directory before
//! compiling. Nothing outside this module writes into it.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use funcdev_common::{BuildConfig, DevServerError, Digest};

/// Name of the generated build descriptor inside the staging workspace.
pub const DESCRIPTOR_FILE: &str = "build.toml";

/// The staging workspace for one functions directory.
#[derive(Debug, Clone)]
pub struct StagingWorkspace {
    functions_dir: PathBuf,
    config: BuildConfig,
}

/// Generated build descriptor: compiler settings plus the package section
/// naming the digest dependencies, for the external toolchain to consume.
#[derive(Debug, Serialize)]
struct BuildDescriptor<'a> {
    package: PackageSection<'a>,
    compiler: CompilerSection<'a>,
}

#[derive(Debug, Serialize)]
struct PackageSection<'a> {
    name: &'static str,
    dependencies: &'a [String],
}

#[derive(Debug, Serialize)]
struct CompilerSection<'a> {
    command: &'a [String],
    artifact_dir: &'a str,
}

impl StagingWorkspace {
    /// Create a workspace handle for the given functions directory.
    pub fn new(functions_dir: impl Into<PathBuf>, config: BuildConfig) -> Self {
        Self {
            functions_dir: functions_dir.into(),
            config,
        }
    }

    /// The build configuration this workspace was created with.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Root of the staging workspace.
    pub fn root(&self) -> PathBuf {
        self.functions_dir.join(&self.config.staging_dir)
    }

    /// Directory the compiler places loadable outputs in.
    pub fn artifact_dir(&self) -> PathBuf {
        self.root().join(&self.config.artifact_dir)
    }

    /// Delete and remake the workspace from scratch (cold pass).
    ///
    /// # Errors
    ///
    /// Returns an error on filesystem failure.
    pub fn recreate(&self) -> Result<(), DevServerError> {
        let root = self.root();
        if root.exists() {
            debug!(root = %root.display(), "removing old staging workspace");
            std::fs::remove_dir_all(&root)?;
        }
        std::fs::create_dir_all(&root)?;
        Ok(())
    }

    /// Write the generated build descriptor (cold pass).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_descriptor(&self, digest: &Digest) -> Result<(), DevServerError> {
        let descriptor = BuildDescriptor {
            package: PackageSection {
                name: "functions-dev-env",
                dependencies: &digest.modules,
            },
            compiler: CompilerSection {
                command: &self.config.compile_command,
                artifact_dir: &self.config.artifact_dir,
            },
        };

        let content = toml::to_string_pretty(&descriptor)
            .map_err(|e| DevServerError::invalid_config(format!("descriptor encoding: {e}")))?;
        std::fs::write(self.root().join(DESCRIPTOR_FILE), content)?;
        Ok(())
    }

    /// Copy the function sources into the workspace, overwriting previous
    /// copies. Hidden entries (including the workspace itself) are skipped.
    ///
    /// Returns the number of files copied.
    ///
    /// # Errors
    ///
    /// Returns an error on filesystem failure.
    pub fn sync_sources(&self) -> Result<usize, DevServerError> {
        let root = self.root();
        std::fs::create_dir_all(&root)?;
        copy_tree(&self.functions_dir, &root)
    }

    /// Delete the previous compile output (warm pass).
    ///
    /// # Errors
    ///
    /// Returns an error on filesystem failure.
    pub fn clear_artifacts(&self) -> Result<(), DevServerError> {
        let dir = self.artifact_dir();
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Recursively copy `src` into `dst`, skipping hidden entries.
fn copy_tree(src: &Path, dst: &Path) -> Result<usize, DevServerError> {
    let mut copied = 0;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_str().is_some_and(|n| n.starts_with('.')) {
            continue;
        }

        let target = dst.join(&name);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
            copied += copy_tree(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}
