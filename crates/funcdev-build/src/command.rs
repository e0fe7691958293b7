//! External toolchain invocation: dependency installs and the compile
//! stage. Both run with the staging workspace as working directory and
//! capture combined output for operator-facing error reports.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use funcdev_common::{BuildConfig, DevServerError};

/// Install a single digest dependency (cold pass).
///
/// The dependency name is appended to the configured install command.
///
/// # Errors
///
/// Returns [`DevServerError::InstallFailed`] with the captured output if
/// the command exits non-zero or cannot be spawned.
pub async fn run_install(
    config: &BuildConfig,
    staging_root: &Path,
    module: &str,
) -> Result<(), DevServerError> {
    let mut argv = config.install_command.clone();
    argv.push(module.to_string());

    info!(module, "installing dependency");

    run(&argv, staging_root)
        .await
        .map_err(|output| DevServerError::InstallFailed {
            module: module.to_string(),
            output,
        })
}

/// Run the full-workspace compile (warm pass).
///
/// One blocking invocation over the whole staging workspace; there is no
/// per-file or incremental compilation.
///
/// # Errors
///
/// Returns [`DevServerError::CompileFailed`] with the captured output if
/// the compiler exits non-zero or cannot be spawned.
pub async fn run_compile(config: &BuildConfig, staging_root: &Path) -> Result<(), DevServerError> {
    info!(command = ?config.compile_command, "compiling functions");

    run(&config.compile_command, staging_root)
        .await
        .map_err(DevServerError::compile_failed)
}

/// Spawn an argv vector and wait for it, returning captured output as the
/// error on any failure.
async fn run(argv: &[String], cwd: &Path) -> Result<(), String> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| "empty command configured".to_string())?;

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("failed to spawn '{program}': {e}"))?;

    let combined = {
        let mut s = String::from_utf8_lossy(&output.stdout).into_owned();
        s.push_str(&String::from_utf8_lossy(&output.stderr));
        s.trim().to_string()
    };

    if output.status.success() {
        debug!(command = %program, "command succeeded");
        Ok(())
    } else {
        Err(format!("{} ({combined})", output.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_config(compile: &str, install: &str) -> BuildConfig {
        BuildConfig {
            compile_command: vec!["sh".into(), "-c".into(), compile.into()],
            install_command: vec!["sh".into(), "-c".into(), install.into()],
            ..BuildConfig::default()
        }
    }

    #[tokio::test]
    async fn test_compile_success() {
        let dir = tempfile::tempdir().unwrap();
        let config = sh_config("touch compiled.marker", "true");

        run_compile(&config, dir.path()).await.unwrap();
        assert!(dir.path().join("compiled.marker").exists());
    }

    #[tokio::test]
    async fn test_compile_failure_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = sh_config("echo nope >&2; exit 3", "true");

        let err = run_compile(&config, dir.path()).await.unwrap_err();
        match err {
            DevServerError::CompileFailed { output } => assert!(output.contains("nope")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_install_appends_module_name() {
        let dir = tempfile::tempdir().unwrap();
        // With `sh -c`, the appended dependency name arrives as $0
        let config = sh_config("true", r#"echo "$0" >> installed.log"#);

        run_install(&config, dir.path(), "left-pad").await.unwrap();
        let log = std::fs::read_to_string(dir.path().join("installed.log")).unwrap();
        assert_eq!(log.trim(), "left-pad");
    }

    #[tokio::test]
    async fn test_install_failure_names_module() {
        let dir = tempfile::tempdir().unwrap();
        let config = sh_config("true", "exit 1");

        let err = run_install(&config, dir.path(), "broken-dep").await.unwrap_err();
        match err {
            DevServerError::InstallFailed { module, .. } => assert_eq!(module, "broken-dep"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            compile_command: vec!["definitely-not-a-real-compiler".into()],
            ..BuildConfig::default()
        };

        let result = run_compile(&config, dir.path()).await;
        assert!(matches!(result, Err(DevServerError::CompileFailed { .. })));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig {
            compile_command: vec![],
            ..BuildConfig::default()
        };

        let result = run_compile(&config, dir.path()).await;
        assert!(result.is_err());
    }
}
