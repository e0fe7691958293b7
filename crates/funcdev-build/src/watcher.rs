//! Filesystem watcher over the functions directory.
//!
//! notify's recommended backend runs on its own thread; events are
//! classified here and bridged into the rebuild loop's tokio channel with
//! `blocking_send`. Hidden paths (the staging workspace, editor droppings)
//! never produce events, and only create/modify/remove kinds count —
//! access events would otherwise retrigger rebuilds from our own source
//! sync.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::rebuild::Change;
use funcdev_common::{DevServerError, Digest};

/// Watches one functions directory and feeds classified changes into the
/// rebuild loop. Dropping the watcher stops the stream.
pub struct FunctionWatcher {
    // Held for its Drop; the backend thread stops when this goes away
    _watcher: RecommendedWatcher,
}

impl FunctionWatcher {
    /// Start watching `functions_dir` recursively, sending classified
    /// changes to `tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watch cannot be established.
    pub fn start(
        functions_dir: &Path,
        tx: mpsc::Sender<Change>,
    ) -> Result<Self, DevServerError> {
        let root = functions_dir.to_path_buf();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "file watch error");
                    return;
                }
            };

            if !is_mutation(&event.kind) {
                return;
            }

            if let Some(change) = classify_event(&root, &event.paths) {
                trace!(?change, paths = ?event.paths, "filesystem change");
                // The rebuild loop owns the receiver; if it is gone we
                // are shutting down and the event can be dropped
                if tx.blocking_send(change).is_err() {
                    debug!("rebuild loop closed, dropping change");
                }
            }
        })
        .map_err(watch_error)?;

        watcher
            .watch(functions_dir, RecursiveMode::Recursive)
            .map_err(watch_error)?;

        debug!(dir = %functions_dir.display(), "watching for changes");
        Ok(Self { _watcher: watcher })
    }
}

fn watch_error(e: notify::Error) -> DevServerError {
    DevServerError::invalid_config(format!("file watch failed: {e}"))
}

fn is_mutation(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Classify an event's paths, taking the strongest change present.
fn classify_event(root: &Path, paths: &[PathBuf]) -> Option<Change> {
    let mut strongest = None;

    for path in paths {
        match classify_path(root, path) {
            Some(Change::Digest) => return Some(Change::Digest),
            Some(Change::Source) => strongest = Some(Change::Source),
            None => {}
        }
    }

    strongest
}

/// Classify a single changed path, or `None` if it must be ignored.
///
/// Anything under a hidden directory component (relative to the watch
/// root) is invisible; this is what keeps the staging workspace's own
/// writes from feeding back into the watcher.
fn classify_path(root: &Path, path: &Path) -> Option<Change> {
    let relative = path.strip_prefix(root).unwrap_or(path);

    let hidden = relative.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
    });
    if hidden {
        return None;
    }

    if Digest::is_digest_file(path) {
        Some(Change::Digest)
    } else {
        Some(Change::Source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_changes_are_cold() {
        let root = Path::new("/proj/functions");
        assert_eq!(
            classify_path(root, Path::new("/proj/functions/digest.json")),
            Some(Change::Digest)
        );
    }

    #[test]
    fn test_source_changes_are_warm() {
        let root = Path::new("/proj/functions");
        assert_eq!(
            classify_path(root, Path::new("/proj/functions/index.wat")),
            Some(Change::Source)
        );
        assert_eq!(
            classify_path(root, Path::new("/proj/functions/lib/util.wat")),
            Some(Change::Source)
        );
    }

    #[test]
    fn test_hidden_paths_are_ignored() {
        let root = Path::new("/proj/functions");
        assert_eq!(
            classify_path(root, Path::new("/proj/functions/.funcdev/index.wat")),
            None
        );
        assert_eq!(
            classify_path(
                root,
                Path::new("/proj/functions/.funcdev/dist/index.wasm")
            ),
            None
        );
        assert_eq!(
            classify_path(root, Path::new("/proj/functions/.index.wat.swp")),
            None
        );
        // A dotted ancestor of the watch root does not hide its contents
        let dotted_root = Path::new("/home/.config/functions");
        assert_eq!(
            classify_path(dotted_root, Path::new("/home/.config/functions/a.wat")),
            Some(Change::Source)
        );
    }

    #[test]
    fn test_event_classification_prefers_digest() {
        let root = Path::new("/proj/functions");
        let paths = vec![
            PathBuf::from("/proj/functions/index.wat"),
            PathBuf::from("/proj/functions/digest.json"),
        ];
        assert_eq!(classify_event(root, &paths), Some(Change::Digest));

        let hidden_only = vec![PathBuf::from("/proj/functions/.funcdev/x")];
        assert_eq!(classify_event(root, &hidden_only), None);
    }

    #[test]
    fn test_mutation_kinds() {
        use notify::event::{CreateKind, ModifyKind, RemoveKind};

        assert!(is_mutation(&EventKind::Create(CreateKind::File)));
        assert!(is_mutation(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_mutation(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_mutation(&EventKind::Access(
            notify::event::AccessKind::Read
        )));
    }
}
