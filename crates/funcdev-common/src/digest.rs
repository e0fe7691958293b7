//! The digest manifest describing a function project.
//!
//! `digest.json` lives at the root of the functions directory and carries
//! two optional fields: the ordered list of dependencies to install on a
//! cold pass, and the list of route paths excluded from the final route
//! table. An absent file is an empty digest; a malformed file is an error
//! (silently serving with stale dependencies would be worse).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DevServerError;

/// Well-known digest file name inside the functions directory.
pub const DIGEST_FILE: &str = "digest.json";

/// The function project manifest.
///
/// Re-read at the start of every cold pass and treated as immutable for
/// the duration of that pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Digest {
    /// Ordered list of dependency names installed during a cold pass.
    #[serde(default)]
    pub modules: Vec<String>,

    /// Route paths omitted from the route table under every verb.
    #[serde(default)]
    pub routeless: Vec<String>,
}

impl Digest {
    /// Load the digest from a functions directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    /// An absent file yields `Digest::default()`.
    pub fn load(functions_dir: impl AsRef<Path>) -> Result<Self, DevServerError> {
        let path = functions_dir.as_ref().join(DIGEST_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| DevServerError::digest(path.display().to_string(), e.to_string()))?;

        serde_json::from_str(&content)
            .map_err(|e| DevServerError::digest(path.display().to_string(), e.to_string()))
    }

    /// Whether a (normalized) route path is excluded by this digest.
    pub fn excludes(&self, path: &str) -> bool {
        self.routeless.iter().any(|p| p == path)
    }

    /// Whether a filesystem path refers to the digest file itself.
    ///
    /// Used by the watcher to classify a change as cold-triggering.
    pub fn is_digest_file(path: impl AsRef<Path>) -> bool {
        path.as_ref()
            .file_name()
            .is_some_and(|name| name == DIGEST_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_file_is_empty_digest() {
        let dir = tempfile::tempdir().unwrap();
        let digest = Digest::load(dir.path()).unwrap();
        assert_eq!(digest, Digest::default());
        assert!(digest.modules.is_empty());
    }

    #[test]
    fn test_load_full_digest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DIGEST_FILE),
            r#"{"modules":["left-pad"],"routeless":["/health"]}"#,
        )
        .unwrap();

        let digest = Digest::load(dir.path()).unwrap();
        assert_eq!(digest.modules, vec!["left-pad"]);
        assert!(digest.excludes("/health"));
        assert!(!digest.excludes("/"));
    }

    #[test]
    fn test_partial_digest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DIGEST_FILE), r#"{"modules":["serde"]}"#).unwrap();

        let digest = Digest::load(dir.path()).unwrap();
        assert_eq!(digest.modules, vec!["serde"]);
        assert!(digest.routeless.is_empty());
    }

    #[test]
    fn test_malformed_digest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DIGEST_FILE), "{not json").unwrap();

        let result = Digest::load(dir.path());
        assert!(matches!(result, Err(DevServerError::Digest { .. })));
    }

    #[test]
    fn test_is_digest_file() {
        assert!(Digest::is_digest_file("/project/functions/digest.json"));
        assert!(Digest::is_digest_file("digest.json"));
        assert!(!Digest::is_digest_file("/project/functions/index.rs"));
        assert!(!Digest::is_digest_file("/project/digest.json.bak"));
    }
}
