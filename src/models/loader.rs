//! Model bundle loader

use crate::error::BundleError;
use crate::models::bundle::Bundle;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where the bundle is looked for when nothing else is configured
pub const DEFAULT_BUNDLE_CANDIDATES: [&str; 2] =
    ["career_fit_model.json", "artifacts/career_fit_model.json"];

/// Loads the first readable bundle from an ordered list of paths.
///
/// The result is cached by the loader instance: once a bundle has been
/// loaded, later calls hand out the same `Arc` without touching disk.
pub struct BundleLoader {
    candidates: Vec<PathBuf>,
    cached: OnceCell<Arc<Bundle>>,
}

impl BundleLoader {
    /// Create a loader over the given candidate paths, tried in order
    pub fn new<I, P>(candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            cached: OnceCell::new(),
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Load the bundle, or return the cached one.
    ///
    /// Candidates that exist but cannot be parsed are skipped with a
    /// warning. Fails with [`BundleError::Missing`] when no candidate exists,
    /// or with the last parse error when none could be read.
    pub fn load(&self) -> Result<Arc<Bundle>, BundleError> {
        self.cached
            .get_or_try_init(|| self.load_uncached().map(Arc::new))
            .cloned()
    }

    fn load_uncached(&self) -> Result<Bundle, BundleError> {
        let mut last_error = None;

        for path in &self.candidates {
            if !path.exists() {
                debug!(path = %path.display(), "Bundle candidate not found");
                continue;
            }

            match Bundle::from_file(path) {
                Ok(bundle) => return Ok(bundle),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load bundle candidate, skipping");
                    last_error = Some(e);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| BundleError::Missing {
            candidates: self.candidates.clone(),
        });
        debug!(candidates = self.candidates.len(), "No usable model bundle");
        Err(err)
    }
}

impl Default for BundleLoader {
    fn default() -> Self {
        Self::new(DEFAULT_BUNDLE_CANDIDATES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bundle::tests::bundle_json;

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let loader = BundleLoader::new([dir.path().join("career_fit_model.json")]);

        match loader.load() {
            Err(BundleError::Missing { candidates }) => assert_eq!(candidates.len(), 1),
            other => panic!("expected missing-artifact error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("career_fit_model.json");
        let second = dir.path().join("artifacts").join("career_fit_model.json");
        std::fs::create_dir_all(second.parent().unwrap()).unwrap();
        std::fs::write(&first, bundle_json(&["เพศ", "ชั้นปี", "GPA"], None)).unwrap();
        std::fs::write(&second, bundle_json(&["เพศ_หญิง", "เพศ_ชาย", "ชั้นปี", "GPA"], None)).unwrap();

        let bundle = BundleLoader::new([&first, &second]).load().unwrap();
        assert_eq!(bundle.source(), Some(first.as_path()));
    }

    #[test]
    fn test_skips_unreadable_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        let good = dir.path().join("good.json");
        std::fs::write(&broken, "{\"feature_cols\": []}").unwrap();
        std::fs::write(&good, bundle_json(&["GPA"], None)).unwrap();

        let bundle = BundleLoader::new([&broken, &good]).load().unwrap();
        assert_eq!(bundle.source(), Some(good.as_path()));
    }

    #[test]
    fn test_all_candidates_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "[]").unwrap();

        let err = BundleLoader::new([&broken]).load().unwrap_err();
        assert!(matches!(err, BundleError::Invalid { .. }));
    }

    #[test]
    fn test_load_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("career_fit_model.json");
        std::fs::write(&path, bundle_json(&["GPA"], None)).unwrap();

        let loader = BundleLoader::new([&path]);
        let first = loader.load().unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = loader.load().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_default_candidates() {
        let loader = BundleLoader::default();
        assert_eq!(
            loader.candidates(),
            &[
                PathBuf::from("career_fit_model.json"),
                PathBuf::from("artifacts/career_fit_model.json")
            ]
        );
    }
}
