#![forbid(unsafe_code)]

//! Asset provider capability: where string-table bytes come from.
//!
//! The engine asks for the bytes of exactly one (language, country) pair and
//! never performs region-to-language fallback itself. A provider that wants
//! `en_US` to fall back to `en` resolves that internally.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::code::LocalePair;

/// Source of raw string-table bytes.
pub trait AssetProvider: Send + Sync {
    /// Raw table bytes for `pair`, or `None` when no resource exists.
    fn load_table(&self, pair: LocalePair) -> Option<Vec<u8>>;
}

impl<F> AssetProvider for F
where
    F: Fn(LocalePair) -> Option<Vec<u8>> + Send + Sync,
{
    fn load_table(&self, pair: LocalePair) -> Option<Vec<u8>> {
        self(pair)
    }
}

/// Provider with no resources at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetProvider for NoAssets {
    fn load_table(&self, _pair: LocalePair) -> Option<Vec<u8>> {
        None
    }
}

/// In-memory provider whose contents can change at runtime.
///
/// Useful for tests and for hot reload: replace a pair's bytes, then call
/// `reload` on the contexts using it.
#[derive(Default)]
pub struct MemoryAssets {
    tables: RwLock<HashMap<LocalePair, Arc<[u8]>>>,
    loads: AtomicUsize,
}

impl MemoryAssets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the table bytes for `pair`.
    pub fn insert(&self, pair: LocalePair, bytes: impl Into<Vec<u8>>) {
        let bytes: Arc<[u8]> = bytes.into().into();
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pair, bytes);
    }

    /// Remove the table for `pair`, returning whether one was present.
    pub fn remove(&self, pair: LocalePair) -> bool {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pair)
            .is_some()
    }

    /// Number of `load_table` calls served so far (hits and misses).
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for MemoryAssets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MemoryAssets")
            .field("tables", &tables.len())
            .field("loads", &self.load_count())
            .finish()
    }
}

impl AssetProvider for MemoryAssets {
    fn load_table(&self, pair: LocalePair) -> Option<Vec<u8>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pair)
            .map(|bytes| bytes.to_vec())
    }
}

/// Provider reading `<root>/<language>_<COUNTRY>.<ext>` files.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
    extension: String,
}

impl DirAssets {
    /// Default table file extension.
    pub const DEFAULT_EXTENSION: &'static str = "bin";

    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: Self::DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Use a different file extension (without the dot).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path consulted for `pair`.
    #[must_use]
    pub fn path_for(&self, pair: LocalePair) -> PathBuf {
        self.root
            .join(pair.asset_name())
            .with_extension(&self.extension)
    }
}

impl AssetProvider for DirAssets {
    fn load_table(&self, pair: LocalePair) -> Option<Vec<u8>> {
        let path = self.path_for(pair);
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no string table on disk");
                None
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read string table");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(language: &str, country: &str) -> LocalePair {
        LocalePair::new(language, country).unwrap()
    }

    #[test]
    fn no_assets_is_always_empty() {
        assert!(NoAssets.load_table(pair("en", "US")).is_none());
    }

    #[test]
    fn closures_are_providers() {
        let provider = |p: LocalePair| (p.language.as_str() == "fr").then(|| vec![1, 2, 3]);
        assert_eq!(provider.load_table(pair("fr", "FR")), Some(vec![1, 2, 3]));
        assert_eq!(provider.load_table(pair("de", "DE")), None);
    }

    #[test]
    fn memory_assets_exact_pair_only() {
        let assets = MemoryAssets::new();
        assets.insert(pair("en", "US"), b"us".to_vec());
        assert_eq!(assets.load_table(pair("en", "US")), Some(b"us".to_vec()));
        assert_eq!(assets.load_table(pair("en", "GB")), None);
        assert_eq!(assets.load_table(pair("en", "")), None);
        assert_eq!(assets.load_count(), 3);
    }

    #[test]
    fn memory_assets_replace_and_remove() {
        let assets = MemoryAssets::new();
        assets.insert(pair("en", "US"), b"v1".to_vec());
        assets.insert(pair("en", "US"), b"v2".to_vec());
        assert_eq!(assets.load_table(pair("en", "US")), Some(b"v2".to_vec()));
        assert!(assets.remove(pair("en", "US")));
        assert!(!assets.remove(pair("en", "US")));
        assert_eq!(assets.load_table(pair("en", "US")), None);
    }

    #[test]
    fn dir_assets_paths() {
        let assets = DirAssets::new("/res/strings");
        assert_eq!(
            assets.path_for(pair("zh", "CN")),
            PathBuf::from("/res/strings/zh_CN.bin")
        );
        let assets = assets.with_extension("tbl");
        assert_eq!(
            assets.path_for(pair("zh", "")),
            PathBuf::from("/res/strings/zh.tbl")
        );
    }

    #[test]
    fn dir_assets_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fr_FR.bin"), b"table").unwrap();
        let assets = DirAssets::new(dir.path());
        assert_eq!(assets.load_table(pair("fr", "FR")), Some(b"table".to_vec()));
        assert_eq!(assets.load_table(pair("fr", "CA")), None);
    }
}
