//! Parameter-signature cache
//!
//! The first lookup for a file scans it once and indexes the signature of
//! every definition by `(line, identifier)`. Later lookups are served from
//! memory until the file is invalidated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use super::file::SourceFile;
use crate::error::{Error, Result};
use crate::syntax::{definitions, Signature};

/// Signatures of one file
type Index = HashMap<(usize, String), Arc<Signature>>;

static GLOBAL: LazyLock<SignatureCache> = LazyLock::new(SignatureCache::new);

/// Per-file memoized signature index
#[derive(Debug, Default)]
pub struct SignatureCache {
    files: Mutex<HashMap<PathBuf, Arc<Index>>>,
    scans: AtomicUsize,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache
    pub fn global() -> &'static SignatureCache {
        &GLOBAL
    }

    /// Signature of `identifier` defined at `line` (or the line after)
    pub fn lookup(
        &self,
        path: impl AsRef<Path>,
        line: usize,
        identifier: &str,
    ) -> Result<Option<Arc<Signature>>> {
        let index = self.index(path.as_ref())?;
        let found = index
            .get(&(line, identifier.to_string()))
            .or_else(|| index.get(&(line + 1, identifier.to_string())))
            .cloned();
        Ok(found)
    }

    /// Every signature in a file, in line order
    pub fn signatures(&self, path: impl AsRef<Path>) -> Result<Vec<Arc<Signature>>> {
        let index = self.index(path.as_ref())?;
        let mut signatures: Vec<Arc<Signature>> = index.values().cloned().collect();
        signatures.sort_by(|a, b| (a.line, &a.identifier).cmp(&(b.line, &b.identifier)));
        Ok(signatures)
    }

    /// Drop the index of one file; returns whether it was cached
    pub fn invalidate(&self, path: impl AsRef<Path>) -> bool {
        let Ok(key) = absolute(path.as_ref()) else {
            return false;
        };
        self.lock().remove(&key).is_some()
    }

    /// Drop every index
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of file scans performed
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Number of files currently indexed
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<Index>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached index, scanning the file while holding the lock if needed
    fn index(&self, path: &Path) -> Result<Arc<Index>> {
        let key = absolute(path)?;
        let mut files = self.lock();
        if let Some(index) = files.get(&key) {
            return Ok(Arc::clone(index));
        }

        let index = Arc::new(self.scan(&key)?);
        files.insert(key, Arc::clone(&index));
        Ok(index)
    }

    fn scan(&self, path: &Path) -> Result<Index> {
        let file = SourceFile::open(path)?;
        self.scans.fetch_add(1, Ordering::Relaxed);

        let index: Index = definitions(file.text())
            .into_iter()
            .map(|definition| {
                let signature = definition.signature;
                ((signature.line, signature.identifier.clone()), Arc::new(signature))
            })
            .collect();
        tracing::debug!(path = %path.display(), definitions = index.len(), "scanned signatures");
        Ok(index)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| Error::unavailable(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SOURCE: &str = "class Greeter\n  def initialize(name, greeting = 'hi')\n  end\n\n  def self.build(*args, **opts, &blk)\n    new(*args)\n  end\n\n  def greet(loud:, times: 1) = name\nend\n";

    fn source_file() -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(SOURCE.as_bytes()).unwrap();
        tmp
    }

    #[test]
    fn test_lookup() {
        let tmp = source_file();
        let cache = SignatureCache::new();

        let init = cache.lookup(tmp.path(), 2, "initialize").unwrap().unwrap();
        assert_eq!(init.pretty(), "name,greeting=?");

        let build = cache.lookup(tmp.path(), 5, "build").unwrap().unwrap();
        assert_eq!(build.receiver.as_deref(), Some("self"));
        assert_eq!(build.pretty(), "*args,**opts,&blk");

        let greet = cache.lookup(tmp.path(), 9, "greet").unwrap().unwrap();
        assert_eq!(greet.keyword_required, vec!["loud"]);
        assert_eq!(greet.keyword_optional, vec!["times"]);

        assert!(cache.lookup(tmp.path(), 2, "missing").unwrap().is_none());
    }

    #[test]
    fn test_lookup_falls_back_to_next_line() {
        let tmp = source_file();
        let cache = SignatureCache::new();
        let init = cache.lookup(tmp.path(), 1, "initialize").unwrap();
        assert_eq!(init.map(|s| s.line), Some(2));
        assert!(cache.lookup(tmp.path(), 0, "initialize").unwrap().is_none());
    }

    #[test]
    fn test_repeated_lookups_scan_once() {
        let tmp = source_file();
        let cache = SignatureCache::new();

        cache.lookup(tmp.path(), 2, "initialize").unwrap();
        cache.lookup(tmp.path(), 2, "initialize").unwrap();
        cache.lookup(tmp.path(), 5, "build").unwrap();
        assert_eq!(cache.scan_count(), 1);
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate(tmp.path()));
        assert!(!cache.invalidate(tmp.path()));
        cache.lookup(tmp.path(), 2, "initialize").unwrap();
        assert_eq!(cache.scan_count(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_rescan_sees_changes() {
        let mut tmp = source_file();
        let cache = SignatureCache::new();
        assert!(cache.lookup(tmp.path(), 11, "added").unwrap().is_none());

        writeln!(tmp, "def added(x)\nend").unwrap();
        tmp.flush().unwrap();
        assert!(cache.lookup(tmp.path(), 11, "added").unwrap().is_none());

        cache.invalidate(tmp.path());
        let added = cache.lookup(tmp.path(), 11, "added").unwrap().unwrap();
        assert_eq!(added.required_leading, vec!["x"]);
    }

    #[test]
    fn test_signatures_in_line_order() {
        let tmp = source_file();
        let cache = SignatureCache::new();
        let names: Vec<String> = cache
            .signatures(tmp.path())
            .unwrap()
            .iter()
            .map(|s| s.identifier.clone())
            .collect();
        assert_eq!(names, vec!["initialize", "build", "greet"]);
    }

    #[test]
    fn test_missing_file() {
        let cache = SignatureCache::new();
        let dir = tempfile::tempdir().unwrap();
        let result = cache.lookup(dir.path().join("nope.rb"), 1, "x");
        assert!(matches!(result, Err(Error::SourceUnavailable { .. })));
        assert_eq!(cache.scan_count(), 0);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(SignatureCache::global(), SignatureCache::global()));
    }
}
