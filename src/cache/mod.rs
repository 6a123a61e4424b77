//! Content-addressable cache for optimized images.
//!
//! ```text
//! <cache_dir>/
//! ├── 3f9a…c2.png      # optimized result for source bytes with that digest
//! └── 71be…09.jpg
//! ```
//!
//! Entries are write-once and never evicted. A reader sees either no entry
//! or a complete one: writes land in a temp file beside the entry and are
//! renamed into place. The cache is an optimization only; when the directory
//! is unusable every lookup is a miss.

mod key;

pub use key::{CacheKey, ContentHash};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CacheError, TransformError};
use crate::{debug, log};

/// Disambiguates temp files written by concurrent tasks.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Result of [`ImageCache::lookup_or_compute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached {
    pub bytes: Vec<u8>,
    pub hit: bool,
}

/// On-disk content-addressed store.
#[derive(Debug, Clone)]
pub struct ImageCache {
    /// `None` when caching is unavailable for this run.
    dir: Option<PathBuf>,
}

impl ImageCache {
    /// Open (creating if needed) the cache directory.
    ///
    /// Failure to create it disables caching instead of failing the run.
    pub fn open(dir: &Path) -> Self {
        match fs::create_dir_all(dir) {
            Ok(()) => Self {
                dir: Some(dir.to_path_buf()),
            },
            Err(e) => {
                log!("cache"; "disabled, cannot create {}: {}", dir.display(), e);
                Self::disabled()
            }
        }
    }

    /// A cache that never hits and never stores.
    pub const fn disabled() -> Self {
        Self { dir: None }
    }

    /// Path of the entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(key.file_name()))
    }

    /// Read the entry for `key`, if present.
    pub fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let Some(path) = self.entry_path(key) else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Store `bytes` under `key`. Existing entries are left alone.
    pub fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let Some(path) = self.entry_path(key) else {
            return Ok(());
        };
        if path.exists() {
            return Ok(());
        }
        write_atomic(&path, bytes).map_err(|source| CacheError::Io { path, source })
    }

    /// Return the cached result for `original`, computing and storing it on a miss.
    ///
    /// Cache read/write failures degrade to recomputation; only `compute`
    /// errors are returned.
    pub fn lookup_or_compute(
        &self,
        original: &[u8],
        ext: &str,
        compute: impl FnOnce(&[u8]) -> Result<Vec<u8>, TransformError>,
    ) -> Result<Cached, TransformError> {
        let key = CacheKey::new(original, ext);

        match self.get(&key) {
            Ok(Some(bytes)) => return Ok(Cached { bytes, hit: true }),
            Ok(None) => {}
            Err(e) => log!("cache"; "read failed, recomputing: {:#}", anyhow::Error::new(e)),
        }

        let bytes = compute(original)?;
        if let Err(e) = self.put(&key, &bytes) {
            log!("cache"; "write failed: {:#}", anyhow::Error::new(e));
        }
        Ok(Cached { bytes, hit: false })
    }

    /// Record `bytes` as already optimal (`key(bytes) → bytes`).
    ///
    /// Called after a commit so the rewritten file is a hit next run.
    pub fn remember_optimal(&self, bytes: &[u8], ext: &str) {
        let key = CacheKey::new(bytes, ext);
        if let Err(e) = self.put(&key, bytes) {
            debug!("cache"; "fixpoint write failed: {:#}", anyhow::Error::new(e));
        }
    }
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = fs::File::create(&temp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp, path));

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn shrink(input: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(input[..input.len() / 2].to_vec())
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let cache = ImageCache::open(dir.path());
        let calls = AtomicUsize::new(0);
        let compute = |input: &[u8]| {
            calls.fetch_add(1, Ordering::SeqCst);
            shrink(input)
        };

        let first = cache.lookup_or_compute(b"abcdefgh", "png", compute).unwrap();
        assert!(!first.hit);
        assert_eq!(first.bytes, b"abcd");

        let second = cache.lookup_or_compute(b"abcdefgh", "png", compute).unwrap();
        assert!(second.hit);
        assert_eq!(second.bytes, b"abcd");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_identical_content_shares_one_entry() {
        let dir = TempDir::new().unwrap();
        let cache = ImageCache::open(dir.path());

        let a = cache.lookup_or_compute(b"same-bytes", "png", shrink).unwrap();
        let b = cache.lookup_or_compute(b"same-bytes", "png", shrink).unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert!(b.hit);

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let key = CacheKey::new(b"same-bytes", "png");
        assert!(dir.path().join(key.file_name()).exists());
    }

    #[test]
    fn test_changed_byte_forces_recompute() {
        let dir = TempDir::new().unwrap();
        let cache = ImageCache::open(dir.path());

        cache.lookup_or_compute(b"image-v1", "png", shrink).unwrap();
        let changed = cache.lookup_or_compute(b"image-v2", "png", shrink).unwrap();
        assert!(!changed.hit);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_compute_error_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = ImageCache::open(dir.path());

        let err = cache
            .lookup_or_compute(b"broken", "png", |_| {
                Err(TransformError::malformed("png", "bad"))
            })
            .unwrap_err();
        assert!(matches!(err, TransformError::Malformed { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_disabled_cache_always_computes() {
        let cache = ImageCache::disabled();
        let first = cache.lookup_or_compute(b"abcd", "png", shrink).unwrap();
        let second = cache.lookup_or_compute(b"abcd", "png", shrink).unwrap();
        assert!(!first.hit && !second.hit);
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn test_unusable_dir_disables_cache() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a dir").unwrap();

        let cache = ImageCache::open(&blocker.join("images"));
        assert!(cache.entry_path(&CacheKey::new(b"abcd", "png")).is_none());
        assert!(cache.lookup_or_compute(b"abcd", "png", shrink).is_ok());
    }

    #[test]
    fn test_cleared_cache_recomputes() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("images");
        let cache = ImageCache::open(&cache_dir);
        cache.lookup_or_compute(b"abcdefgh", "png", shrink).unwrap();

        fs::remove_dir_all(&cache_dir).unwrap();
        // Directory gone mid-run: the write fails, the result is still returned.
        let again = cache.lookup_or_compute(b"abcdefgh", "png", shrink).unwrap();
        assert!(!again.hit);
        assert_eq!(again.bytes, b"abcd");
    }

    #[test]
    fn test_remember_optimal_makes_fixpoint() {
        let dir = TempDir::new().unwrap();
        let cache = ImageCache::open(dir.path());
        cache.remember_optimal(b"optimal", "png");

        let lookup = cache
            .lookup_or_compute(b"optimal", "png", |_| panic!("should be cached"))
            .unwrap();
        assert!(lookup.hit);
        assert_eq!(lookup.bytes, b"optimal");
    }

    #[test]
    fn test_put_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let cache = ImageCache::open(dir.path());
        let key = CacheKey::new(b"x", "gif");
        cache.put(&key, b"y").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![key.file_name()]);
    }
}
