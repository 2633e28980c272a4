use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::Result;

/// Extensions an image may be cached under, in lookup order.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "gif", "svg", "webp"];
const MAX_STEM_LEN: usize = 64;
/// Temp files untouched for this long belong to a run that died.
/// Well above any request timeout, so a live run never loses its temp file.
pub const STALE_PART_AGE: Duration = Duration::from_secs(60 * 60);

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Maps an animal name onto a filesystem-safe file stem.
///
/// Pure and total: lowercase, whitespace becomes `_`, only alphanumerics, `_` and `-`
/// survive, runs of `_` collapse and the result is capped at 64 characters.
/// Names with nothing usable left get `unnamed-<hash of the input>`.
pub fn sanitize(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.nfkc().flat_map(char::to_lowercase) {
        let c = if c.is_whitespace() { '_' } else { c };
        if !(c.is_alphanumeric() || c == '_' || c == '-') {
            continue;
        }
        if c == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(c);
    }

    let stem: String = stem
        .trim_matches(|c: char| c == '_' || c == '-')
        .chars()
        .take(MAX_STEM_LEN)
        .collect();
    // Truncation can expose a trailing separator again.
    let stem = stem.trim_end_matches(|c: char| c == '_' || c == '-');

    if stem.is_empty() {
        format!("unnamed-{:016x}", fnv1a(name.as_bytes()))
    } else {
        stem.to_string()
    }
}

// Stable across builds, unlike `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// The on-disk image cache. A non-empty `<sanitized name>.<ext>` file is a cache hit.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Like [`CacheStore::new`], but makes sure the directory exists and
    /// clears temp files left behind by killed runs.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(dir);
        fs::create_dir_all(&store.dir)?;
        let removed = store.remove_stale_parts(STALE_PART_AGE)?;
        if removed > 0 {
            debug!(dir = %store.dir.display(), removed, "Removed stale temp files");
        }
        Ok(store)
    }

    /// Deletes `.*.part` files not modified within `max_age`. Returns how many went.
    pub fn remove_stale_parts(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with('.') && name.ends_with(".part")) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if age.is_some_and(|age| age > max_age) && fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn resolve_path(&self, animal: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{ext}", sanitize(animal)))
    }

    /// Path of the cached image for `animal`, if there is one.
    pub async fn lookup(&self, animal: &str) -> Option<PathBuf> {
        for ext in IMAGE_EXTENSIONS {
            let path = self.resolve_path(animal, ext);
            let hit = tokio::fs::metadata(&path)
                .await
                .map(|meta| meta.is_file() && meta.len() > 0)
                .unwrap_or(false);
            if hit {
                return Some(path);
            }
        }
        None
    }

    pub async fn has_cached(&self, animal: &str) -> bool {
        self.lookup(animal).await.is_some()
    }

    /// A fresh hidden path next to the final one. Never matched by [`CacheStore::lookup`].
    pub fn temp_path(&self, animal: &str) -> PathBuf {
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            ".{}.{}-{seq}.part",
            sanitize(animal),
            std::process::id()
        ))
    }
}
