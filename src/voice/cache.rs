//! File-backed cache of rendered waveforms
//!
//! Entries are content-addressed by a digest over the normalized text, the
//! style, the rendering variant and every effect parameter. Writers stage
//! into a hidden temp file in the cache directory and rename into place, so
//! a half-written file is never visible under its final name.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use sha2::{Digest, Sha256};
use tempfile::TempPath;

use super::effects::{EffectParams, Style, Variant};
use crate::{Error, Result};

/// Hex characters of the digest kept in file names
const DIGEST_LEN: usize = 16;

/// Extension of every cache entry
const ENTRY_EXTENSION: &str = "wav";

/// Deterministic cache file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    file_name: String,
}

impl CacheKey {
    /// Key for a rendered phrase
    ///
    /// Normal renderings are named `<style>_<digest>.wav`; signature and
    /// sarcastic renderings carry a `_signature` / `_sarcasm` suffix.
    #[must_use]
    pub fn new(text: &str, style: Style, variant: Variant, params: &EffectParams) -> Self {
        let digest = short_digest(&[
            text,
            style.name(),
            variant.name(),
            params.fingerprint().as_str(),
        ]);

        let file_name = match variant {
            Variant::Normal => format!("{style}_{digest}.{ENTRY_EXTENSION}"),
            Variant::Signature => format!("{style}_signature_{digest}.{ENTRY_EXTENSION}"),
            Variant::Sarcastic => format!("{style}_sarcasm_{digest}.{ENTRY_EXTENSION}"),
        };

        Self { file_name }
    }

    /// Key for the concatenation of `segments`, in order
    #[must_use]
    pub fn combined(segments: &[PathBuf]) -> Self {
        let parts: Vec<String> = segments
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let parts: Vec<&str> = parts.iter().map(String::as_str).collect();

        Self {
            file_name: format!("combined_{}.{ENTRY_EXTENSION}", short_digest(&parts)),
        }
    }

    /// File name inside the cache directory
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// First [`DIGEST_LEN`] hex chars of a SHA-256 over length-prefixed parts
fn short_digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(DIGEST_LEN);
    digest
}

/// Limits applied when pruning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrunePolicy {
    /// Entries older than this are removed
    pub max_age: Duration,
    /// Aggregate size budget for the remaining entries
    pub max_total_bytes: u64,
    /// Minimum wall-clock time between throttled prunes
    pub interval: Duration,
}

impl Default for PrunePolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(30 * 24 * 60 * 60),
            max_total_bytes: 256 * 1024 * 1024,
            interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Outcome of one prune
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Entries removed for exceeding the maximum age
    pub expired: usize,
    /// Entries removed to get under the size budget
    pub evicted: usize,
    /// Bytes still held after pruning
    pub remaining_bytes: u64,
}

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    modified: SystemTime,
    len: u64,
}

/// Waveform cache rooted at one directory
#[derive(Debug)]
pub struct AudioCache {
    dir: PathBuf,
    policy: PrunePolicy,
    last_prune: Mutex<Option<Instant>>,
}

impl AudioCache {
    /// Open (creating if needed) a cache directory
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>, policy: PrunePolicy) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::Cache(format!("failed to create {}: {e}", dir.display()))
        })?;

        Ok(Self {
            dir,
            policy,
            last_prune: Mutex::new(None),
        })
    }

    /// Cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pruning limits
    #[must_use]
    pub const fn policy(&self) -> PrunePolicy {
        self.policy
    }

    /// Final location of an entry, whether or not it exists yet
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Existing entry for `key`, if any
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }

    /// Reserve a hidden scratch file in the cache directory
    ///
    /// The file is deleted when the returned handle drops unless it is
    /// passed to [`AudioCache::store`].
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created
    pub fn stage(&self, label: &str) -> Result<TempPath> {
        Ok(tempfile::Builder::new()
            .prefix(&format!(".{label}-"))
            .suffix(&format!(".{ENTRY_EXTENSION}"))
            .tempfile_in(&self.dir)?
            .into_temp_path())
    }

    /// Publish a staged file under `key`, replacing any existing entry
    ///
    /// # Errors
    ///
    /// Returns error if the rename fails
    pub fn store(&self, key: &CacheKey, staged: TempPath) -> Result<PathBuf> {
        let path = self.path_for(key);
        staged
            .persist(&path)
            .map_err(|e| Error::Cache(format!("failed to store {}: {}", path.display(), e.error)))?;
        tracing::debug!(path = %path.display(), "cached waveform");
        Ok(path)
    }

    /// Prune if the throttle interval has elapsed since the last prune
    pub fn maybe_prune(&self) -> Option<PruneReport> {
        {
            let mut last = self
                .last_prune
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.is_some_and(|at| at.elapsed() < self.policy.interval) {
                return None;
            }
            *last = Some(Instant::now());
        }

        Some(self.prune())
    }

    /// Prune now with the configured limits
    pub fn prune(&self) -> PruneReport {
        self.prune_with(self.policy.max_age, self.policy.max_total_bytes)
    }

    /// Prune now with explicit limits
    ///
    /// Removes every entry at least `max_age` old, then removes the oldest
    /// remaining entries until the total is within `max_total_bytes`.
    /// Failures are logged and skipped.
    pub fn prune_with(&self, max_age: Duration, max_total_bytes: u64) -> PruneReport {
        let now = SystemTime::now();
        let mut report = PruneReport::default();
        let mut survivors = Vec::new();

        for entry in self.entries() {
            let age = now.duration_since(entry.modified).unwrap_or(Duration::ZERO);
            if age >= max_age {
                if remove_entry(&entry.path) {
                    report.expired += 1;
                }
            } else {
                survivors.push(entry);
            }
        }

        survivors.sort_by_key(|e| e.modified);
        let mut total: u64 = survivors.iter().map(|e| e.len).sum();

        for entry in &survivors {
            if total <= max_total_bytes {
                break;
            }
            if remove_entry(&entry.path) {
                total = total.saturating_sub(entry.len);
                report.evicted += 1;
            }
        }

        report.remaining_bytes = total;

        if report.expired > 0 || report.evicted > 0 {
            tracing::info!(
                expired = report.expired,
                evicted = report.evicted,
                remaining_bytes = report.remaining_bytes,
                "pruned voice cache"
            );
        }

        report
    }

    /// Remove every entry, returning how many were deleted
    pub fn clear(&self) -> usize {
        let removed = self
            .entries()
            .iter()
            .filter(|e| remove_entry(&e.path))
            .count();
        tracing::info!(removed, "voice cache cleared");
        removed
    }

    /// Published entries; hidden scratch files are skipped
    fn entries(&self) -> Vec<Entry> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) => {
                tracing::warn!(path = %self.dir.display(), error = %e, "failed to read cache dir");
                return Vec::new();
            }
        };

        read_dir
            .filter_map(std::result::Result::ok)
            .filter(|de| is_entry_name(&de.file_name().to_string_lossy()))
            .filter_map(|de| {
                let path = de.path();
                match de.metadata() {
                    Ok(meta) if meta.is_file() => Some(Entry {
                        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                        len: meta.len(),
                        path,
                    }),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::debug!(path = %path.display(), error = %e, "skipping cache entry");
                        None
                    }
                }
            })
            .collect()
    }
}

fn is_entry_name(name: &str) -> bool {
    !name.starts_with('.')
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ENTRY_EXTENSION))
}

/// Delete one entry; a file already gone counts as not removed
fn remove_entry(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove cache entry");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn write_entry(dir: &Path, name: &str, bytes: usize, age: Duration) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![0_u8; bytes]).unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
        path
    }

    #[test]
    fn test_key_layout() {
        let params = EffectParams::default();
        let normal = CacheKey::new("hello", Style::Droid, Variant::Normal, &params);
        let signature = CacheKey::new("hello", Style::Droid, Variant::Signature, &params);
        let sarcasm = CacheKey::new("hello", Style::Radio, Variant::Sarcastic, &params);

        assert!(normal.file_name().starts_with("droid_"));
        assert_eq!(normal.file_name().len(), "droid_".len() + DIGEST_LEN + ".wav".len());
        assert!(signature.file_name().starts_with("droid_signature_"));
        assert!(sarcasm.file_name().starts_with("radio_sarcasm_"));
    }

    #[test]
    fn test_key_is_deterministic() {
        let params = EffectParams::default();
        assert_eq!(
            CacheKey::new("hello", Style::Droid, Variant::Normal, &params),
            CacheKey::new("hello", Style::Droid, Variant::Normal, &params)
        );
        assert_ne!(
            CacheKey::new("hello", Style::Droid, Variant::Normal, &params),
            CacheKey::new("hello", Style::Radio, Variant::Normal, &params)
        );
    }

    #[test]
    fn test_key_changes_with_any_param() {
        let base = EffectParams::default();
        let key = CacheKey::new("hello", Style::Droid, Variant::Normal, &base);
        let tweaked = EffectParams {
            echo_gain: 0.45,
            ..base
        };
        assert_ne!(key, CacheKey::new("hello", Style::Droid, Variant::Normal, &tweaked));
    }

    #[test]
    fn test_combined_key_depends_on_order() {
        let a = PathBuf::from("/cache/a.wav");
        let b = PathBuf::from("/cache/b.wav");
        let ab = CacheKey::combined(&[a.clone(), b.clone()]);
        assert!(ab.file_name().starts_with("combined_"));
        assert_eq!(ab, CacheKey::combined(&[a.clone(), b.clone()]));
        assert_ne!(ab, CacheKey::combined(&[b, a]));
    }

    #[test]
    fn test_stage_store_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path(), PrunePolicy::default()).unwrap();
        let key = CacheKey::new("hi", Style::Clean, Variant::Normal, &EffectParams::default());

        assert!(cache.lookup(&key).is_none());

        let staged = cache.stage("test").unwrap();
        fs::write(&staged, b"RIFF").unwrap();
        let stored = cache.store(&key, staged).unwrap();

        assert_eq!(cache.lookup(&key), Some(stored.clone()));
        assert_eq!(fs::read(stored).unwrap(), b"RIFF");
    }

    #[test]
    fn test_dropped_stage_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path(), PrunePolicy::default()).unwrap();
        let staged = cache.stage("raw").unwrap();
        let staged_path = staged.to_path_buf();
        assert!(staged_path.exists());
        drop(staged);
        assert!(!staged_path.exists());
    }

    #[test]
    fn test_prune_zero_age_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path(), PrunePolicy::default()).unwrap();
        write_entry(dir.path(), "droid_a.wav", 10, Duration::from_secs(5));
        write_entry(dir.path(), "droid_b.wav", 10, Duration::ZERO);

        let report = cache.prune_with(Duration::ZERO, u64::MAX);
        assert_eq!(report.expired, 2);
        assert_eq!(report.remaining_bytes, 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_prune_size_budget_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path(), PrunePolicy::default()).unwrap();
        let oldest = write_entry(dir.path(), "droid_1.wav", 100, Duration::from_secs(300));
        let older = write_entry(dir.path(), "droid_2.wav", 100, Duration::from_secs(200));
        let newer = write_entry(dir.path(), "droid_3.wav", 100, Duration::from_secs(100));
        let newest = write_entry(dir.path(), "droid_4.wav", 100, Duration::from_secs(10));

        let report = cache.prune_with(Duration::from_secs(3600), 250);

        assert_eq!(report.expired, 0);
        assert_eq!(report.evicted, 2);
        assert_eq!(report.remaining_bytes, 200);
        assert!(!oldest.exists());
        assert!(!older.exists());
        assert!(newer.exists());
        assert!(newest.exists());
    }

    #[test]
    fn test_prune_age_then_size() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path(), PrunePolicy::default()).unwrap();
        let stale = write_entry(dir.path(), "radio_old.wav", 10, Duration::from_secs(7200));
        let kept = write_entry(dir.path(), "radio_new.wav", 10, Duration::from_secs(60));

        let report = cache.prune_with(Duration::from_secs(3600), 1000);
        assert_eq!(report.expired, 1);
        assert_eq!(report.evicted, 0);
        assert!(!stale.exists());
        assert!(kept.exists());
    }

    #[test]
    fn test_prune_ignores_scratch_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path(), PrunePolicy::default()).unwrap();
        let scratch = cache.stage("raw").unwrap();
        let notes = write_entry(dir.path(), "notes.txt", 10, Duration::from_secs(10));

        let report = cache.prune_with(Duration::ZERO, 0);
        assert_eq!(report.expired, 0);
        assert!(scratch.exists());
        assert!(notes.exists());
    }

    #[test]
    fn test_maybe_prune_is_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let policy = PrunePolicy {
            max_age: Duration::from_secs(3600),
            max_total_bytes: u64::MAX,
            interval: Duration::from_secs(3600),
        };
        let cache = AudioCache::open(dir.path(), policy).unwrap();

        assert!(cache.maybe_prune().is_some());
        assert!(cache.maybe_prune().is_none());
    }

    #[test]
    fn test_clear_removes_entries_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AudioCache::open(dir.path(), PrunePolicy::default()).unwrap();
        write_entry(dir.path(), "droid_a.wav", 10, Duration::ZERO);
        write_entry(dir.path(), "combined_b.wav", 10, Duration::ZERO);
        let notes = write_entry(dir.path(), "notes.txt", 10, Duration::ZERO);

        assert_eq!(cache.clear(), 2);
        assert!(notes.exists());
    }
}
