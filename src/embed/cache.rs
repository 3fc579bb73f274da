//! Content-addressed embedding cache.
//!
//! Each distinct text is embedded once: the vector is stored under the BLAKE3
//! hash of the text as `<dir>/<hash>.f32` (little-endian f32 values), and every
//! later lookup for the same bytes is served from disk. Concurrent misses for
//! one hash share a single provider call.

use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::hasher::hash_text;
use super::{Embedder, Embedding};
use crate::error::{CacheError, EmbedError};

const ENTRY_EXT: &str = "f32";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct EmbeddingCache {
    embedder: Arc<dyn Embedder>,
    dir: PathBuf,
    enabled: bool,
    in_flight: Mutex<HashMap<String, Arc<Flight>>>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Outcome slot for one in-progress provider call. Errors are carried as
/// rendered text since every waiter needs its own copy.
#[derive(Default)]
struct Flight {
    outcome: Mutex<Option<Result<Embedding, String>>>,
    done: Condvar,
}

impl Flight {
    fn finish(&self, outcome: Result<Embedding, String>) {
        let mut slot = lock(&self.outcome);
        if slot.is_none() {
            *slot = Some(outcome);
        }
        self.done.notify_all();
    }

    fn wait(&self) -> Result<Embedding, String> {
        let mut slot = lock(&self.outcome);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self.done.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Held by the caller that performs the provider call. Dropping it releases
/// the hash, and fails any waiters if no outcome was published.
struct Leader<'a> {
    cache: &'a EmbeddingCache,
    hash: &'a str,
    flight: Arc<Flight>,
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        self.flight
            .finish(Err("embedding computation was abandoned".into()));
        lock(&self.cache.in_flight).remove(self.hash);
    }
}

impl EmbeddingCache {
    /// Open (and create, when enabled) the cache directory.
    pub fn open(dir: &Path, enabled: bool, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if enabled {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating embedding cache dir {}", dir.display()))?;
        }
        Ok(Self {
            embedder,
            dir: dir.to_path_buf(),
            enabled,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn entry_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{hash}.{ENTRY_EXT}"))
    }

    /// Embedding for `text`, read from the cache when possible.
    ///
    /// With `use_cache` false (or the cache disabled) the provider is always
    /// called and nothing is read or written.
    pub fn get_or_compute(&self, text: &str, use_cache: bool) -> Result<Embedding, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyText);
        }
        if !(use_cache && self.enabled) {
            return self.embedder.embed(text).map_err(EmbedError::Provider);
        }

        let hash = hash_text(text);
        if let Some(hit) = self.lookup(&hash) {
            return Ok(hit);
        }
        self.compute_shared(text, &hash)
    }

    fn compute_shared(&self, text: &str, hash: &str) -> Result<Embedding, EmbedError> {
        let flight = Arc::new(Flight::default());
        let existing = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(hash) {
                Some(running) => Some(Arc::clone(running)),
                None => {
                    in_flight.insert(hash.to_string(), Arc::clone(&flight));
                    None
                }
            }
        };

        if let Some(running) = existing {
            log::debug!("joining in-flight embedding for {hash}");
            return running
                .wait()
                .map_err(|msg| EmbedError::Provider(anyhow!(msg)));
        }

        let leader = Leader {
            cache: self,
            hash,
            flight,
        };
        let outcome = self.compute_and_store(text, hash);
        leader.flight.finish(match &outcome {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(render(e)),
        });
        drop(leader);
        outcome
    }

    fn compute_and_store(&self, text: &str, hash: &str) -> Result<Embedding, EmbedError> {
        // A previous leader may have finished between our lookup and taking the slot.
        if let Some(hit) = self.lookup(hash) {
            return Ok(hit);
        }

        let embedding = self.embedder.embed(text).map_err(EmbedError::Provider)?;
        log::debug!("cache miss for {hash}, embedded with {}", self.embedder.model_name());

        if let Err(e) = self.write_entry(hash, &embedding) {
            warn_fault(e);
        }
        Ok(embedding)
    }

    /// Read a cached vector. Unreadable or corrupt entries count as misses;
    /// corrupt files are removed so the next write replaces them.
    fn lookup(&self, hash: &str) -> Option<Embedding> {
        let path = self.entry_path(hash);
        match self.read_entry(&path) {
            Ok(Some(v)) => {
                log::debug!("cache hit for {hash}");
                Some(v)
            }
            Ok(None) => None,
            Err(e) => {
                if matches!(e, CacheError::Corrupt { .. }) {
                    let _ = std::fs::remove_file(&path);
                }
                warn_fault(e);
                None
            }
        }
    }

    fn read_entry(&self, path: &Path) -> Result<Option<Embedding>, CacheError> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        decode_entry(&bytes, self.embedder.dimensions())
            .map(Some)
            .map_err(|reason| CacheError::Corrupt {
                path: path.to_path_buf(),
                reason,
            })
    }

    /// Write via a unique temp file and rename, so readers never observe a
    /// partial entry and concurrent writers of the same hash last-write-win.
    fn write_entry(&self, hash: &str, embedding: &[f32]) -> Result<(), CacheError> {
        let path = self.entry_path(hash);
        let tmp = self.dir.join(format!(
            ".{hash}.{}.{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        std::fs::write(&tmp, encode_entry(embedding)).map_err(|source| CacheError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            CacheError::Write { path, source }
        })
    }
}

/// Count entries and bytes under `dir`. A missing directory is an empty cache.
pub fn stats(dir: &Path) -> Result<CacheStats> {
    let mut stats = CacheStats::default();
    for path in entry_files(dir)? {
        stats.entries += 1;
        stats.total_bytes += std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    }
    Ok(stats)
}

/// Remove every entry under `dir`. Returns how many were removed.
pub fn clear(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for path in entry_files(dir)? {
        std::fs::remove_file(&path)
            .with_context(|| format!("removing cache entry {}", path.display()))?;
        removed += 1;
    }
    Ok(removed)
}

fn entry_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(anyhow!(e)).with_context(|| format!("listing cache dir {}", dir.display()));
        }
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == ENTRY_EXT) {
            files.push(path);
        }
    }
    Ok(files)
}

fn encode_entry(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn decode_entry(bytes: &[u8], expected_dims: usize) -> Result<Embedding, String> {
    if bytes.is_empty() {
        return Err("entry is empty".into());
    }
    if bytes.len() % 4 != 0 {
        return Err(format!("length {} is not a multiple of 4", bytes.len()));
    }
    let embedding: Embedding = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if expected_dims != 0 && embedding.len() != expected_dims {
        return Err(format!(
            "holds {} values, expected {expected_dims}",
            embedding.len()
        ));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err("contains non-finite values".into());
    }
    Ok(embedding)
}

fn render(err: &EmbedError) -> String {
    match err {
        EmbedError::Provider(source) => format!("{source:#}"),
        other => other.to_string(),
    }
}

fn warn_fault(err: CacheError) {
    log::warn!("{:#}", anyhow::Error::from(err));
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
