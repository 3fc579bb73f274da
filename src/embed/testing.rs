//! In-process embedders for tests.

use anyhow::{Result, bail};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Embedder, Embedding};

/// Serves fixed vectors for known texts and a hash-derived vector for
/// anything else. Counts every call.
pub struct TableEmbedder {
    dims: usize,
    vectors: HashMap<String, Embedding>,
    failing: HashSet<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl TableEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vectors: HashMap::new(),
            failing: HashSet::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Embedding) -> Self {
        assert_eq!(vector.len(), self.dims);
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for TableEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.failing.contains(text) {
            bail!("provider unavailable");
        }
        if let Some(v) = self.vectors.get(text) {
            return Ok(v.clone());
        }
        let digest = blake3::hash(text.as_bytes());
        let bytes = digest.as_bytes();
        Ok((0..self.dims)
            .map(|i| f32::from(bytes[i % bytes.len()]) / 255.0 - 0.5)
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "table"
    }
}

/// Bag-of-words over a fixed vocabulary; shared words mean closer vectors.
pub struct VocabEmbedder {
    vocab: Vec<&'static str>,
}

impl VocabEmbedder {
    pub fn new(vocab: &[&'static str]) -> Self {
        Self {
            vocab: vocab.to_vec(),
        }
    }
}

impl Embedder for VocabEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut v = vec![0.0f32; self.vocab.len()];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            if let Some(i) = self.vocab.iter().position(|w| *w == word) {
                v[i] += 1.0;
            }
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.vocab.len()
    }

    fn model_name(&self) -> &str {
        "vocab"
    }
}
