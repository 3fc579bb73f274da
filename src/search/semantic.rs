use anyhow::{Context, Result};

use super::rank::Ranker;
use crate::embed::cache::EmbeddingCache;
use crate::store::{RecordStore, ScoredRecord};

pub struct SemanticQuery {
    pub text: String,
    /// Keep only the best `top_k` after ranking the whole corpus.
    pub top_k: Option<usize>,
    pub use_cache: bool,
}

impl SemanticQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: None,
            use_cache: true,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// Semantic search: rank every stored record against the query text, most
/// similar first.
pub fn find_similar(
    store: &dyn RecordStore,
    cache: &EmbeddingCache,
    workers: usize,
    query: &SemanticQuery,
) -> Result<Vec<ScoredRecord>> {
    let corpus = store.all_records().context("fetching records")?;
    if corpus.is_empty() {
        return Ok(Vec::new());
    }

    let mut ranked = Ranker::new(cache)
        .workers(workers)
        .use_cache(query.use_cache)
        .rank(&query.text, &corpus)?;

    if let Some(k) = query.top_k {
        ranked.truncate(k);
    }
    Ok(ranked)
}
