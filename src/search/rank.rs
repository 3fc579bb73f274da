use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::embed::cache::EmbeddingCache;
use crate::embed::{Embedding, similarity_percent};
use crate::error::EmbedError;
use crate::store::{Record, ScoredRecord};

/// Scores records against a query by cosine similarity of their description
/// embeddings.
pub struct Ranker<'a> {
    cache: &'a EmbeddingCache,
    workers: usize,
    use_cache: bool,
}

type Lookup = Result<Embedding, EmbedError>;

impl<'a> Ranker<'a> {
    pub fn new(cache: &'a EmbeddingCache) -> Self {
        Self {
            cache,
            workers: 1,
            use_cache: true,
        }
    }

    /// Max concurrent description lookups.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Rank `corpus` against `query`, most similar first. Records keep their
    /// corpus order on equal scores. Records whose description can't be
    /// embedded are skipped; a query that can't be embedded fails the call.
    pub fn rank(&self, query: &str, corpus: &[Record]) -> Result<Vec<ScoredRecord>> {
        if query.trim().is_empty() {
            return Err(EmbedError::EmptyText).context("embedding query");
        }
        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .cache
            .get_or_compute(query, self.use_cache)
            .context("embedding query")?;

        let descriptions: Vec<&str> = corpus.iter().map(|r| r.description.as_str()).collect();
        let lookups = self.embed_all(&descriptions)?;

        let mut scored = Vec::with_capacity(corpus.len());
        for (record, lookup) in corpus.iter().zip(lookups) {
            match lookup {
                Ok(embedding) => scored.push(ScoredRecord {
                    record: record.clone(),
                    similarity: similarity_percent(&query_embedding, &embedding),
                }),
                Err(e) => log::warn!(
                    "skipping record {} ({}): {:#}",
                    record.id,
                    record.system_name,
                    anyhow::Error::from(e)
                ),
            }
        }

        sort_by_similarity(&mut scored);
        Ok(scored)
    }

    /// Look up every text on a pool of `workers` threads. Results come back
    /// in input order.
    fn embed_all(&self, texts: &[&str]) -> Result<Vec<Lookup>> {
        let workers = self.workers.min(texts.len()).max(1);
        if workers == 1 {
            return Ok(texts
                .iter()
                .map(|t| self.cache.get_or_compute(t, self.use_cache))
                .collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("starting embedding workers")?;
        Ok(pool.install(|| {
            texts
                .par_iter()
                .map(|t| self.cache.get_or_compute(t, self.use_cache))
                .collect()
        }))
    }
}

/// Descending by similarity; stable, so ties keep their input order.
pub fn sort_by_similarity(scored: &mut [ScoredRecord]) {
    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
}
