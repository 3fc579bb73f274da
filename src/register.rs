use anyhow::{Context, Result};

use crate::embed::cache::EmbeddingCache;
use crate::store::{Record, RecordDraft, RecordStore};

/// Validate a draft, embed its description through the cache (so the first
/// search that includes it is already a hit) and store it.
pub fn register(store: &dyn RecordStore, cache: &EmbeddingCache, draft: &RecordDraft) -> Result<Record> {
    let valid = draft.validate()?;
    let description_vector = cache
        .get_or_compute(&valid.description, true)
        .context("embedding description")?;

    let payload = valid.into_new_record(description_vector);
    store
        .register(&payload)
        .with_context(|| format!("registering {}", payload.system_name))
}
