pub mod cache;
pub mod hasher;
pub mod openai;
#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;

pub type Embedding = Vec<f32>;

pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Embedding>;
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Cosine of the angle between `a` and `b`, in `[-1, 1]`.
///
/// Accumulates in f64. Zero-magnitude, empty or mismatched vectors score 0
/// instead of producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Cosine similarity expressed as a percentage, in `[-100, 100]`.
pub fn similarity_percent(a: &[f32], b: &[f32]) -> f64 {
    cosine_similarity(a, b) * 100.0
}
