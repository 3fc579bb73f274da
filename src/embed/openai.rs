use anyhow::{Result, bail};
use serde::Deserialize;
use std::sync::Arc;

use super::{Embedder, Embedding};
use crate::openai::OpenAiClient;

pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(client: Arc<OpenAiClient>, model: &str, dimensions: usize) -> Self {
        Self {
            client,
            model: model.to_string(),
            dimensions,
        }
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "input": text,
            "dimensions": self.dimensions,
        })
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            bail!("refusing to embed empty text");
        }
        log::info!("requesting {}-dim embedding from {} ({} bytes)", self.dimensions, self.model, text.len());

        let resp: EmbeddingResponse = self.client.post_json("embeddings", &self.request_body(text))?;
        extract_embedding(resp, self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn extract_embedding(resp: EmbeddingResponse, dimensions: usize) -> Result<Embedding> {
    let Some(first) = resp.data.into_iter().next() else {
        bail!("openai response contained no embeddings");
    };
    if first.embedding.len() != dimensions {
        bail!(
            "openai returned a {}-dim embedding, expected {dimensions}",
            first.embedding.len()
        );
    }
    Ok(first.embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenAiConfig;

    fn embedder() -> OpenAiEmbedder {
        let client = Arc::new(OpenAiClient::new(&OpenAiConfig::default(), "sk-test"));
        OpenAiEmbedder::new(client, "text-embedding-3-small", 3)
    }

    #[test]
    fn request_shape() {
        let body = embedder().request_body("hello");
        assert_eq!(body["model"], "text-embedding-3-small");
        assert_eq!(body["input"], "hello");
        assert_eq!(body["dimensions"], 3);
    }

    #[test]
    fn takes_first_embedding() {
        let resp: EmbeddingResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2,0.3]}],"model":"m","usage":{"prompt_tokens":1,"total_tokens":1}}"#,
        )
        .unwrap();
        assert_eq!(extract_embedding(resp, 3).unwrap(), vec![0.1f32, 0.2, 0.3]);
    }

    #[test]
    fn empty_data_is_malformed() {
        let resp: EmbeddingResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(extract_embedding(resp, 3).is_err());
    }

    #[test]
    fn wrong_dimension_is_malformed() {
        let resp: EmbeddingResponse = serde_json::from_str(r#"{"data":[{"embedding":[1.0,2.0]}]}"#).unwrap();
        let err = extract_embedding(resp, 3).unwrap_err();
        assert!(err.to_string().contains("expected 3"));
    }

    #[test]
    fn blank_text_fails_without_network() {
        assert!(embedder().embed("   ").is_err());
    }
}
