use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::config::OpenAiConfig;
use crate::http::{describe_http_error, http_agent};

/// One HTTP agent plus credentials, built once at startup and shared by the
/// embedding adapter and the chat model.
pub struct OpenAiClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, api_key: &str) -> Self {
        Self {
            agent: http_agent(config.timeout_secs),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// POST a JSON body to `{base_url}/{path}` and decode the JSON reply.
    pub fn post_json<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let result = self
            .agent
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(body);

        let mut response = match result {
            Ok(r) => r,
            Err(e) => return Err(describe_http_error(e, "openai")),
        };

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("parsing openai response from {path}"))
    }
}
