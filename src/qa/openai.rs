use anyhow::{Result, bail};
use serde::Deserialize;
use std::sync::Arc;

use super::{ChatMessage, LanguageModel};
use crate::openai::OpenAiClient;

pub struct OpenAiChat {
    client: Arc<OpenAiClient>,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(client: Arc<OpenAiClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

impl LanguageModel for OpenAiChat {
    fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
        });
        log::info!("requesting chat completion from {} ({} messages)", self.model, messages.len());

        let resp: CompletionResponse = self.client.post_json("chat/completions", &body)?;
        first_content(resp)
    }
}

fn first_content(resp: CompletionResponse) -> Result<String> {
    let Some(choice) = resp.choices.into_iter().next() else {
        bail!("openai response contained no choices");
    };
    match choice.message.content {
        Some(content) => Ok(content),
        None => bail!("openai reply had no content"),
    }
}
