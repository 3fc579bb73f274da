pub mod openai;
pub mod session;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

const VALIDATE_TEMPERATURE: f32 = 0.0;
const ANSWER_TEMPERATURE: f32 = 0.7;
const DEFAULT_REJECTION: &str = "The question is not about system architecture.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn stamped(role: Role, content: impl Into<String>) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            ..Self::new(role, content)
        }
    }
}

/// A chat-completion backend.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { reason: String },
}

/// Answers questions about one record, grounded in that record's fields.
pub struct QuestionService<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> QuestionService<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    /// Ask the model whether `question` is about the architecture of `record`.
    pub fn validate_question(&self, question: &str, record: &Record) -> Result<Verdict> {
        let context = serde_json::to_string(record).context("serializing record context")?;
        let messages = [
            ChatMessage::new(
                Role::System,
                "You review questions about system architectures. Decide whether the question \
                 concerns architecture, design, technology choices, scalability, security, \
                 deployment or operations.",
            ),
            ChatMessage::new(
                Role::User,
                format!(
                    "Decide whether this question about the system below is an architecture question.\n\n\
                     System:\n{context}\n\nQuestion:\n{question}\n\n\
                     Reply in exactly this format:\nvalid: true/false\nreason: <why>"
                ),
            ),
        ];

        let reply = self
            .model
            .complete(&messages, VALIDATE_TEMPERATURE)
            .context("validating question")?;
        Ok(parse_verdict(&reply))
    }

    pub fn answer(&self, question: &str, record: &Record) -> Result<String> {
        let messages = [
            ChatMessage::new(Role::System, grounding_prompt(record)),
            ChatMessage::new(Role::User, question),
        ];
        self.model
            .complete(&messages, ANSWER_TEMPERATURE)
            .context("answering question")
    }
}

fn grounding_prompt(record: &Record) -> String {
    format!(
        "You are a system architecture expert. Answer questions about the system below from \
         the perspectives of architecture, design, technology choices, scalability, security, \
         deployment and operations.\n\n\
         System:\n\
         - Name: {}\n\
         - Description: {}\n\
         - Cloud provider: {}\n\
         - Services: {}",
        record.system_name,
        record.description,
        record.cloud_provider,
        record.cloud_services.join(", ")
    )
}

fn parse_verdict(reply: &str) -> Verdict {
    // ASCII folding keeps byte offsets aligned with `reply`.
    let folded = reply.to_ascii_lowercase();
    if folded.contains("valid: true") {
        return Verdict::Accepted;
    }
    let reason = folded
        .find("reason:")
        .map(|i| reply[i + "reason:".len()..].trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_REJECTION.to_string());
    Verdict::Rejected { reason }
}
