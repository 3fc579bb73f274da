use anyhow::{Result, bail};

use super::{ChatMessage, QuestionService, Role, Verdict};
use crate::store::Record;

/// Conversation state for one user: the record being discussed and the
/// accepted questions with their answers.
#[derive(Debug, Default)]
pub struct ChatSession {
    selected: Option<Record>,
    history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asked {
    Answered(String),
    Rejected { reason: String },
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to another record. History belongs to the previous one and is dropped.
    pub fn select(&mut self, record: Record) {
        self.selected = Some(record);
        self.history.clear();
    }

    pub fn selected(&self) -> Option<&Record> {
        self.selected.as_ref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn ask(&mut self, service: &QuestionService<'_>, question: &str) -> Result<Asked> {
        let Some(record) = self.selected.as_ref() else {
            bail!("no system selected");
        };
        let question = question.trim();
        if question.is_empty() {
            return Ok(Asked::Rejected {
                reason: "Please enter a question.".into(),
            });
        }

        if let Verdict::Rejected { reason } = service.validate_question(question, record)? {
            return Ok(Asked::Rejected { reason });
        }

        let answer = service.answer(question, record)?;
        self.history.push(ChatMessage::stamped(Role::User, question));
        self.history.push(ChatMessage::stamped(Role::Assistant, answer.clone()));
        Ok(Asked::Answered(answer))
    }
}
