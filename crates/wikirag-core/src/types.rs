//! Domain types shared by the chunker, index store and chat pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A contiguous slice of source text sized for embedding.
///
/// - `text`: trimmed, never empty
/// - `order`: position across all passages of one split, starting at 0
/// - `source`: index of the [`SourceRecord`] the passage was cut from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub order: usize,
    pub source: usize,
}

/// One pre-extracted text record, e.g. a single Wikipedia page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub title: Option<String>,
    pub text: String,
}

impl SourceRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self { title: None, text: text.into() }
    }

    pub fn titled(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self { title: Some(title.into()), text: text.into() }
    }
}

/// What a text source hands back: either one raw string or a list of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceText {
    Raw(String),
    Records(Vec<SourceRecord>),
}

impl SourceText {
    /// Normalize to records, dropping those that are blank after trimming.
    pub fn into_records(self) -> Vec<SourceRecord> {
        let records = match self {
            SourceText::Raw(text) => vec![SourceRecord::new(text)],
            SourceText::Records(records) => records,
        };
        records.into_iter().filter(|r| !r.text.trim().is_empty()).collect()
    }

    pub fn is_blank(&self) -> bool {
        match self {
            SourceText::Raw(text) => text.trim().is_empty(),
            SourceText::Records(records) => records.iter().all(|r| r.text.trim().is_empty()),
        }
    }
}

impl From<String> for SourceText {
    fn from(text: String) -> Self { SourceText::Raw(text) }
}

impl From<&str> for SourceText {
    fn from(text: &str) -> Self { SourceText::Raw(text.to_string()) }
}

/// Cache key derived from a free-text topic.
///
/// Keeps alphanumerics, spaces and underscores; spaces become underscores and
/// leading/trailing whitespace and underscores are trimmed. Distinct topics
/// that sanitize identically share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicKey(String);

impl TopicKey {
    pub fn sanitize(topic: &str) -> String {
        topic
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
            .map(|c| if c == ' ' { '_' } else { c })
            .collect::<String>()
            .trim_matches(|c: char| c == '_' || c.is_whitespace())
            .to_string()
    }

    pub fn new(topic: &str) -> Result<Self> {
        let key = Self::sanitize(topic);
        if key.is_empty() {
            return Err(Error::EmptyInput(topic.to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for TopicKey {
    fn as_ref(&self) -> &str { &self.0 }
}

/// Distance used by an index; fixed when the index is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    L2,
    Cosine,
}

impl Metric {
    /// Similarity score where higher is always better.
    ///
    /// L2 yields the negated squared distance, cosine the cosine similarity.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>(),
            Metric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::L2 => "l2",
            Metric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Metric::L2),
            "cosine" => Ok(Metric::Cosine),
            other => Err(Error::InvalidConfig(format!("unknown metric '{other}'"))),
        }
    }
}

/// A ranked retrieval result. `score` follows [`Metric::score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub passage: Passage,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "Human",
            Role::Bot => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub message: String,
}

/// Ordered chat turns owned by the caller.
///
/// Nothing here resets itself: [`ConversationState::clear`] hands the previous
/// turns back so the caller can archive them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, role: Role, message: impl Into<String>) {
        self.turns.push(Turn { role, message: message.into() });
    }

    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.push(Role::User, question);
        self.push(Role::Bot, answer);
    }

    pub fn turns(&self) -> &[Turn] { &self.turns }

    pub fn len(&self) -> usize { self.turns.len() }

    pub fn is_empty(&self) -> bool { self.turns.is_empty() }

    pub fn clear(&mut self) -> ConversationState {
        std::mem::take(self)
    }

    /// `Human: ...` / `Assistant: ...` lines, one per turn.
    pub fn render(&self) -> String {
        render_turns(&self.turns)
    }
}

pub fn render_turns(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.label(), t.message))
        .collect::<Vec<_>>()
        .join("\n")
}
