use std::sync::Arc;

use wikirag_core::types::{ConversationState, Role, TopicKey};
use wikirag_index::{Index, IndexOrigin};

/// The topic a session is answering from.
#[derive(Debug, Clone)]
pub struct ActiveTopic {
    pub topic: String,
    pub key: TopicKey,
    pub index: Arc<Index>,
    pub origin: IndexOrigin,
}

/// Caller-owned chat state.
///
/// `messages` is the transcript shown to the user, errors included. `memory`
/// only holds successful exchanges and is what prompts see. Nothing resets on
/// its own; [`ChatSession::clear`] archives the transcript.
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: ConversationState,
    memory: ConversationState,
    archive: Vec<ConversationState>,
    topic: Option<ActiveTopic>,
}

impl ChatSession {
    pub fn new() -> Self { Self::default() }

    pub fn messages(&self) -> &ConversationState { &self.messages }
    pub fn memory(&self) -> &ConversationState { &self.memory }
    pub fn archive(&self) -> &[ConversationState] { &self.archive }
    pub fn topic(&self) -> Option<&ActiveTopic> { self.topic.as_ref() }

    pub fn set_topic(&mut self, topic: ActiveTopic) { self.topic = Some(topic); }

    pub fn record(&mut self, question: &str, reply: &str, succeeded: bool) {
        self.messages.push(Role::User, question);
        self.messages.push(Role::Bot, reply);
        if succeeded {
            self.memory.push_exchange(question, reply);
        }
    }

    /// Archive the transcript, reset memory and forget the topic.
    pub fn clear(&mut self) {
        let transcript = self.messages.clear();
        if !transcript.is_empty() {
            self.archive.push(transcript);
        }
        self.memory.clear();
        self.topic = None;
    }
}
