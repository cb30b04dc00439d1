use std::sync::Arc;
use tracing::{debug, info};

use wikirag_core::chunker::{split_source, ChunkingConfig};
use wikirag_core::config::Settings;
use wikirag_core::error::{Error, Result};
use wikirag_core::traits::{Embedder, Generator, TextSource};
use wikirag_core::types::{Passage, SearchHit};
use wikirag_index::{IndexStore, Resolved, Retriever};

use crate::orchestrator::try_answer;
use crate::prompt::condense_prompt;
use crate::session::{ActiveTopic, ChatSession};

/// Wires a text source, embedder, index store and generator into chat turns.
pub struct RagPipeline {
    source: Arc<dyn TextSource>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    store: IndexStore,
    retriever: Retriever,
    settings: Settings,
}

impl RagPipeline {
    pub fn new(source: Arc<dyn TextSource>, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, settings: Settings) -> Self {
        let store = IndexStore::from_settings(&settings);
        let retriever = Retriever::new(embedder.clone(), settings.retrieval.top_k);
        Self { source, embedder, generator, store, retriever, settings }
    }

    pub fn with_store(mut self, store: IndexStore) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &IndexStore { &self.store }
    pub fn settings(&self) -> &Settings { &self.settings }

    /// Fetch, split and embed `topic`, or reuse its cached index.
    pub async fn resolve(&self, topic: &str) -> Result<Resolved> {
        let source = self.source.as_ref();
        let chunking = self.settings.chunking;
        self.store
            .get_or_build(topic, || fetch_passages(source, topic, chunking), self.embedder.as_ref())
            .await
    }

    /// Make `topic` the session's active topic.
    pub async fn open_topic(&self, session: &mut ChatSession, topic: &str) -> Result<()> {
        let topic = topic.trim();
        let resolved = self.resolve(topic).await?;
        info!(topic, key = %resolved.key, origin = ?resolved.origin, passages = resolved.index.len(), "topic ready");
        session.set_topic(ActiveTopic { topic: topic.to_string(), key: resolved.key, index: resolved.index, origin: resolved.origin });
        Ok(())
    }

    /// Ranked passages for `query` under `topic`, without generation.
    pub async fn search(&self, topic: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let resolved = self.resolve(topic).await?;
        self.retriever.search_hits_limit(&resolved.index, query, limit)
    }

    /// Answer one user turn. Never fails: errors come back as `"Error: ..."`.
    ///
    /// A session without a topic adopts the question itself as its topic.
    pub async fn ask(&self, session: &mut ChatSession, question: &str) -> String {
        let question = question.trim();
        let condensing = self.settings.retrieval.condense_question && !session.memory().is_empty();

        let (standalone, retrieved) = match self.retrieve_for(session, question, condensing).await {
            Ok((standalone, passages)) => (standalone, Ok(passages)),
            Err(e) => (question.to_string(), Err(e)),
        };
        // A condensed question already folds the history in.
        let history = if condensing { None } else { Some(session.memory().turns()) };
        let outcome = try_answer(&standalone, retrieved, self.generator.as_ref(), history).await;

        let (reply, succeeded) = match outcome {
            Ok(text) => (text, true),
            Err(e) => (e.user_message(), false),
        };
        session.record(question, &reply, succeeded);
        reply
    }

    async fn retrieve_for(&self, session: &mut ChatSession, question: &str, condensing: bool) -> Result<(String, Vec<Passage>)> {
        if question.is_empty() {
            return Err(Error::EmptyInput(question.to_string()));
        }
        if session.topic().is_none() {
            self.open_topic(session, question).await?;
        }
        let standalone = if condensing { self.condense(session, question).await? } else { question.to_string() };
        let active = session.topic().ok_or_else(|| Error::Retrieval("no active topic".into()))?;
        let passages = self.retriever.retrieve(&active.index, &standalone)?;
        Ok((standalone, passages))
    }

    async fn condense(&self, session: &ChatSession, question: &str) -> Result<String> {
        let prompt = condense_prompt(&session.memory().render(), question);
        let rewritten = self.generator.generate(&prompt).await.map_err(|e| Error::Generation(format!("{e:#}")))?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            debug!("condensed question was blank; using the original");
            return Ok(question.to_string());
        }
        debug!(standalone = rewritten, "condensed follow-up");
        Ok(rewritten.to_string())
    }
}

async fn fetch_passages(source: &dyn TextSource, topic: &str, chunking: ChunkingConfig) -> Result<Vec<Passage>> {
    let text = source.fetch(topic).await.map_err(|e| Error::Fetch(format!("{e:#}")))?;
    if text.is_blank() {
        return Err(Error::EmptyInput(topic.to_string()));
    }
    let passages = split_source(text, &chunking)?;
    info!(topic, passages = passages.len(), "split source text");
    Ok(passages)
}
