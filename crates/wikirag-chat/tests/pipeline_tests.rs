use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use wikirag_chat::{answer, ChatSession, RagPipeline};
use wikirag_core::config::Settings;
use wikirag_core::error::Error;
use wikirag_core::traits::{Embedder, Generator, TextSource};
use wikirag_core::types::{Passage, SourceText};
use wikirag_embed::FakeEmbedder;
use wikirag_index::IndexOrigin;

fn photosynthesis_paragraph() -> String {
    let sentences = [
        "Photosynthesis is a process used by plants and other organisms to convert light energy into chemical energy.",
        "Most plants, algae and cyanobacteria perform photosynthesis and are called photoautotrophs.",
        "Oxygen is released as a by-product when water molecules are split inside the chloroplasts.",
        "The light reactions capture energy while the Calvin cycle fixes carbon dioxide into sugars.",
    ];
    let mut text = String::new();
    let mut i = 0;
    while text.chars().count() < 1200 {
        if !text.is_empty() { text.push(' '); }
        text.push_str(sentences[i % sentences.len()]);
        i += 1;
    }
    text.chars().take(1200).collect()
}

/// Knows one paragraph; every topic mentioning "xyzzy" comes back empty.
#[derive(Default)]
struct ParagraphSource {
    calls: AtomicUsize,
}

#[async_trait]
impl TextSource for ParagraphSource {
    async fn fetch(&self, topic: &str) -> anyhow::Result<SourceText> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if topic.contains("xyzzy") {
            return Ok(SourceText::Records(Vec::new()));
        }
        Ok(SourceText::Raw(photosynthesis_paragraph()))
    }
}

struct CountingEmbedder {
    inner: FakeEmbedder,
    texts: AtomicUsize,
}

impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embedder_id(&self) -> String { self.inner.embedder_id() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

#[derive(Default)]
struct ScriptedGenerator {
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn prompts(&self) -> Vec<String> { self.prompts.lock().unwrap().clone() }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.ends_with("Standalone question:") {
            return Ok("What does the Calvin cycle do in photosynthesis?".to_string());
        }
        Ok("Plants turn light into chemical energy.".to_string())
    }
}

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> { anyhow::bail!("connection refused") }
}

struct BlankGenerator;

#[async_trait]
impl Generator for BlankGenerator {
    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> { Ok("  \n".to_string()) }
}

fn settings_in(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.index.cache_dir = dir.path().to_string_lossy().to_string();
    settings
}

fn counting_embedder() -> Arc<CountingEmbedder> {
    Arc::new(CountingEmbedder { inner: FakeEmbedder::new(384), texts: AtomicUsize::new(0) })
}

#[tokio::test]
async fn photosynthesis_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(ParagraphSource::default());
    let embedder = counting_embedder();
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = RagPipeline::new(source.clone(), embedder.clone(), generator.clone(), settings_in(&tmp));

    let mut session = ChatSession::new();
    pipeline.open_topic(&mut session, "Photosynthesis").await.expect("open topic");
    let active = session.topic().expect("topic");
    assert_eq!(active.origin, IndexOrigin::Built);
    assert_eq!(active.index.len(), 3);
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 3);
    assert!(tmp.path().join("Photosynthesis").join("passages.lance").exists());

    let reply = pipeline.ask(&mut session, "What does photosynthesis produce?").await;
    assert!(!reply.trim().is_empty());
    assert!(!reply.starts_with("Error:"), "{reply}");
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.memory().len(), 2);

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("Question: What does photosynthesis produce?"));
    assert!(prompt.contains("Calvin cycle") || prompt.contains("photoautotrophs"));
}

#[tokio::test]
async fn second_pipeline_reuses_the_cache() {
    let tmp = TempDir::new().unwrap();
    let first = RagPipeline::new(Arc::new(ParagraphSource::default()), counting_embedder(), Arc::new(ScriptedGenerator::default()), settings_in(&tmp));
    first.open_topic(&mut ChatSession::new(), "Photosynthesis").await.expect("build");

    let source = Arc::new(ParagraphSource::default());
    let embedder = counting_embedder();
    let second = RagPipeline::new(source.clone(), embedder.clone(), Arc::new(ScriptedGenerator::default()), settings_in(&tmp));
    let mut session = ChatSession::new();
    second.open_topic(&mut session, "Photosynthesis").await.expect("hit");
    assert_eq!(session.topic().map(|t| t.origin.clone()), Some(IndexOrigin::Cached));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_topic_is_reported_not_raised() {
    let tmp = TempDir::new().unwrap();
    let pipeline = RagPipeline::new(Arc::new(ParagraphSource::default()), counting_embedder(), Arc::new(ScriptedGenerator::default()), settings_in(&tmp));
    let mut session = ChatSession::new();

    let reply = pipeline.ask(&mut session, "xyzzynonexistent").await;
    assert!(reply.starts_with("Error:"), "{reply}");
    assert!(reply.contains("xyzzynonexistent"));
    assert!(session.topic().is_none());
    assert_eq!(session.messages().len(), 2);
    assert!(session.memory().is_empty());
    assert!(!tmp.path().join("xyzzynonexistent").exists());
}

#[tokio::test]
async fn first_question_becomes_the_topic() {
    let tmp = TempDir::new().unwrap();
    let pipeline = RagPipeline::new(Arc::new(ParagraphSource::default()), counting_embedder(), Arc::new(ScriptedGenerator::default()), settings_in(&tmp));
    let mut session = ChatSession::new();
    let reply = pipeline.ask(&mut session, "Photosynthesis").await;
    assert!(!reply.starts_with("Error:"));
    assert_eq!(session.topic().map(|t| t.key.as_str()), Some("Photosynthesis"));
}

#[tokio::test]
async fn generator_failure_becomes_error_text() {
    let tmp = TempDir::new().unwrap();
    let pipeline = RagPipeline::new(Arc::new(ParagraphSource::default()), counting_embedder(), Arc::new(FailingGenerator), settings_in(&tmp));
    let mut session = ChatSession::new();
    pipeline.open_topic(&mut session, "Photosynthesis").await.expect("open");
    let reply = pipeline.ask(&mut session, "What is chlorophyll?").await;
    assert!(reply.starts_with("Error: Generation failed"), "{reply}");
    assert!(reply.contains("connection refused"));
    assert!(session.memory().is_empty());

    let blank = RagPipeline::new(Arc::new(ParagraphSource::default()), counting_embedder(), Arc::new(BlankGenerator), settings_in(&tmp));
    let reply = blank.ask(&mut ChatSession::new(), "Photosynthesis").await;
    assert!(reply.starts_with("Error: Generation failed"), "{reply}");
}

#[tokio::test]
async fn follow_ups_are_condensed_with_history() {
    let tmp = TempDir::new().unwrap();
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = RagPipeline::new(Arc::new(ParagraphSource::default()), counting_embedder(), generator.clone(), settings_in(&tmp));
    let mut session = ChatSession::new();
    pipeline.open_topic(&mut session, "Photosynthesis").await.expect("open");

    pipeline.ask(&mut session, "What is photosynthesis?").await;
    pipeline.ask(&mut session, "And the Calvin cycle?").await;

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[1].contains("Human: What is photosynthesis?"));
    assert!(prompts[1].ends_with("Follow Up Input: And the Calvin cycle?\nStandalone question:"));
    assert!(prompts[2].contains("Question: What does the Calvin cycle do in photosynthesis?"));
    assert!(!prompts[2].starts_with("Human:"));
}

#[tokio::test]
async fn history_goes_into_the_prompt_when_condensing_is_off() {
    let tmp = TempDir::new().unwrap();
    let mut settings = settings_in(&tmp);
    settings.retrieval.condense_question = false;
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = RagPipeline::new(Arc::new(ParagraphSource::default()), counting_embedder(), generator.clone(), settings);
    let mut session = ChatSession::new();
    pipeline.open_topic(&mut session, "Photosynthesis").await.expect("open");

    pipeline.ask(&mut session, "What is photosynthesis?").await;
    pipeline.ask(&mut session, "And the Calvin cycle?").await;

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].starts_with("Human: What is photosynthesis?\nAssistant: Plants turn light"));
    assert!(prompts[1].contains("Question: And the Calvin cycle?"));
}

#[tokio::test]
async fn clearing_archives_the_transcript() {
    let tmp = TempDir::new().unwrap();
    let pipeline = RagPipeline::new(Arc::new(ParagraphSource::default()), counting_embedder(), Arc::new(ScriptedGenerator::default()), settings_in(&tmp));
    let mut session = ChatSession::new();
    pipeline.ask(&mut session, "Photosynthesis").await;
    pipeline.ask(&mut session, "What gas is released?").await;
    assert_eq!(session.messages().len(), 4);

    session.clear();
    assert!(session.messages().is_empty());
    assert!(session.memory().is_empty());
    assert!(session.topic().is_none());
    assert_eq!(session.archive().len(), 1);
    assert_eq!(session.archive()[0].len(), 4);

    session.clear();
    assert_eq!(session.archive().len(), 1);
}

#[tokio::test]
async fn search_lists_ranked_passages() {
    let tmp = TempDir::new().unwrap();
    let pipeline = RagPipeline::new(Arc::new(ParagraphSource::default()), counting_embedder(), Arc::new(ScriptedGenerator::default()), settings_in(&tmp));
    let hits = pipeline.search("Photosynthesis", "Calvin cycle carbon dioxide", 10).await.expect("search");
    assert_eq!(hits.len(), 3);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn answer_renders_upstream_errors() {
    let generator = ScriptedGenerator::default();
    let reply = answer("q", Err(Error::EmptyChunk), &generator, None).await;
    assert_eq!(reply, "Error: Text splitter returned no valid chunks");
    assert!(generator.prompts().is_empty());

    let passages = vec![Passage { text: "ctx".into(), order: 0, source: 0 }];
    let reply = answer("q", Ok(passages), &generator, None).await;
    assert_eq!(reply, "Plants turn light into chemical energy.");
}
