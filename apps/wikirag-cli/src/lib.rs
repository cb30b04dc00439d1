//! Shared wiring for the `wikirag` binaries.
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use wikirag_chat::RagPipeline;
use wikirag_core::config::{Config, Settings};
use wikirag_core::data_loader::FileSource;
use wikirag_core::traits::{Embedder, TextSource};
use wikirag_embed::get_default_embedder;
use wikirag_remote::{OllamaGenerator, WikipediaSource};

/// Flags understood by every binary.
#[derive(Debug, Default, Clone)]
pub struct CommonArgs {
    pub from_file: Option<PathBuf>,
    pub fake_embeddings: bool,
}

impl CommonArgs {
    /// Consume `args[i]` (and its value) if it is a shared flag. Returns the
    /// number of arguments used, 0 when `args[i]` is not a shared flag.
    pub fn take(&mut self, args: &[String], i: usize) -> anyhow::Result<usize> {
        match args[i].as_str() {
            "--fake-embeddings" => {
                self.fake_embeddings = true;
                Ok(1)
            }
            "--from-file" => {
                let path = args.get(i + 1).ok_or_else(|| anyhow::anyhow!("--from-file requires a path"))?;
                self.from_file = Some(PathBuf::from(path));
                Ok(2)
            }
            _ => Ok(0),
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

pub fn load_settings(common: &CommonArgs) -> anyhow::Result<Settings> {
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let mut settings = config.settings()?;
    if common.fake_embeddings {
        settings.embedding.fake = true;
    }
    Ok(settings)
}

pub fn build_source(settings: &Settings, common: &CommonArgs) -> anyhow::Result<Arc<dyn TextSource>> {
    let source: Arc<dyn TextSource> = match &common.from_file {
        Some(path) => Arc::new(FileSource::new(path)),
        None => Arc::new(WikipediaSource::new(settings.wikipedia.clone())?),
    };
    Ok(source)
}

pub fn build_pipeline(settings: Settings, common: &CommonArgs) -> anyhow::Result<RagPipeline> {
    let source = build_source(&settings, common)?;
    let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(&settings.embedding)?);
    let generator = Arc::new(OllamaGenerator::new(&settings.llm)?);
    Ok(RagPipeline::new(source, embedder, generator, settings))
}

/// One line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Exit,
    Clear,
    History,
    Topic(&'a str),
    Ask(&'a str),
}

/// Classify a trimmed, non-empty prompt line. `:topic` must stand alone or be followed by a space.
pub fn parse_repl_line(line: &str) -> ReplCommand<'_> {
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return ReplCommand::Exit;
    }
    match line {
        ":clear" => ReplCommand::Clear,
        ":history" => ReplCommand::History,
        ":topic" => ReplCommand::Topic(""),
        _ => match line.strip_prefix(":topic ") {
            Some(topic) => ReplCommand::Topic(topic.trim()),
            None => ReplCommand::Ask(line),
        },
    }
}
