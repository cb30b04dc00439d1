//! Per-topic index cache.
//!
//! Layout: `<root>/<TopicKey>/` is a LanceDB directory with a `passages` and a
//! `meta` table. The presence of `passages.lance` is the only cache-hit signal.
//! Writes go to a staging directory under `<root>` and are renamed into place,
//! so concurrent builds of one topic race and the last rename wins.
use anyhow::{anyhow, Context};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use wikirag_core::config::Settings;
use wikirag_core::error::{Error, Result};
use wikirag_core::traits::Embedder;
use wikirag_core::types::{Metric, Passage, TopicKey};

use crate::index::Index;
use crate::schema::PASSAGES_TABLE;
use crate::table::{get_meta, open_db, read_meta, read_passages, write_meta, write_passages};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Loaded from an existing cache; nothing was fetched or embedded.
    Cached,
    Built,
    /// Built but could not be written; the index is only held in memory.
    Unpersisted { reason: String },
}

#[derive(Debug, Clone)]
pub struct Resolved {
    pub key: TopicKey,
    pub index: Arc<Index>,
    pub origin: IndexOrigin,
}

#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
    metric: Metric,
    batch_size: usize,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>, metric: Metric, batch_size: usize) -> Self {
        Self { root: root.into(), metric, batch_size: batch_size.max(1) }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.cache_dir(), settings.index.metric, settings.index.embed_batch_size)
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn location(&self, key: &TopicKey) -> PathBuf { self.root.join(key.as_str()) }

    pub fn is_cached(&self, key: &TopicKey) -> bool {
        self.location(key).join(format!("{PASSAGES_TABLE}.lance")).exists()
    }

    pub async fn load(&self, key: &TopicKey) -> anyhow::Result<Index> {
        Ok(self.load_with_meta(key).await?.0)
    }

    async fn load_with_meta(&self, key: &TopicKey) -> anyhow::Result<(Index, HashMap<String, String>)> {
        let conn = open_db(&self.location(key)).await?;
        let meta = read_meta(&conn).await?;
        let metric: Metric = meta.get("metric").ok_or_else(|| anyhow!("meta has no metric"))?.parse()?;
        let dim: usize = meta.get("dim").ok_or_else(|| anyhow!("meta has no dim"))?.parse()?;
        let embedder_id = meta.get("embedder_id").cloned().unwrap_or_default();

        let (passages, vectors): (Vec<Passage>, Vec<Vec<f32>>) = read_passages(&conn).await?.into_iter().unzip();
        let index = Index::new(passages, vectors, metric, embedder_id)?;
        if index.dim() != dim {
            return Err(anyhow!("stored vectors have dimension {}, meta says {dim}", index.dim()));
        }
        Ok((index, meta))
    }

    /// Raw topic the cache for `key` was built from, if recorded.
    pub async fn stored_topic(&self, key: &TopicKey) -> anyhow::Result<Option<String>> {
        let conn = open_db(&self.location(key)).await?;
        get_meta(&conn, "topic").await
    }

    /// Write `index` for `key`, replacing any previous copy.
    pub async fn persist(&self, key: &TopicKey, topic: &str, index: &Index) -> Result<()> {
        self.persist_inner(key, topic, index).await.map_err(|e| Error::Persist(format!("{e:#}")))
    }

    async fn persist_inner(&self, key: &TopicKey, topic: &str, index: &Index) -> anyhow::Result<()> {
        fs::create_dir_all(&self.root).with_context(|| format!("creating {}", self.root.display()))?;
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let staging = self.root.join(format!(".staging-{}-{}-{}", key, std::process::id(), nanos));

        let written = async {
            fs::create_dir_all(&staging)?;
            let conn = open_db(&staging).await?;
            write_passages(&conn, index.passages(), index.vectors(), index.dim()).await?;
            write_meta(
                &conn,
                &[
                    ("topic", topic.to_string()),
                    ("metric", index.metric().to_string()),
                    ("dim", index.dim().to_string()),
                    ("embedder_id", index.embedder_id().to_string()),
                    ("passages", index.len().to_string()),
                ],
            )
            .await?;
            drop(conn);

            let target = self.location(key);
            if target.exists() {
                fs::remove_dir_all(&target).with_context(|| format!("removing {}", target.display()))?;
            }
            fs::rename(&staging, &target).with_context(|| format!("renaming into {}", target.display()))?;
            anyhow::Ok(())
        }
        .await;

        if written.is_err() && staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }
        written
    }

    /// Load the cached index for `topic`, or build and persist it from `provider`.
    ///
    /// On a hit neither `provider` nor `embedder` is called. Unreadable caches and
    /// caches built with a different dimension are rebuilt. Persist failures are
    /// logged and reported through [`IndexOrigin::Unpersisted`].
    pub async fn get_or_build<F, Fut>(&self, topic: &str, provider: F, embedder: &dyn Embedder) -> Result<Resolved>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Passage>>>,
    {
        let key = TopicKey::new(topic)?;
        if self.is_cached(&key) {
            match self.load_with_meta(&key).await {
                Ok((index, meta)) if index.dim() == embedder.dim() => {
                    if let Some(stored) = meta.get("topic").filter(|s| s.as_str() != topic) {
                        warn!(key = %key, stored = %stored, requested = topic, "topic key collision; reusing cached index");
                    }
                    info!(key = %key, passages = index.len(), "index cache hit");
                    return Ok(Resolved { key, index: Arc::new(index), origin: IndexOrigin::Cached });
                }
                Ok((index, _)) => {
                    warn!(key = %key, cached = index.dim(), embedder = embedder.dim(), "cached index dimension differs; rebuilding");
                }
                Err(e) => warn!(key = %key, error = %format!("{e:#}"), "cached index unreadable; rebuilding"),
            }
        } else {
            info!(key = %key, "index cache miss");
        }

        let started = Instant::now();
        let passages = provider().await?;
        if passages.is_empty() {
            return Err(Error::IndexBuild(format!("no passages to index for '{topic}'")));
        }
        let vectors = self.embed_passages(&passages, embedder)?;
        let index = Index::new(passages, vectors, self.metric, embedder.embedder_id())?;
        info!(key = %key, passages = index.len(), dim = index.dim(), elapsed_ms = started.elapsed().as_millis() as u64, "index built");

        let origin = match self.persist(&key, topic, &index).await {
            Ok(()) => {
                debug!(location = %self.location(&key).display(), "index persisted");
                IndexOrigin::Built
            }
            Err(e) => {
                warn!(key = %key, error = %e, "index not cached; continuing in memory");
                IndexOrigin::Unpersisted { reason: e.to_string() }
            }
        };
        Ok(Resolved { key, index: Arc::new(index), origin })
    }

    fn embed_passages(&self, passages: &[Passage], embedder: &dyn Embedder) -> Result<Vec<Vec<f32>>> {
        let pb = ProgressBar::new(passages.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passages ({percent}%)")
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let mut vectors = Vec::with_capacity(passages.len());
        for batch in passages.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
            let out = match embedder.embed_batch(&texts) {
                Ok(out) => out,
                Err(e) => {
                    pb.abandon();
                    return Err(Error::IndexBuild(format!("embedding failed: {e}")));
                }
            };
            if out.len() != texts.len() {
                pb.abandon();
                return Err(Error::IndexBuild(format!("embedder returned {} vectors for {} passages", out.len(), texts.len())));
            }
            if let Some(v) = out.iter().find(|v| v.len() != embedder.dim()) {
                pb.abandon();
                return Err(Error::IndexBuild(format!("embedder returned dimension {}, expected {}", v.len(), embedder.dim())));
            }
            vectors.extend(out);
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        Ok(vectors)
    }

    /// Delete the cache for `key`. Returns whether anything was removed.
    pub fn evict(&self, key: &TopicKey) -> anyhow::Result<bool> {
        let location = self.location(key);
        if !location.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&location).with_context(|| format!("removing {}", location.display()))?;
        info!(key = %key, "index cache evicted");
        Ok(true)
    }

    /// Keys with a cache-hit artifact under the root, sorted.
    pub fn cached_topics(&self) -> anyhow::Result<Vec<TopicKey>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.file_type()?.is_dir() { continue; }
            if let Ok(key) = TopicKey::new(&name) {
                if key.as_str() == name && self.is_cached(&key) { keys.push(key); }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
