use async_trait::async_trait;

use crate::types::{render_turns, SourceText, Turn};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Stable identifier for model + dimension, stored next to persisted indexes.
    fn embedder_id(&self) -> String { format!("unknown:d{}", self.dim()) }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Where raw reference text comes from. An empty result means "not found".
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn fetch(&self, topic: &str) -> anyhow::Result<SourceText>;
}

/// Text completion capability.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;

    async fn generate_with_history(&self, prompt: &str, history: &[Turn]) -> anyhow::Result<String> {
        if history.is_empty() {
            return self.generate(prompt).await;
        }
        let full = format!("{}\n\n{}", render_turns(history), prompt);
        self.generate(&full).await
    }
}
