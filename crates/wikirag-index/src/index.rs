use wikirag_core::error::{Error, Result};
use wikirag_core::types::{Metric, Passage};

/// Immutable (passage, vector) collection with the metric and dimension fixed at build time.
#[derive(Debug, Clone)]
pub struct Index {
    passages: Vec<Passage>,
    vectors: Vec<Vec<f32>>,
    dim: usize,
    metric: Metric,
    embedder_id: String,
}

impl Index {
    /// Pair passages with their vectors, checking count and a constant dimension.
    pub fn new(passages: Vec<Passage>, vectors: Vec<Vec<f32>>, metric: Metric, embedder_id: impl Into<String>) -> Result<Self> {
        if passages.is_empty() {
            return Err(Error::IndexBuild("no passages to index".into()));
        }
        if passages.len() != vectors.len() {
            return Err(Error::IndexBuild(format!("{} passages but {} embeddings", passages.len(), vectors.len())));
        }
        let dim = vectors[0].len();
        if dim == 0 {
            return Err(Error::IndexBuild("embedder returned empty vectors".into()));
        }
        if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
            return Err(Error::IndexBuild(format!("embedding {i} has dimension {}, expected {dim}", v.len())));
        }
        Ok(Self { passages, vectors, dim, metric, embedder_id: embedder_id.into() })
    }

    pub fn passages(&self) -> &[Passage] { &self.passages }
    pub fn vectors(&self) -> &[Vec<f32>] { &self.vectors }
    pub fn dim(&self) -> usize { self.dim }
    pub fn metric(&self) -> Metric { self.metric }
    pub fn embedder_id(&self) -> &str { &self.embedder_id }
    pub fn len(&self) -> usize { self.passages.len() }
    pub fn is_empty(&self) -> bool { self.passages.is_empty() }
}
