use std::sync::Arc;

use tracing::debug;
use wikirag_core::error::{Error, Result};
use wikirag_core::traits::Embedder;
use wikirag_core::types::{Passage, SearchHit};

use crate::index::Index;

/// Exhaustive nearest-neighbour lookup under the index's metric.
///
/// Hits are ordered by descending score; equal scores keep passage order.
pub fn search(index: &Index, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
    if k == 0 {
        return Err(Error::InvalidConfig("k must be at least 1".into()));
    }
    if query.len() != index.dim() {
        return Err(Error::DimensionMismatch { expected: index.dim(), got: query.len() });
    }
    let metric = index.metric();
    let mut scored: Vec<(usize, f32)> = index.vectors().iter().enumerate().map(|(i, v)| (i, metric.score(query, v))).collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    Ok(scored
        .into_iter()
        .map(|(i, score)| SearchHit { passage: index.passages()[i].clone(), score })
        .collect())
}

/// Embeds a question and returns the `top_k` closest passages of an index.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, top_k: usize) -> Self { Self { embedder, top_k } }

    pub fn search_hits(&self, index: &Index, question: &str) -> Result<Vec<SearchHit>> {
        self.search_hits_limit(index, question, self.top_k)
    }

    pub fn search_hits_limit(&self, index: &Index, question: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query = self.embedder.embed(question).map_err(|e| Error::Retrieval(e.to_string()))?;
        let hits = search(index, &query, k)?;
        debug!(k, hits = hits.len(), "retrieved passages");
        Ok(hits)
    }

    pub fn retrieve(&self, index: &Index, question: &str) -> Result<Vec<Passage>> {
        Ok(self.search_hits(index, question)?.into_iter().map(|h| h.passage).collect())
    }
}
