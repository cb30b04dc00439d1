//! Network adapters: Wikipedia as a [`TextSource`] and Ollama as a [`Generator`].
//!
//! [`TextSource`]: wikirag_core::traits::TextSource
//! [`Generator`]: wikirag_core::traits::Generator
#![deny(unused_imports)]

pub mod ollama;
pub mod wikipedia;

pub use ollama::OllamaGenerator;
pub use wikipedia::WikipediaSource;
