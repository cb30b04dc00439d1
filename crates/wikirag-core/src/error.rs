use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The source had nothing usable for the requested topic.
    #[error("No usable text found for '{0}'")]
    EmptyInput(String),

    #[error("Text splitter returned no valid chunks")]
    EmptyChunk,

    #[error("Failed to fetch source text: {0}")]
    Fetch(String),

    #[error("Index build failed: {0}")]
    IndexBuild(String),

    #[error("Failed to persist index: {0}")]
    Persist(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Embedding dimension mismatch: index has {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Generation failed: {0}")]
    Generation(String),
}

impl Error {
    /// Render the error the way the chat surface shows it.
    pub fn user_message(&self) -> String {
        format!("Error: {self}")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
