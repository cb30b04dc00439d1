//! Turns retrieved passages and a question into an answer.
//!
//! This is where every failure of a turn ends up: [`answer`] never fails and
//! renders errors as `"Error: <description>"`.
use tracing::{debug, warn};

use wikirag_core::error::{Error, Result};
use wikirag_core::traits::Generator;
use wikirag_core::types::{Passage, Turn};

use crate::prompt::qa_prompt;

/// Prompt the generator with `retrieved` as context. Blank completions are errors.
pub async fn try_answer(
    question: &str,
    retrieved: Result<Vec<Passage>>,
    generator: &dyn Generator,
    history: Option<&[Turn]>,
) -> Result<String> {
    let passages = retrieved?;
    let prompt = qa_prompt(&passages, question);
    debug!(passages = passages.len(), prompt_chars = prompt.len(), "generating answer");
    let completion = match history {
        Some(turns) if !turns.is_empty() => generator.generate_with_history(&prompt, turns).await,
        _ => generator.generate(&prompt).await,
    }
    .map_err(|e| Error::Generation(format!("{e:#}")))?;
    if completion.trim().is_empty() {
        return Err(Error::Generation("model returned an empty answer".into()));
    }
    Ok(completion)
}

pub async fn answer(
    question: &str,
    retrieved: Result<Vec<Passage>>,
    generator: &dyn Generator,
    history: Option<&[Turn]>,
) -> String {
    match try_answer(question, retrieved, generator, history).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "turn failed");
            e.user_message()
        }
    }
}
