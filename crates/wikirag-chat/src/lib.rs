#![deny(unused_imports)]

pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod session;

pub use orchestrator::{answer, try_answer};
pub use pipeline::RagPipeline;
pub use session::{ActiveTopic, ChatSession};
