//! Answer generation: prompt assembly around retrieved context

pub mod prompt;

pub use prompt::PromptBuilder;
