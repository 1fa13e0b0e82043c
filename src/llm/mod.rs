//! LLM proxy for bug-report modification notes
//!
//! Provides:
//! - An OpenAI-compatible chat-completions client (MiMo, OpenAI)
//! - Prompt construction from a changed-file list and issue description

mod providers;
mod writer;

pub use providers::{ChatMessage, LlmClient, LlmConfig, LlmProvider, Role};
pub use writer::{build_user_prompt, ChangedFile, ModificationWriter};
