//! Narrative reports generated by an external text-completion service.

mod client;
mod prompt;
mod service;

pub use client::{ChatCompletionClient, CompletionClient};
pub use prompt::{ReportPrompt, SYSTEM_PROMPT, build_context, build_prompt};
pub use service::ReportService;
