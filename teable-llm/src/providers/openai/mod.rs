//! OpenAI provider implementation
//!
//! Works against api.openai.com or any endpoint that speaks the chat
//! completions protocol.

pub mod client;
pub mod generation;
pub mod types;

pub use client::OpenAIClient;
pub use generation::OpenAITextGenerator;
