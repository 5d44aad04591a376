//! Anthropic (Claude) provider implementation

pub mod client;
pub mod generation;
pub mod types;

pub use client::AnthropicClient;
pub use generation::AnthropicTextGenerator;
