//! LifeLens: turn confusion into clarity
//!
//! This library provides:
//! - A Gemini chat session client with lazy session creation and a retry policy
//! - Attachment ingestion for images, documents and voice notes
//! - The conversation log driven by the terminal front-end

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod transport;

pub use agent::ChatClient;
pub use config::Config;
