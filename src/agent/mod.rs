//! Explanation session client

mod chat;

pub use chat::{assemble_parts, ChatClient, SessionState};
