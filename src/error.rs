//! Error types for the chat loop.
//!
//! Only failures that end a `chat()` call live here. Anything a tool does wrong
//! is turned into a `ToolResult` payload and handed back to the model instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Network, HTTP status or client-side failure talking to the endpoint.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The endpoint answered, but the body is missing required structure.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// A configuration value could not be parsed.
    #[error("config error: {key}: {reason}")]
    Config { key: String, reason: String },

    /// Tool group YAML could not be read or has the wrong shape.
    #[error("tool groups error: {reason}")]
    ToolGroups { reason: String },

    /// Agent profile YAML could not be read or has the wrong shape.
    #[error("agents config error: {reason}")]
    Agents { reason: String },
}

impl ChatError {
    pub fn transport(reason: impl Into<String>) -> Self {
        ChatError::Transport { reason: reason.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        ChatError::MalformedResponse { reason: reason.into() }
    }

    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ChatError::Config { key: key.into(), reason: reason.into() }
    }

    /// True for failures the assembler may skip over mid-stream.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ChatError::MalformedResponse { .. })
    }
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;
