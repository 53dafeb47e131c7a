use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::core::message::{ToolDefinition, WireMessage};

/// Transport failure taxonomy. `Timeout` is the only variant that routes to
/// the filler/continuation path; everything else surfaces as a formatted
/// error turn in the conversation.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed response body: {0}")]
    Malformed(String),
    #[error("{0}")]
    Generic(String),
}

#[derive(Debug, Clone)]
pub struct ChatCall<'a> {
    pub model: &'a str,
    pub messages: &'a [WireMessage],
    pub tools: Option<&'a [ToolDefinition]>,
    /// Bounds both connection and total wait for this one call.
    pub timeout: Duration,
}

pub trait LlmPort: Send + Sync {
    /// Issues one chat-completion call and returns the raw response body.
    /// Exceeding `timeout` must surface as `LlmError::Timeout`.
    fn complete<'a>(&'a self, call: ChatCall<'a>) -> BoxFuture<'a, Result<Value, LlmError>>;
}
