//! Mock ports shared by the agent tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::core::agent::pending::PendingRecord;
use crate::core::message::ChatTurn;
use crate::core::ports::llm::{ChatCall, LlmError, LlmPort};
use crate::core::ports::search::SearchPort;
use crate::core::ports::store::StorePort;

use super::run::SaveHistory;

pub(crate) fn no_save() -> SaveHistory<'static> {
    &|_: &[ChatTurn]| {}
}

/// Chat-completion body with a plain text answer.
pub(crate) fn chat_body(text: &str) -> Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": text }
        }]
    })
}

/// Chat-completion body requesting one `search_internet` call.
pub(crate) fn tool_call_body(call_id: &str, query: &str) -> Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": call_id,
                    "type": "function",
                    "function": {
                        "name": "search_internet",
                        "arguments": json!({ "query": query }).to_string()
                    }
                }]
            }
        }]
    })
}

/// Scripted transport: pops one canned result per call. Running past the
/// script yields a timeout, which conveniently models "the model got slow".
pub(crate) struct MockLlm {
    responses: Mutex<VecDeque<Result<Value, LlmError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockLlm {
    pub fn new(responses: Vec<Result<Value, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Same script, but every call takes `delay` of wall-clock time first.
    pub fn with_delay(responses: Vec<Result<Value, LlmError>>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(responses)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmPort for MockLlm {
    fn complete<'a>(&'a self, call: ChatCall<'a>) -> BoxFuture<'a, Result<Value, LlmError>> {
        let timeout = call.timeout;
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .expect("mock llm lock")
                .pop_front()
                .unwrap_or(Err(LlmError::Timeout(timeout)))
        })
    }
}

pub(crate) struct MockSearch {
    payload: Value,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("mock search lock").clone()
    }
}

impl SearchPort for MockSearch {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Value> {
        Box::pin(async move {
            self.queries
                .lock()
                .expect("mock search lock")
                .push(query.to_string());
            self.payload.clone()
        })
    }
}

/// In-memory store with the same last-writer-wins semantics as the file one.
#[derive(Default)]
pub(crate) struct MemStore {
    conversations: Mutex<HashMap<String, Vec<ChatTurn>>>,
    pending: Mutex<HashMap<String, PendingRecord>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorePort for MemStore {
    fn load_conversation(&self, session_id: &str) -> Vec<ChatTurn> {
        self.conversations
            .lock()
            .expect("mem store lock")
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    fn save_conversation(&self, session_id: &str, history: &[ChatTurn]) {
        self.conversations
            .lock()
            .expect("mem store lock")
            .insert(session_id.to_string(), history.to_vec());
    }

    fn clear_conversation(&self, session_id: &str) {
        self.conversations
            .lock()
            .expect("mem store lock")
            .remove(session_id);
    }

    fn load_pending(&self, session_id: &str) -> Option<PendingRecord> {
        self.pending
            .lock()
            .expect("mem store lock")
            .get(session_id)
            .cloned()
    }

    fn save_pending(&self, session_id: &str, record: &PendingRecord) {
        self.pending
            .lock()
            .expect("mem store lock")
            .insert(session_id.to_string(), record.clone());
    }

    fn clear_pending(&self, session_id: &str) {
        self.pending
            .lock()
            .expect("mem store lock")
            .remove(session_id);
    }
}
