use futures::future::BoxFuture;
use serde_json::Value;

/// Search tool backend. Always yields a JSON payload: either
/// `{"results": [...], "total_results": n}` or `{"error": "...", "results": []}`.
/// Failures are part of the payload, never an Err, so one bad search can be
/// fed back to the model as an ordinary tool turn.
pub trait SearchPort: Send + Sync {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Value>;
}
