use crate::core::agent::pending::PendingRecord;
use crate::core::message::ChatTurn;

/// Durable per-session state: one conversation history and at most one
/// pending record, both keyed by session id. Last-writer-wins; the store owns
/// its own write discipline (atomic rename) and retention.
pub trait StorePort: Send + Sync {
    fn load_conversation(&self, session_id: &str) -> Vec<ChatTurn>;
    fn save_conversation(&self, session_id: &str, history: &[ChatTurn]);
    fn clear_conversation(&self, session_id: &str);

    fn load_pending(&self, session_id: &str) -> Option<PendingRecord>;
    fn save_pending(&self, session_id: &str, record: &PendingRecord);
    fn clear_pending(&self, session_id: &str);
}
