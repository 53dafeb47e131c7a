use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::core::message::{ChatPayload, ChatTurn};

use super::commands::{still_working_message, truncate_reply, SESSION_RESET_MESSAGE};
use super::run::run_request_loop;
use super::Agent;

pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
    Ready,
    Expired,
}

/// Durable marker of in-flight background work for one session: the only
/// channel between the invocation that ran out of SLA and the later one that
/// delivers the result. At most one per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRecord {
    pub status: PendingStatus,
    pub started_at: f64,
    pub history: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ChatPayload>,
    #[serde(default)]
    pub conversation_updated: bool,
}

impl PendingRecord {
    pub fn pending(history: Vec<ChatTurn>) -> Self {
        Self {
            status: PendingStatus::Pending,
            started_at: epoch_seconds(),
            history,
            response: None,
            conversation_updated: false,
        }
    }

    pub fn ready(started_at: f64, history: Vec<ChatTurn>, response: ChatPayload) -> Self {
        Self {
            status: PendingStatus::Ready,
            started_at,
            history,
            response: Some(response),
            conversation_updated: true,
        }
    }

    pub fn expired(started_at: f64, history: Vec<ChatTurn>) -> Self {
        Self {
            status: PendingStatus::Expired,
            started_at,
            history,
            response: None,
            conversation_updated: false,
        }
    }
}

/// Work handed off past the client-visible response: enough state for a
/// detached task to finish the answer and park it in the pending record.
#[derive(Debug, Clone)]
pub struct PendingJob {
    pub session_id: String,
    pub started_at: f64,
    pub history: Vec<ChatTurn>,
}

impl Agent {
    /// Decides what an invocation that found a pending record should answer.
    ///
    /// A record past the absolute deadline is expired no matter what status
    /// it carries; expiry consumes the record and the conversation. A ready
    /// record is consumed and its answer delivered, appending the assistant
    /// turn at most once (`conversation_updated` guard). A live pending
    /// record is left untouched and re-served as "still working".
    pub(super) fn resolve_pending(&self, session_id: &str, record: PendingRecord) -> String {
        let now = epoch_seconds();
        let deadline = record.started_at + self.budget.max_wait.as_secs_f64();

        if record.status == PendingStatus::Expired || now >= deadline {
            log::info!("pending record expired, resetting session");
            self.store.clear_pending(session_id);
            self.store.clear_conversation(session_id);
            return SESSION_RESET_MESSAGE.to_string();
        }

        match record.status {
            PendingStatus::Ready => {
                let Some(response) = record.response else {
                    // Ready without a payload carries nothing deliverable.
                    self.store.clear_pending(session_id);
                    self.store.clear_conversation(session_id);
                    return SESSION_RESET_MESSAGE.to_string();
                };

                if !record.conversation_updated {
                    let mut history = self.store.load_conversation(session_id);
                    history.push(response.message.clone());
                    self.store.save_conversation(session_id, &history);
                }

                self.store.clear_pending(session_id);
                truncate_reply(&response.text)
            }
            PendingStatus::Pending => {
                let elapsed = (now - record.started_at).max(0.0) as u64;
                still_working_message(elapsed)
            }
            // Unreachable: expired was handled above.
            PendingStatus::Expired => SESSION_RESET_MESSAGE.to_string(),
        }
    }

    /// Continues the work a too-slow invocation left behind, after the filler
    /// reply has already been flushed to the client. Runs with a detached
    /// lifetime; its only output is the rewritten pending record.
    pub async fn continue_background(&self, job: PendingJob) {
        let absolute_deadline = job.started_at + self.budget.max_wait.as_secs_f64();
        let remaining = absolute_deadline - epoch_seconds();
        if remaining <= 0.0 {
            self.store
                .save_pending(&job.session_id, &PendingRecord::expired(job.started_at, job.history));
            return;
        }

        let mut history = job.history;
        let deadline = Instant::now() + Duration::from_secs_f64(remaining);
        let model = self.models.current();
        let store = &self.store;
        let session_id = job.session_id.as_str();
        let save = move |turns: &[ChatTurn]| store.save_conversation(session_id, turns);

        let result = run_request_loop(
            self.llm.as_ref(),
            self.search.as_ref(),
            &model,
            &mut history,
            deadline,
            &self.budget,
            &save,
        )
        .await;

        match result {
            Some(response) => {
                self.store.save_conversation(&job.session_id, &history);
                self.store.save_pending(
                    &job.session_id,
                    &PendingRecord::ready(job.started_at, history, response),
                );
                log::info!("background answer ready for session");
            }
            None => {
                log::warn!("background work abandoned at absolute deadline");
                self.store.save_pending(
                    &job.session_id,
                    &PendingRecord::expired(job.started_at, history),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::testutil::{chat_body, MemStore, MockLlm, MockSearch};
    use crate::core::agent::TurnBudget;
    use crate::core::ports::llm::LlmError;
    use crate::core::ports::store::StorePort;
    use serde_json::json;
    use std::sync::Arc;

    const SESSION: &str = "session-1";

    fn agent_with(llm: MockLlm) -> (Agent, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        let agent = Agent::new(
            Arc::new(llm),
            Arc::new(MockSearch::new(json!({ "results": [] }))),
            store.clone(),
            Arc::new(crate::adapters::models::ModelCatalog::fixed(&["test-model:free"])),
            TurnBudget::default(),
        );
        (agent, store)
    }

    fn seeded_job(store: &MemStore, started_at: f64) -> PendingJob {
        let history = vec![ChatTurn::user("долгий вопрос")];
        store.save_conversation(SESSION, &history);
        store.save_pending(SESSION, &PendingRecord {
            status: PendingStatus::Pending,
            started_at,
            history: history.clone(),
            response: None,
            conversation_updated: false,
        });
        PendingJob {
            session_id: SESSION.to_string(),
            started_at,
            history,
        }
    }

    #[tokio::test]
    async fn background_completion_parks_a_ready_record() {
        let (agent, store) = agent_with(MockLlm::new(vec![Ok(chat_body("готовый ответ"))]));
        let job = seeded_job(&store, epoch_seconds());

        agent.continue_background(job).await;

        let record = store.load_pending(SESSION).expect("record written");
        assert_eq!(record.status, PendingStatus::Ready);
        assert!(record.conversation_updated);
        assert_eq!(record.response.unwrap().text, "готовый ответ");
        // The conversation was persisted with the new assistant turn.
        let history = store.load_conversation(SESSION);
        assert_eq!(history.last().unwrap().role, "assistant");
    }

    #[tokio::test]
    async fn background_timeout_parks_an_expired_record() {
        let (agent, store) = agent_with(MockLlm::new(vec![Err(LlmError::Timeout(
            Duration::from_secs(25),
        ))]));
        let job = seeded_job(&store, epoch_seconds());

        agent.continue_background(job).await;

        let record = store.load_pending(SESSION).expect("record written");
        assert_eq!(record.status, PendingStatus::Expired);
    }

    #[tokio::test]
    async fn background_past_absolute_deadline_expires_without_model_call() {
        let (agent, store) = agent_with(MockLlm::new(vec![Ok(chat_body("слишком поздно"))]));
        let job = seeded_job(&store, epoch_seconds() - 120.0);

        agent.continue_background(job).await;

        let record = store.load_pending(SESSION).expect("record written");
        assert_eq!(record.status, PendingStatus::Expired);
    }

    #[tokio::test]
    async fn ready_record_is_drained_exactly_once() {
        let (agent, store) = agent_with(MockLlm::new(vec![]));
        let payload = ChatPayload::from_text("отложенный ответ");
        store.save_conversation(SESSION, &[ChatTurn::user("вопрос")]);
        store.save_pending(
            SESSION,
            &PendingRecord::ready(epoch_seconds(), Vec::new(), payload.clone()),
        );

        let record = store.load_pending(SESSION).unwrap();
        let text = agent.resolve_pending(SESSION, record);
        assert_eq!(text, "отложенный ответ");
        assert!(store.load_pending(SESSION).is_none());

        // `conversation_updated` was set by the background writer, so the
        // drain does not append a duplicate assistant turn.
        let history = store.load_conversation(SESSION);
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn unsynced_ready_record_appends_the_answer_once() {
        let (agent, store) = agent_with(MockLlm::new(vec![]));
        store.save_conversation(SESSION, &[ChatTurn::user("вопрос")]);
        let mut record =
            PendingRecord::ready(epoch_seconds(), Vec::new(), ChatPayload::from_text("ответ"));
        record.conversation_updated = false;
        store.save_pending(SESSION, &record);

        let loaded = store.load_pending(SESSION).unwrap();
        agent.resolve_pending(SESSION, loaded);

        let history = store.load_conversation(SESSION);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, "assistant");
    }

    #[tokio::test]
    async fn stale_record_is_expired_regardless_of_status() {
        let (agent, store) = agent_with(MockLlm::new(vec![]));
        store.save_conversation(SESSION, &[ChatTurn::user("вопрос")]);
        let record = PendingRecord::ready(
            epoch_seconds() - 3600.0,
            Vec::new(),
            ChatPayload::from_text("протухший ответ"),
        );
        store.save_pending(SESSION, &record);

        let loaded = store.load_pending(SESSION).unwrap();
        let text = agent.resolve_pending(SESSION, loaded);

        assert_eq!(text, SESSION_RESET_MESSAGE);
        assert!(store.load_pending(SESSION).is_none());
        assert!(store.load_conversation(SESSION).is_empty());
    }

    #[tokio::test]
    async fn live_pending_record_is_reserved_untouched() {
        let (agent, store) = agent_with(MockLlm::new(vec![]));
        let started_at = epoch_seconds() - 7.0;
        let record = PendingRecord {
            status: PendingStatus::Pending,
            started_at,
            history: Vec::new(),
            response: None,
            conversation_updated: false,
        };
        store.save_pending(SESSION, &record);

        let loaded = store.load_pending(SESSION).unwrap();
        let text = agent.resolve_pending(SESSION, loaded);

        assert!(text.contains("7 секунд"), "got: {text}");
        assert!(store.load_pending(SESSION).is_some());
    }

    #[test]
    fn record_survives_serde_round_trip() {
        let record = PendingRecord::ready(
            1_700_000_000.5,
            vec![ChatTurn::user("вопрос")],
            ChatPayload::from_text("ответ"),
        );
        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded["status"], "ready");
        let decoded: PendingRecord = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.status, PendingStatus::Ready);
        assert!(decoded.conversation_updated);
    }
}
