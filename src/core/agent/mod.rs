//! The deadline-bounded request orchestrator.
//!
//! One [`Agent`] serves every session. Each webhook invocation becomes one
//! [`Agent::handle_turn`] call that must answer within the voice platform's
//! SLA; work that cannot finish in time is parked as a pending record and
//! continued by a detached task, to be drained by a later invocation.

pub mod budget;
pub mod commands;
pub mod pending;
pub(crate) mod run;
pub mod tools;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;
use std::time::Instant;

use crate::adapters::models::ModelCatalog;
use crate::core::message::ChatTurn;
use crate::core::ports::llm::LlmPort;
use crate::core::ports::search::SearchPort;
use crate::core::ports::store::StorePort;

pub use budget::TurnBudget;
pub use commands::{HELP_MESSAGE, SESSION_RESET_MESSAGE, WAITING_MESSAGE};
pub use pending::{PendingJob, PendingRecord, PendingStatus};

use commands::{clean_input, greeting, is_help_command, truncate_reply, wants_model_switch};
use pending::epoch_seconds;
use run::run_request_loop;

pub struct Agent {
    llm: Arc<dyn LlmPort>,
    search: Arc<dyn SearchPort>,
    store: Arc<dyn StorePort>,
    models: Arc<ModelCatalog>,
    budget: TurnBudget,
}

/// What one invocation answers, plus the work it could not finish in time.
/// The caller must flush `text` to the client first and only then drive
/// `background` to completion.
pub struct TurnReply {
    pub text: String,
    pub background: Option<PendingJob>,
}

impl TurnReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            background: None,
        }
    }
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LlmPort>,
        search: Arc<dyn SearchPort>,
        store: Arc<dyn StorePort>,
        models: Arc<ModelCatalog>,
        budget: TurnBudget,
    ) -> Self {
        Self {
            llm,
            search,
            store,
            models,
            budget,
        }
    }

    /// Serves one utterance for one session.
    ///
    /// A session with a pending record is resolved from that record alone;
    /// the new utterance is deliberately dropped so the background work keeps
    /// a single coherent history. Otherwise the utterance is cleaned, routed
    /// through the command layer, and finally handed to the model loop with
    /// the SLA as its deadline.
    pub async fn handle_turn(&self, session_id: &str, raw_utterance: &str) -> TurnReply {
        if let Some(record) = self.store.load_pending(session_id) {
            return TurnReply::text(self.resolve_pending(session_id, record));
        }

        let input = clean_input(raw_utterance);
        if input.is_empty() {
            return TurnReply::text(greeting(&self.models.current_display_name()));
        }

        let started_at = epoch_seconds();
        let mut history = self.store.load_conversation(session_id);
        history.push(ChatTurn::user(&input));
        self.store.save_conversation(session_id, &history);

        if is_help_command(&input) {
            history.push(ChatTurn::assistant(HELP_MESSAGE));
            self.store.save_conversation(session_id, &history);
            return TurnReply::text(HELP_MESSAGE);
        }

        if wants_model_switch(&input) {
            let display = self.models.switch_next();
            let reply = format!("переключаю на: {display}");
            history.push(ChatTurn::assistant(&reply));
            self.store.save_conversation(session_id, &history);
            return TurnReply::text(reply);
        }

        let deadline = Instant::now() + self.budget.sla;
        let model = self.models.current();
        let store = &self.store;
        let save = move |turns: &[ChatTurn]| {
            store.save_conversation(session_id, turns)
        };

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

        self.store.save_conversation(session_id, &history);
        match result {
            // A tool-call-bearing result is a round the budget cut off, not
            // an answer; the background phase finishes it.
            Some(response) if response.message.tool_calls.is_none() => {
                if epoch_seconds() - started_at >= self.budget.sla.as_secs_f64() {
                    // The client has already timed out on us. Park the answer
                    // for the follow-up invocation instead of wasting it.
                    self.store.save_pending(
                        session_id,
                        &PendingRecord::ready(started_at, history, response),
                    );
                    return TurnReply::text(WAITING_MESSAGE);
                }
                TurnReply::text(truncate_reply(&response.text))
            }
            _ => self.park_for_background(session_id, started_at, history),
        }
    }

    fn park_for_background(
        &self,
        session_id: &str,
        started_at: f64,
        history: Vec<ChatTurn>,
    ) -> TurnReply {
        let record = PendingRecord {
            status: PendingStatus::Pending,
            started_at,
            history: history.clone(),
            response: None,
            conversation_updated: false,
        };
        self.store.save_pending(session_id, &record);
        TurnReply {
            text: WAITING_MESSAGE.to_string(),
            background: Some(PendingJob {
                session_id: session_id.to_string(),
                started_at,
                history,
            }),
        }
    }
}
