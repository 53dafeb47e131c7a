use std::time::Instant;

use crate::core::errors::format_llm_error;
use crate::core::message::{
    build_outbound_messages, extract_response_payload, render_parts, ChatPayload, ChatTurn,
    SYSTEM_PROMPT,
};
use crate::core::ports::llm::{ChatCall, LlmError, LlmPort};
use crate::core::ports::search::SearchPort;

use super::budget::{budget_stop_reason, TurnBudget};
use super::tools::{run_tool_calls, search_tool_definitions};

pub(crate) type SaveHistory<'a> = &'a (dyn Fn(&[ChatTurn]) + Send + Sync);

/// Runs the ask-model / maybe-run-tools cycle until the model produces plain
/// text, the iteration cap is hit, or the deadline is spent.
///
/// Every model message is appended to `history` unconditionally, error-derived
/// fallbacks included, so the conversation stays coherent for future turns.
/// Returns `None` only when no usable answer exists yet: the caller decides
/// whether that means a filler reply and background continuation.
pub(crate) async fn run_request_loop(
    llm: &dyn LlmPort,
    search: &dyn SearchPort,
    model: &str,
    history: &mut Vec<ChatTurn>,
    deadline: Instant,
    budget: &TurnBudget,
    save: SaveHistory<'_>,
) -> Option<ChatPayload> {
    let tools = search_tool_definitions();
    // Turns below this index belong to earlier invocations and are never a
    // valid answer to the current one.
    let baseline = history.len();
    let mut final_response = None;

    let mut iteration = 0u32;
    loop {
        if let Some(reason) = budget_stop_reason(budget, deadline, iteration) {
            log::info!("request loop stopped at iteration {iteration}: {reason}");
            break;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let timeout = budget.call_timeout(remaining);
        let messages = build_outbound_messages(history, SYSTEM_PROMPT);

        let body = match llm
            .complete(ChatCall {
                model,
                messages: &messages,
                tools: Some(&tools),
                timeout,
            })
            .await
        {
            Ok(body) => body,
            Err(LlmError::Timeout(spent)) => {
                log::warn!("chat completion timed out after {spent:?}");
                break;
            }
            Err(err) => {
                log::error!("chat completion failed: {err}");
                let payload = ChatPayload::from_text(format_llm_error(&err));
                history.push(payload.message.clone());
                save(history);
                return Some(payload);
            }
        };

        let payload = extract_response_payload(&body);
        history.push(payload.message.clone());

        let tool_calls = payload
            .message
            .tool_calls
            .clone()
            .filter(|calls| !calls.is_empty());
        let Some(tool_calls) = tool_calls else {
            final_response = Some(payload);
            break;
        };

        run_tool_calls(&tool_calls, history, search).await;
        save(history);
        iteration += 1;
    }

    // Best-effort fallback: re-render the newest assistant turn produced by
    // this invocation, including a tool-call-bearing one cut off by the
    // deadline. Assistant turns from earlier invocations answer earlier
    // questions; returning one of those would be worse than no answer.
    if final_response.is_none() {
        if let Some(last) = history[baseline..]
            .iter()
            .rev()
            .find(|turn| turn.role == "assistant")
        {
            final_response = Some(ChatPayload {
                text: render_parts(&last.content),
                message: last.clone(),
            });
        }
    }

    final_response
}
