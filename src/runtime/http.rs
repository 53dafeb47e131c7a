//! Webhook endpoint speaking the voice platform's request/response envelope.
//!
//! One route: `POST /`. Unfinished work is handed to a detached task that
//! outlives the request scope; it reports back only through the pending
//! record, never through this response, so the client's reply is independent
//! of how long the continuation runs.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::core::agent::Agent;

pub fn router(agent: Arc<Agent>) -> Router {
    Router::new().route("/", post(handle_webhook)).with_state(agent)
}

pub async fn serve(agent: Arc<Agent>, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("listening on {bind}");
    axum::serve(listener, router(agent)).await
}

async fn handle_webhook(State(agent): State<Arc<Agent>>, Json(body): Json<Value>) -> Response {
    let Some(session_id) = body
        .pointer("/session/session_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    else {
        log::warn!("webhook request without a session id");
        return StatusCode::BAD_REQUEST.into_response();
    };

    let utterance = body
        .pointer("/request/original_utterance")
        .and_then(Value::as_str)
        .unwrap_or("");

    let reply = agent.handle_turn(session_id, utterance).await;

    if let Some(job) = reply.background {
        let agent = agent.clone();
        tokio::spawn(async move { agent.continue_background(job).await });
    }

    Json(envelope(&body, &reply.text)).into_response()
}

fn envelope(request: &Value, text: &str) -> Value {
    json!({
        "version": request.get("version").cloned().unwrap_or_else(|| json!("1.0")),
        "session": request.get("session").cloned().unwrap_or(Value::Null),
        "response": {
            "text": text,
            "tts": text,
            "end_session": false,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::models::ModelCatalog;
    use crate::core::agent::testutil::{chat_body, MemStore, MockLlm, MockSearch};
    use crate::core::agent::TurnBudget;
    use crate::core::ports::llm::LlmError;
    use crate::core::ports::store::StorePort;

    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_agent(llm: MockLlm) -> (Arc<Agent>, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        let agent = Agent::new(
            Arc::new(llm),
            Arc::new(MockSearch::new(json!({ "results": [] }))),
            store.clone(),
            Arc::new(ModelCatalog::fixed(&["test-model:free"])),
            TurnBudget::default(),
        );
        (Arc::new(agent), store)
    }

    fn webhook_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn response_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn answers_inside_the_platform_envelope() {
        let (agent, _store) = test_agent(MockLlm::new(vec![Ok(chat_body("сорок два"))]));
        let request = webhook_request(json!({
            "version": "1.0",
            "session": { "session_id": "web-1" },
            "request": { "original_utterance": "сколько будет шесть на семь" }
        }));

        let response = router(agent).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        assert_eq!(body["response"]["text"], "сорок два");
        assert_eq!(body["response"]["end_session"], false);
        assert_eq!(body["session"]["session_id"], "web-1");
    }

    #[tokio::test]
    async fn missing_session_id_is_a_bad_request() {
        let (agent, _store) = test_agent(MockLlm::new(vec![]));
        let request = webhook_request(json!({
            "request": { "original_utterance": "привет" }
        }));

        let response = router(agent).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_utterance_greets_like_a_new_session() {
        let (agent, store) = test_agent(MockLlm::new(vec![]));
        let request = webhook_request(json!({
            "session": { "session_id": "web-2" },
            "request": {}
        }));

        let response = router(agent).oneshot(request).await.unwrap();
        let body = response_json(response).await;
        assert!(body["response"]["text"]
            .as_str()
            .unwrap()
            .starts_with("Говорит"));
        assert!(store.load_conversation("web-2").is_empty());
    }

    #[tokio::test]
    async fn slow_turn_returns_waiting_and_spawns_continuation() {
        let (agent, store) = test_agent(MockLlm::new(vec![
            Err(LlmError::Timeout(Duration::from_secs(4))),
            Ok(chat_body("отложенный ответ")),
        ]));
        let request = webhook_request(json!({
            "session": { "session_id": "web-3" },
            "request": { "original_utterance": "долгий вопрос" }
        }));

        let response = router(agent.clone()).oneshot(request).await.unwrap();
        let body = response_json(response).await;
        assert_eq!(
            body["response"]["text"],
            crate::core::agent::WAITING_MESSAGE
        );

        // Let the spawned continuation run to completion.
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if store
                .load_pending("web-3")
                .is_some_and(|record| record.response.is_some())
            {
                break;
            }
        }
        let record = store.load_pending("web-3").expect("pending record");
        assert_eq!(record.response.unwrap().text, "отложенный ответ");
    }
}
