//! Google Custom Search adapter behind the `search_internet` tool.
//!
//! The search port is infallible on purpose: whatever goes wrong here is
//! folded into the JSON payload the model sees, so a broken search never
//! aborts a conversation turn.

use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::core::ports::search::SearchPort;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(3);
const RESULT_COUNT: u32 = 5;
const ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

pub struct GoogleSearchClient {
    http: reqwest::Client,
    api_key: String,
    cx: String,
}

impl GoogleSearchClient {
    pub fn new(api_key: String, cx: String) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(SEARCH_TIMEOUT).build()?;
        Ok(Self { http, api_key, cx })
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.cx.is_empty()
    }

    async fn run(&self, query: &str) -> Value {
        if !self.is_configured() {
            log::warn!("search requested but no API keys are configured");
            return error_payload("Поиск не настроен. Отсутствуют ключи API.");
        }

        let response = self
            .http
            .get(ENDPOINT)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", query),
                ("num", &RESULT_COUNT.to_string()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                log::warn!("search timed out after {SEARCH_TIMEOUT:?}");
                return error_payload("Таймаут при выполнении поиска");
            }
            Err(err) => {
                log::error!("search request failed: {err}");
                return error_payload("Ошибка соединения с поисковым API");
            }
        };

        match response.json::<Value>().await {
            Ok(body) => payload_from_body(&body),
            Err(err) => {
                log::error!("search returned unparseable body: {err}");
                error_payload("Неверный ответ от поискового API")
            }
        }
    }
}

impl SearchPort for GoogleSearchClient {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Value> {
        Box::pin(self.run(query))
    }
}

fn error_payload(message: &str) -> Value {
    json!({ "error": message, "results": [] })
}

/// Maps a Custom Search response body onto the compact payload the model
/// sees: title, link and snippet per item, plus the reported total.
fn payload_from_body(body: &Value) -> Value {
    if let Some(message) = body
        .pointer("/error/message")
        .and_then(Value::as_str)
    {
        log::error!("search API error: {message}");
        return error_payload(&format!("Ошибка поиска: {message}"));
    }

    let results: Vec<Value> = body
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    json!({
                        "title": item.get("title").and_then(Value::as_str).unwrap_or(""),
                        "link": item.get("link").and_then(Value::as_str).unwrap_or(""),
                        "snippet": item.get("snippet").and_then(Value::as_str).unwrap_or(""),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let total = body
        .pointer("/searchInformation/totalResults")
        .and_then(Value::as_str)
        .unwrap_or("0");

    json!({ "results": results, "total_results": total })
}
