//! OpenRouter chat-completions transport.
//!
//! The adapter owns one pooled `reqwest` client and applies the caller's
//! per-call timeout on top of it. Message content never reaches the logs;
//! request logging is limited to the model id and a redacted shape summary.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::core::message::{ToolDefinition, WireMessage};
use crate::core::ports::llm::{ChatCall, LlmError, LlmPort};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const OVERALL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    site_url: Option<String>,
    app_name: Option<String>,
}

impl OpenRouterClient {
    pub fn new(
        base_url: String,
        api_key: String,
        site_url: Option<String>,
        app_name: Option<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(OVERALL_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            site_url,
            app_name,
        })
    }

    async fn send(&self, call: ChatCall<'_>) -> Result<Value, LlmError> {
        let request = ChatCompletionsRequest {
            model: call.model,
            messages: call.messages,
            tools: call.tools,
        };
        log::info!(
            "chat completion: model={} timeout={:?} shape=[{}]",
            call.model,
            call.timeout,
            redacted_summary(call.messages)
        );

        let mut builder = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(call.timeout)
            .json(&request);
        if let Some(site_url) = &self.site_url {
            builder = builder.header("HTTP-Referer", site_url);
        }
        if let Some(app_name) = &self.app_name {
            builder = builder.header("X-Title", app_name);
        }

        let response = builder.send().await.map_err(|err| classify(err, call.timeout))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| classify(err, call.timeout))?;

        if !status.is_success() {
            log::error!(
                "chat completion failed: status={} body_len={}",
                status.as_u16(),
                body.len()
            );
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|err| LlmError::Malformed(format!("response is not JSON: {err}")))
    }
}

impl LlmPort for OpenRouterClient {
    fn complete<'a>(&'a self, call: ChatCall<'a>) -> BoxFuture<'a, Result<Value, LlmError>> {
        Box::pin(self.send(call))
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(timeout)
    } else if err.is_connect() {
        LlmError::Connection(err.to_string())
    } else {
        LlmError::Generic(err.to_string())
    }
}

/// Shape of the outbound conversation without its content, safe for logs.
fn redacted_summary(messages: &[WireMessage]) -> String {
    messages
        .iter()
        .map(|message| {
            let parts = match &message.content {
                Value::Array(items) => items.len(),
                Value::Null => 0,
                _ => 1,
            };
            let calls = message
                .tool_calls
                .as_ref()
                .map(|calls| format!("+{} calls", calls.len()))
                .unwrap_or_default();
            format!("{}[omitted {} parts{}]", message.role, parts, calls)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
