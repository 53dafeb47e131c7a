use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SYSTEM_PROMPT: &str = "Ты голосовой ассистент, отвечай коротко по существу, без эмодзи. \
Не используй в ответах специальных разделителей, только простой текст. Длинные ответы дели на части. \
Отправляй продолжение, когда просят: дальше или продолжи. \
У тебя есть доступ к функции поиска в интернете через Google Custom Search. \
Если тебе нужна актуальная информация из интернета или пользователь просит найти что-то, \
используй функцию search_internet. Сформулируй поисковый запрос максимально точно и информативно.";

pub const TECH_ERROR_MESSAGE: &str =
    "Произошла техническая ошибка. Пожалуйста, попробуйте позже.";

/// One piece of message content. Text parts are the only kind the skill
/// inspects; everything else is decoded once and carried opaquely so that
/// histories written by newer models survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(untagged)]
    Other(Value),
}

impl ContentPart {
    pub fn text(value: impl Into<String>) -> Self {
        ContentPart::Text { text: value.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default = "default_arguments")]
    pub arguments: String,
}

fn default_arguments() -> String {
    "{}".to_string()
}

fn default_tool_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_tool_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

/// A stored conversation turn. `content` is never empty: anything missing or
/// unusable normalizes to a single technical-error text part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: Vec<ContentPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![ContentPart::text(text)],
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: vec![ContentPart::text(text)],
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, payload: &Value) -> Self {
        Self {
            role: "tool".to_string(),
            content: vec![ContentPart::text(payload.to_string())],
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Normalized model output: display text plus the turn to append to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub text: String,
    pub message: ChatTurn,
}

impl ChatPayload {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            message: ChatTurn::assistant(text.clone()),
            text,
        }
    }
}

/// Outbound chat-completion message. Tool turns carry their content as a
/// single string; everything else ships structured parts.
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

fn part_from_value(part: &Value) -> Option<ContentPart> {
    match part {
        Value::String(text) => Some(ContentPart::text(text.clone())),
        Value::Object(map) => {
            let kind = map.get("type").and_then(Value::as_str).unwrap_or("text");
            if kind == "text" {
                let text = match map.get("text") {
                    Some(Value::String(text)) => text.clone(),
                    Some(Value::Number(num)) => num.to_string(),
                    _ => String::new(),
                };
                Some(ContentPart::Text { text })
            } else {
                Some(ContentPart::Other(part.clone()))
            }
        }
        _ => None,
    }
}

/// Coerces any content shape into a non-empty part list. Strings become one
/// text part, lists map element-wise, anything unusable falls back to a
/// single technical-error part. Never fails, never returns an empty list.
pub fn normalize_content_parts(content: &Value) -> Vec<ContentPart> {
    let mut parts = match content {
        Value::String(text) => vec![ContentPart::text(text.clone())],
        Value::Array(items) => items.iter().filter_map(part_from_value).collect(),
        _ => Vec::new(),
    };

    if parts.is_empty() {
        parts.push(ContentPart::text(TECH_ERROR_MESSAGE));
    }

    parts
}

/// Joins the trimmed, non-empty text parts with newlines. Non-text parts are
/// skipped for display. An all-empty join yields the technical-error text.
pub fn render_parts(parts: &[ContentPart]) -> String {
    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            ContentPart::Other(_) => None,
        })
        .collect();

    let joined = texts.join("\n");
    if joined.is_empty() {
        TECH_ERROR_MESSAGE.to_string()
    } else {
        joined
    }
}

fn tool_content_string(parts: &[ContentPart]) -> String {
    match parts {
        [ContentPart::Text { text }] => text.clone(),
        _ => serde_json::to_string(parts).unwrap_or_default(),
    }
}

/// Builds the outbound message list: the system prompt first, then every
/// stored turn. Tool turns keep their call id and collapse to string content;
/// turns without a role are skipped; `tool_calls` pass through verbatim.
pub fn build_outbound_messages(history: &[ChatTurn], system_prompt: &str) -> Vec<WireMessage> {
    let mut messages = vec![WireMessage {
        role: "system".to_string(),
        content: json!([{ "type": "text", "text": system_prompt }]),
        tool_calls: None,
        tool_call_id: None,
    }];

    for turn in history {
        if turn.role.is_empty() {
            continue;
        }

        if turn.role == "tool" {
            messages.push(WireMessage {
                role: "tool".to_string(),
                content: Value::String(tool_content_string(&turn.content)),
                tool_calls: None,
                tool_call_id: Some(turn.tool_call_id.clone().unwrap_or_default()),
            });
        } else {
            messages.push(WireMessage {
                role: turn.role.clone(),
                content: serde_json::to_value(&turn.content).unwrap_or(Value::Null),
                tool_calls: turn.tool_calls.clone(),
                tool_call_id: None,
            });
        }
    }

    messages
}

/// Rebuilds history from a stored JSON document. Entries with a role are
/// re-normalized, bare strings are treated as user turns, anything else is
/// dropped.
pub fn history_from_value(data: &Value) -> Vec<ChatTurn> {
    let Some(entries) = data.as_array() else {
        return Vec::new();
    };

    let mut history = Vec::new();
    for entry in entries {
        match entry {
            Value::String(text) => history.push(ChatTurn::user(text.clone())),
            Value::Object(map) => {
                let Some(role) = map.get("role").and_then(Value::as_str) else {
                    continue;
                };
                if role.is_empty() {
                    continue;
                }
                let content = map.get("content").unwrap_or(&Value::Null);
                let tool_calls = map
                    .get("tool_calls")
                    .and_then(|calls| serde_json::from_value(calls.clone()).ok());
                history.push(ChatTurn {
                    role: role.to_string(),
                    content: normalize_content_parts(content),
                    tool_calls,
                    tool_call_id: map
                        .get("tool_call_id")
                        .and_then(Value::as_str)
                        .map(ToOwned::to_owned),
                });
            }
            _ => {}
        }
    }

    history
}

/// Normalizes one chat-completion response body into a payload. A 2xx body
/// without a usable `choices[0].message` is malformed: it is logged (shape
/// only) and replaced with the fixed technical-error payload.
pub fn extract_response_payload(body: &Value) -> ChatPayload {
    if let Some(message) = body.pointer("/choices/0/message").filter(|m| !m.is_null()) {
        let parts = normalize_content_parts(message.get("content").unwrap_or(&Value::Null));
        let role = message
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or("assistant")
            .to_string();
        let tool_calls = message
            .get("tool_calls")
            .filter(|calls| calls.as_array().is_some_and(|arr| !arr.is_empty()))
            .and_then(|calls| match serde_json::from_value(calls.clone()) {
                Ok(calls) => Some(calls),
                Err(err) => {
                    log::warn!("dropping unparseable tool_calls: {err}");
                    None
                }
            });

        return ChatPayload {
            text: render_parts(&parts),
            message: ChatTurn {
                role,
                content: parts,
                tool_calls,
                tool_call_id: None,
            },
        };
    }

    log::error!(
        "unexpected chat completion response shape: top-level keys {:?}",
        body.as_object()
            .map(|map| map.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default()
    );
    ChatPayload::from_text(TECH_ERROR_MESSAGE)
}
