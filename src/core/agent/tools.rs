use serde_json::{json, Value};

use crate::core::message::{ChatTurn, FunctionDefinition, ToolCall, ToolDefinition};
use crate::core::ports::search::SearchPort;

/// The one built-in tool exposed to the model.
pub fn search_tool_definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        kind: "function".to_string(),
        function: FunctionDefinition {
            name: "search_internet".to_string(),
            description:
                "Используй эту функцию, когда пользователь явно просит найти что-то в интернете."
                    .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "google api search query. Сформулируй запрос максимально точно и информативно."
                    }
                },
                "required": ["query"]
            }),
        },
    }]
}

async fn dispatch_tool_call(call: &ToolCall, search: &dyn SearchPort) -> Value {
    if call.function.name != "search_internet" {
        log::error!("unknown function call: {}", call.function.name);
        return json!({ "error": format!("Неизвестная функция: {}", call.function.name) });
    }

    let arguments: Value =
        serde_json::from_str(&call.function.arguments).unwrap_or(Value::Null);
    let query = arguments
        .get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|query| !query.is_empty());

    match query {
        Some(query) => {
            log::info!("executing search, query length {}", query.chars().count());
            search.search(query).await
        }
        None => {
            log::error!("invalid search_internet arguments");
            json!({ "error": "Неверный формат запроса поиска", "results": [] })
        }
    }
}

/// Executes every requested tool call and appends one `tool` turn per request,
/// in request order, keyed by the request id. Unknown tools and malformed
/// arguments become error payloads inside the turn; nothing here aborts the
/// round.
pub async fn run_tool_calls(
    tool_calls: &[ToolCall],
    history: &mut Vec<ChatTurn>,
    search: &dyn SearchPort,
) {
    for call in tool_calls {
        let payload = dispatch_tool_call(call, search).await;
        history.push(ChatTurn::tool(call.id.clone(), &payload));
    }
}
