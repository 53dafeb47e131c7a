use crate::core::message::TECH_ERROR_MESSAGE;
use crate::core::ports::llm::LlmError;

const EXCERPT_LIMIT: usize = 300;

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= EXCERPT_LIMIT {
        trimmed.to_string()
    } else {
        trimmed.chars().take(EXCERPT_LIMIT).collect()
    }
}

/// Turns a transport failure into the user-visible error text. Timeouts are
/// not meant to reach the user (they route to the continuation path), but get
/// a sane rendering anyway.
pub fn format_llm_error(error: &LlmError) -> String {
    match error {
        LlmError::Http { status, body } => {
            let details = excerpt(body);
            if details.is_empty() {
                format!("Ошибка OpenRouter код={status}")
            } else {
                format!("Ошибка OpenRouter код={status} {details}")
            }
        }
        LlmError::Connection(details) => {
            let details = details.trim();
            if details.is_empty() {
                "Ошибка соединения с OpenRouter код=N/A".to_string()
            } else {
                format!("Ошибка соединения с OpenRouter код=N/A {details}")
            }
        }
        LlmError::Malformed(_) => TECH_ERROR_MESSAGE.to_string(),
        LlmError::Timeout(_) | LlmError::Generic(_) => {
            let details = error.to_string();
            let details = details.trim();
            if details.is_empty() {
                "Внутренняя ошибка код=N/A".to_string()
            } else {
                format!("Внутренняя ошибка код=N/A {details}")
            }
        }
    }
}
