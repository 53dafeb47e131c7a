pub const WAITING_MESSAGE: &str = "Надо подумать. Через несколько секунд скажите: Готово?";

pub const SESSION_RESET_MESSAGE: &str =
    "Ответ так и не сформировался, давайте попробуем заново.";

pub const HELP_MESSAGE: &str = "Я голосовой помощник по типу chatGPT. Я отвечаю на любые вопросы, \
со мной можно вести длинный разговор на любую тему! Держу большой контекст (132к), а если GPT-OSS \
надоест, могу переключатся между моделями, не теряя нить разговора. Спроси что угодно или скажи \
«переключи модель», чтобы выбрать другую модель.";

const WAKE_WORDS: [&str; 2] = ["алиса", "аиса"];

const MODEL_SWITCH_TRIGGERS: [&str; 2] = ["переключи модель", "смени модель"];

const HELP_COMMANDS: [&str; 2] = ["помощь", "что ты умеешь"];

const MAX_RESPONSE_LENGTH: usize = 1024;

/// Strips a leading wake word ("алиса," / "аиса,") and surrounding whitespace.
pub fn clean_input(input: &str) -> String {
    let mut text = input.trim();
    for wake in WAKE_WORDS {
        let lowered = text.to_lowercase();
        if lowered.starts_with(wake) {
            // Cyrillic case folding is byte-length preserving in UTF-8.
            text = text[wake.len()..].trim_start();
            text = text.strip_prefix(',').unwrap_or(text).trim_start();
        }
    }
    text.to_string()
}

fn normalize_command(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .trim_end_matches(['?', '!', '.', ','])
        .trim()
        .to_string()
}

pub fn is_help_command(text: &str) -> bool {
    let normalized = normalize_command(text);
    HELP_COMMANDS.iter().any(|command| *command == normalized)
}

pub fn wants_model_switch(text: &str) -> bool {
    let lowered = text.to_lowercase();
    MODEL_SWITCH_TRIGGERS
        .iter()
        .any(|trigger| lowered.contains(trigger))
}

pub fn greeting(model_display_name: &str) -> String {
    format!(
        "Говорит {model_display_name}! Спроси что угодно или скажи «помощь», чтобы услышать инструкцию."
    )
}

pub fn still_working_message(elapsed_seconds: u64) -> String {
    format!("Ещё думаю, прошло {elapsed_seconds} секунд. Скажите чуть позже: Готово?")
}

/// Caps a reply at the platform limit of 1024 characters.
pub fn truncate_reply(text: &str) -> String {
    if text.chars().count() > MAX_RESPONSE_LENGTH {
        text.chars().take(MAX_RESPONSE_LENGTH).collect()
    } else {
        text.to_string()
    }
}
