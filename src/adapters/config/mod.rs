//! Process configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::core::agent::TurnBudget;

#[derive(Debug, Clone)]
pub struct Settings {
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub site_url: Option<String>,
    pub app_name: Option<String>,
    pub google_api_key: String,
    pub google_cx: String,
    pub model_id: Option<String>,
    pub storage_dir: PathBuf,
    pub models_dir: PathBuf,
    pub bind: String,
    sla: Option<f64>,
    max_wait: Option<f64>,
    max_iterations: Option<u32>,
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_seconds(raw: Option<String>, name: &str) -> Option<f64> {
    let raw = raw?;
    match raw.parse::<f64>() {
        Ok(value) if value > 0.0 => Some(value),
        _ => {
            log::warn!("ignoring {name}={raw}: expected a positive number of seconds");
            None
        }
    }
}

fn parse_count(raw: Option<String>, name: &str) -> Option<u32> {
    let raw = raw?;
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            log::warn!("ignoring {name}={raw}: expected a positive integer");
            None
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            // GEMINI_API_KEY is accepted as a legacy alias.
            openrouter_api_key: env_string("OPENROUTER_API_KEY")
                .or_else(|| env_string("GEMINI_API_KEY"))
                .unwrap_or_default(),
            openrouter_base_url: env_string("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string()),
            site_url: env_string("OPENROUTER_SITE_URL"),
            app_name: env_string("OPENROUTER_APP_NAME"),
            google_api_key: env_string("GOOGLE_API_KEY").unwrap_or_default(),
            google_cx: env_string("GOOGLE_CX").unwrap_or_default(),
            model_id: env_string("MODEL_ID"),
            storage_dir: env_string("GODEEP_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./storage")),
            models_dir: env_string("GODEEP_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            bind: env_string("GODEEP_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            sla: parse_seconds(env_string("GODEEP_SLA_SECONDS"), "GODEEP_SLA_SECONDS"),
            max_wait: parse_seconds(env_string("GODEEP_MAX_WAIT_SECONDS"), "GODEEP_MAX_WAIT_SECONDS"),
            max_iterations: parse_count(env_string("GODEEP_MAX_ITERATIONS"), "GODEEP_MAX_ITERATIONS"),
        }
    }

    /// The default budget with any environment overrides applied.
    pub fn budget(&self) -> TurnBudget {
        let mut budget = TurnBudget::default();
        if let Some(sla) = self.sla {
            budget.sla = Duration::from_secs_f64(sla);
        }
        if let Some(max_wait) = self.max_wait {
            budget.max_wait = Duration::from_secs_f64(max_wait);
        }
        if let Some(max_iterations) = self.max_iterations {
            budget.max_iterations = max_iterations;
        }
        budget
    }
}
