use std::process::ExitCode;
use std::sync::Arc;

use godeep_lib::adapters::config::Settings;
use godeep_lib::adapters::llm::OpenRouterClient;
use godeep_lib::adapters::models::ModelCatalog;
use godeep_lib::adapters::search::GoogleSearchClient;
use godeep_lib::adapters::store::FileStore;
use godeep_lib::core::agent::Agent;
use godeep_lib::runtime::http;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let settings = Settings::from_env();
    if settings.openrouter_api_key.is_empty() {
        log::error!("OPENROUTER_API_KEY is not set");
        return ExitCode::FAILURE;
    }

    let models = match ModelCatalog::load(&settings.models_dir) {
        Ok(catalog) => Arc::new(catalog),
        Err(err) => {
            log::error!("cannot load model catalog: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(model_id) = &settings.model_id {
        if !models.select(model_id) {
            log::warn!("MODEL_ID={model_id} is not in models.txt, keeping the stored selection");
        }
    }
    let entry = models.current_entry();
    log::info!(
        "active model: {} (context window {})",
        entry.id,
        entry.context_window
    );

    let llm = match OpenRouterClient::new(
        settings.openrouter_base_url.clone(),
        settings.openrouter_api_key.clone(),
        settings.site_url.clone(),
        settings.app_name.clone(),
    ) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            log::error!("cannot build HTTP client: {err}");
            return ExitCode::FAILURE;
        }
    };

    let search = match GoogleSearchClient::new(
        settings.google_api_key.clone(),
        settings.google_cx.clone(),
    ) {
        Ok(client) => {
            if !client.is_configured() {
                log::warn!("search keys are not set, search_internet will report an error");
            }
            Arc::new(client)
        }
        Err(err) => {
            log::error!("cannot build search client: {err}");
            return ExitCode::FAILURE;
        }
    };

    let store = match FileStore::new(&settings.storage_dir) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            log::error!(
                "cannot prepare storage at {}: {err}",
                settings.storage_dir.display()
            );
            return ExitCode::FAILURE;
        }
    };

    let agent = Arc::new(Agent::new(llm, search, store, models, settings.budget()));

    if let Err(err) = http::serve(agent, &settings.bind).await {
        log::error!("server failed: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
