pub mod config;
pub mod llm;
pub mod models;
pub mod search;
pub mod store;
