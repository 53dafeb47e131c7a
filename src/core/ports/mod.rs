pub mod llm;
pub mod search;
pub mod store;
