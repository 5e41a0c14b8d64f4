pub mod generator;
pub mod llm;
pub mod patcher;
pub mod schema;
pub mod spec;
pub mod workspace;
