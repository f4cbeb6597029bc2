pub mod auth;
pub mod blog;
pub mod common;
pub mod constants;
pub mod discover;
pub mod error;
pub mod import;
pub mod index;
pub mod llm;
pub mod loading;
pub mod model;
pub mod pricing;
pub mod refresh;
pub mod runner;
pub mod server;
pub mod store;
