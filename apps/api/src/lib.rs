pub mod assistant;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod llm_client;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
