pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod infra;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod pages;
pub mod pagination;
pub mod range;
pub mod services;
pub mod stages;
pub mod stats;
pub mod store;
