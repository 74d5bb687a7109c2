// Core modules
pub mod api;
pub mod bot;
pub mod config;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod risk;
pub mod store;
pub mod strategy;

// Re-export commonly used types
pub use bot::TradingBot;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
