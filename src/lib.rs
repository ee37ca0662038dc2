// Core modules
pub mod config;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod execution;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod regime;
pub mod risk;
pub mod sim;
pub mod sizing;
pub mod strategy;
pub mod timeframe;

// Re-export commonly used types
pub use engine::TradingEngine;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub use error::{Result, TradingError};
