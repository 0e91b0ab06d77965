//! Common utilities and shared types for eventrelay.
//!
//! This crate provides foundational components used across all eventrelay crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//!
//! # Example
//!
//! ```no_run
//! use eventrelay_common::Config;
//!
//! fn example() -> Result<(), config::ConfigError> {
//!     let config = Config::load()?;
//!     println!("Retry workers: {}", config.delivery.retry_workers);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

pub use config::{
    Config, DeliveryConfig, DestinationConfig, EscalationConfig, RedisConfig, ServerConfig,
    SmtpConfig,
};
pub use error::{AppError, AppResult};
