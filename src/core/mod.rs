//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

// Re-exports for convenience
pub use config::WebConfig;
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_web_configuration};
