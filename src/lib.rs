pub mod app;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod registry;
pub mod scheduler;
pub mod telegram;
pub mod telemetry;
pub mod transformer;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
