pub mod analytics;
pub mod cli;
pub mod config;
pub mod error;
pub mod guidance;
pub mod knowledge;
pub mod llm;
pub mod memory;
pub mod screening;
pub mod service;
pub mod store;
pub mod vector;

pub use config::Config;
pub use error::ServiceError;
pub use service::HarborService;
pub use store::SqliteStore;
