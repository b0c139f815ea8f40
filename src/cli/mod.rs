//! CLI command implementations

pub mod analytics;
pub mod chat;
pub mod child;
pub mod family;
pub mod knowledge;
pub mod sessions;
