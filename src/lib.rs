pub mod cache;
pub mod config;
pub mod error;
pub mod history;
pub mod metadata;
pub mod metrics;
pub mod normalize;
pub mod server;
pub mod service;
pub mod watch;
