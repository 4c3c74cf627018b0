pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod init;
pub mod logger;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod store;
