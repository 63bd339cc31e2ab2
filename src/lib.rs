pub mod api;
pub mod config;
pub mod secrets;
pub mod security;
pub mod store;
pub mod utils;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
