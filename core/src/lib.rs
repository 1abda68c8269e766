pub mod backends;
pub mod config;
pub mod errors;
pub mod files;
pub mod session;
