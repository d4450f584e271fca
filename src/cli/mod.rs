//! CLI module for ragbuddy
//!
//! Handles command-line argument parsing, configuration and credentials.

pub mod args;
pub mod config;
pub mod credentials;

pub use args::{Args, Commands, Verbosity};
pub use config::Config;
pub use credentials::{Credentials, IndexCredentials};
