//! Configuration module for tidemark
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files.
//!
//! # Example
//!
//! ```no_run
//! use tidemark::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawling {} channels", config.channel.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ChannelConfig, Config, FetchConfig, OutputConfig, PolitenessConfig, RunConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
