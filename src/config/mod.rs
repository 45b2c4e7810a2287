//! Configuration module for the gatecrawl service
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files for the service: browser launch options, the context pool, the
//! session store, the rule table location, and crawl/setup behavior.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, CrawlConfig, PoolConfig, RulesConfig, ServiceConfig, SessionConfig, SetupConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
