//! Gatecrawl: an authenticated crawling and Markdown extraction core
//!
//! This crate implements the session-aware heart of a crawling service:
//! it establishes and persists logged-in browser sessions per site,
//! resolves declarative bypass rules per domain, loads pages under those
//! rules through a bounded pool of headless browser contexts, and
//! converts the captured HTML into raw and noise-filtered Markdown.

pub mod auth;
pub mod browser;
pub mod config;
pub mod crawl;
pub mod markdown;
pub mod rules;
pub mod session;

use thiserror::Error;

/// Main error type for gatecrawl operations
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule table error: {0}")]
    Rules(#[from] rules::RuleError),

    #[error("Session store error: {0}")]
    Store(#[from] session::StoreError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Setup error: {0}")]
    Setup(#[from] auth::SetupError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] crawl::CrawlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for gatecrawl operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::ServiceConfig;
pub use crawl::{CrawlRequest, CrawlResult, MarkdownFormat};
pub use rules::{EffectiveRule, RuleEngine};
pub use session::{ProfileStatus, SiteProfile};
