//! Crawl execution: request/result types and the executor
//!
//! A crawl names a URL and optionally a site identity. The executor
//! resolves the domain's bypass rule, loads the page under the site's
//! session (when given) through a pooled browser context, and hands the
//! captured HTML to the Markdown pipeline.

mod executor;

pub use executor::CrawlExecutor;

use crate::browser::BrowserError;
use crate::markdown::MarkdownOptions;
use crate::session::{ProfileStatus, StoreError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Which Markdown variants the caller wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkdownFormat {
    Raw,
    Fit,
    Both,
}

impl std::str::FromStr for MarkdownFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "fit" => Ok(Self::Fit),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown format '{}', expected raw|fit|both", other)),
        }
    }
}

/// One crawl request
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub url: String,

    /// Site identity whose session the crawl runs under
    pub site_name: Option<String>,

    pub format: MarkdownFormat,

    pub js_enabled: bool,

    pub bypass_cache: bool,

    pub markdown: MarkdownOptions,
}

impl CrawlRequest {
    /// A request with the service defaults
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            site_name: None,
            format: MarkdownFormat::Both,
            js_enabled: true,
            bypass_cache: false,
            markdown: MarkdownOptions::default(),
        }
    }
}

/// What one crawl produced. Built fresh per request, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub url: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub raw_markdown: String,
    pub fit_markdown: String,
    pub title: String,
    pub word_count: usize,
    pub error_message: Option<String>,
}

impl CrawlResult {
    /// The failure shape every crawl error maps to at the boundary
    pub fn failure(url: impl Into<String>, status_code: Option<u16>, message: String) -> Self {
        Self {
            url: url.into(),
            success: false,
            status_code,
            raw_markdown: String::new(),
            fit_markdown: String::new(),
            title: String::new(),
            word_count: 0,
            error_message: Some(message),
        }
    }
}

/// Errors raised by crawl execution
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The named site has no usable session; the caller must run setup
    #[error("Session for '{site_name}' is not ready ({}); run setup first", describe_status(.status))]
    SessionNotReady {
        site_name: String,
        /// The profile's current status; `None` when no profile exists
        status: Option<ProfileStatus>,
    },

    /// The session stopped passing validation at crawl time
    #[error("Session for '{site_name}' has expired; run setup again")]
    SessionExpired { site_name: String },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Navigation or network failure loading the page
    #[error("Navigation failed: {message}")]
    Navigation {
        status_code: Option<u16>,
        message: String,
    },

    /// The context pool stayed full past the caller's deadline
    #[error("Context pool exhausted: no slot freed within {waited:?} (capacity {capacity})")]
    PoolExhausted { capacity: u32, waited: Duration },

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

impl CrawlError {
    /// HTTP status to report alongside the failure, when one is known
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Navigation { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

fn describe_status(status: &Option<ProfileStatus>) -> String {
    match status {
        Some(status) => format!("status {}", status),
        None => "no profile".to_string(),
    }
}

/// Result type for crawl operations
pub type CrawlResultT<T> = Result<T, CrawlError>;
