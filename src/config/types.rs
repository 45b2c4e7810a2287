use serde::Deserialize;

/// Main configuration structure for the gatecrawl service
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub browser: BrowserConfig,
    pub pool: PoolConfig,
    pub session: SessionConfig,
    pub rules: RulesConfig,
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub setup: SetupConfig,
}

/// Browser launch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Path to the Chromium executable. When absent, the
    /// CHROMIUM_EXECUTABLE_PATH environment variable is consulted, then
    /// the browser library's own detection.
    #[serde(rename = "executable-path")]
    pub executable_path: Option<String>,

    /// Run crawl contexts headless
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Viewport width in pixels
    #[serde(rename = "viewport-width", default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Viewport height in pixels
    #[serde(rename = "viewport-height", default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Default user agent, overridable per rule
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,
}

/// Browser context pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of simultaneously open browser contexts
    #[serde(rename = "max-contexts")]
    pub max_contexts: u32,

    /// How long a caller waits for a free context slot (milliseconds)
    #[serde(rename = "acquire-timeout")]
    pub acquire_timeout: u64,
}

/// Session store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Path to the SQLite database holding site profiles
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Bypass rule table configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Path to the JSON rule table
    #[serde(rename = "table-path")]
    pub table_path: String,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Hard per-navigation timeout (milliseconds)
    #[serde(rename = "page-timeout")]
    pub page_timeout: u64,

    /// Delay after navigation before the DOM is captured (milliseconds),
    /// gives client-side rendering a chance to settle
    #[serde(rename = "settle-delay", default = "default_settle_delay")]
    pub settle_delay: u64,
}

/// Authentication setup configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SetupConfig {
    /// Login-completion polling interval (milliseconds)
    #[serde(rename = "poll-interval", default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Default setup timeout when the caller does not pass one (seconds)
    #[serde(rename = "default-timeout", default = "default_setup_timeout")]
    pub default_timeout: u64,

    /// Setup opens a visible browser by default so a human can log in
    #[serde(default)]
    pub headless: bool,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            default_timeout: default_setup_timeout(),
            headless: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    800
}

fn default_settle_delay() -> u64 {
    500
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_setup_timeout() -> u64 {
    300
}
