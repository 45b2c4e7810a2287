use crate::config::types::{BrowserConfig, CrawlConfig, PoolConfig, ServiceConfig, SetupConfig};
use crate::ConfigError;

/// Validates the entire service configuration
pub fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    validate_browser_config(&config.browser)?;
    validate_pool_config(&config.pool)?;
    validate_crawl_config(&config.crawl)?;
    validate_setup_config(&config.setup)?;

    if config.session.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "session database-path cannot be empty".to_string(),
        ));
    }

    if config.rules.table_path.is_empty() {
        return Err(ConfigError::Validation(
            "rules table-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.executable_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "browser executable-path cannot be an empty string; omit the key instead"
                    .to_string(),
            ));
        }
    }

    if config.viewport_width < 320 || config.viewport_width > 7680 {
        return Err(ConfigError::Validation(format!(
            "viewport-width must be between 320 and 7680, got {}",
            config.viewport_width
        )));
    }

    if config.viewport_height < 240 || config.viewport_height > 4320 {
        return Err(ConfigError::Validation(format!(
            "viewport-height must be between 240 and 4320, got {}",
            config.viewport_height
        )));
    }

    Ok(())
}

/// Validates pool configuration
fn validate_pool_config(config: &PoolConfig) -> Result<(), ConfigError> {
    if config.max_contexts < 1 || config.max_contexts > 64 {
        return Err(ConfigError::Validation(format!(
            "max-contexts must be between 1 and 64, got {}",
            config.max_contexts
        )));
    }

    if config.acquire_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "acquire-timeout must be >= 100ms, got {}ms",
            config.acquire_timeout
        )));
    }

    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.page_timeout < 1000 {
        return Err(ConfigError::Validation(format!(
            "page-timeout must be >= 1000ms, got {}ms",
            config.page_timeout
        )));
    }

    if config.settle_delay > config.page_timeout {
        return Err(ConfigError::Validation(format!(
            "settle-delay ({}ms) cannot exceed page-timeout ({}ms)",
            config.settle_delay, config.page_timeout
        )));
    }

    Ok(())
}

/// Validates setup configuration
fn validate_setup_config(config: &SetupConfig) -> Result<(), ConfigError> {
    if config.poll_interval < 100 {
        return Err(ConfigError::Validation(format!(
            "setup poll-interval must be >= 100ms, got {}ms",
            config.poll_interval
        )));
    }

    if config.default_timeout < 1 {
        return Err(ConfigError::Validation(
            "setup default-timeout must be >= 1 second".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{RulesConfig, SessionConfig};

    fn base_config() -> ServiceConfig {
        ServiceConfig {
            browser: BrowserConfig {
                executable_path: None,
                headless: true,
                viewport_width: 1280,
                viewport_height: 800,
                user_agent: None,
            },
            pool: PoolConfig {
                max_contexts: 4,
                acquire_timeout: 30_000,
            },
            session: SessionConfig {
                database_path: "./sessions.db".to_string(),
            },
            rules: RulesConfig {
                table_path: "./rules.json".to_string(),
            },
            crawl: CrawlConfig {
                page_timeout: 60_000,
                settle_delay: 500,
            },
            setup: SetupConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_zero_pool_capacity_rejected() {
        let mut config = base_config();
        config.pool.max_contexts = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_sub_second_page_timeout_rejected() {
        let mut config = base_config();
        config.crawl.page_timeout = 500;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let mut config = base_config();
        config.session.database_path = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_rules_path_rejected() {
        let mut config = base_config();
        config.rules.table_path = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_settle_delay_beyond_timeout_rejected() {
        let mut config = base_config();
        config.crawl.settle_delay = 120_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_tiny_viewport_rejected() {
        let mut config = base_config();
        config.browser.viewport_width = 10;
        assert!(validate(&config).is_err());
    }
}
