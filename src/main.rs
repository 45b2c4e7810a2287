//! Gatecrawl main entry point
//!
//! Command-line wrapper around the crawling core: rule-table checks,
//! authenticated session setup, and Markdown crawls.

use clap::{Parser, Subcommand};
use gatecrawl::auth::{AuthSetupOrchestrator, SetupPolicy, SetupRequest};
use gatecrawl::browser::BrowserPool;
use gatecrawl::config::{load_config_with_hash, ServiceConfig};
use gatecrawl::crawl::{CrawlExecutor, CrawlRequest, MarkdownFormat};
use gatecrawl::markdown::MarkdownOptions;
use gatecrawl::rules::{load_rules, RuleEngine};
use gatecrawl::session::{open_store, SessionStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Gatecrawl: authenticated crawling and Markdown extraction
#[derive(Parser, Debug)]
#[command(name = "gatecrawl")]
#[command(version = "1.0.0")]
#[command(about = "Crawl pages behind logins and paywalls into Markdown", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and rule table and print a summary
    Rules,

    /// Establish (or refresh) a site's authenticated session
    Setup {
        /// Site identity the session is stored under
        #[arg(long)]
        site: String,

        /// Login page to open
        #[arg(long = "login-url")]
        login_url: String,

        /// Page used to validate the captured session
        #[arg(long = "test-url")]
        test_url: String,

        /// Hard upper bound for the attempt (seconds)
        #[arg(long = "timeout-secs")]
        timeout_secs: Option<u64>,

        /// Use the fixed-wait policy with this duration (seconds)
        #[arg(long = "simple-wait-secs")]
        simple_wait_secs: Option<u64>,
    },

    /// Crawl a URL into Markdown
    Crawl {
        /// The URL to crawl
        url: String,

        /// Run under this site's stored session
        #[arg(long)]
        site: Option<String>,

        /// Which Markdown variants to return: raw, fit, or both
        #[arg(long, default_value = "both")]
        format: String,

        /// Disable JavaScript execution
        #[arg(long = "no-js")]
        no_js: bool,

        /// Bypass the browser cache
        #[arg(long = "bypass-cache")]
        bypass_cache: bool,

        /// Replace links with their text
        #[arg(long = "ignore-links")]
        ignore_links: bool,

        /// Strip Markdown punctuation escapes from output
        #[arg(long = "no-escape")]
        no_escape: bool,

        /// Wrap prose lines at this column
        #[arg(long = "body-width")]
        body_width: Option<usize>,

        /// Restrict conversion to this subtree
        #[arg(long = "css-selector")]
        css_selector: Option<String>,
    },

    /// List stored site profiles, or delete one
    Profiles {
        /// Delete this site's profile instead of listing
        #[arg(long)]
        delete: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Rules => handle_rules(&config, &config_hash)?,
        Command::Setup {
            site,
            login_url,
            test_url,
            timeout_secs,
            simple_wait_secs,
        } => {
            handle_setup(
                config,
                site,
                login_url,
                test_url,
                timeout_secs,
                simple_wait_secs,
            )
            .await?
        }
        Command::Crawl {
            url,
            site,
            format,
            no_js,
            bypass_cache,
            ignore_links,
            no_escape,
            body_width,
            css_selector,
        } => {
            let request = CrawlRequest {
                url,
                site_name: site,
                format: format.parse::<MarkdownFormat>()?,
                js_enabled: !no_js,
                bypass_cache,
                markdown: MarkdownOptions {
                    ignore_links,
                    escape_html: !no_escape,
                    body_width,
                    css_selector,
                },
            };
            handle_crawl(config, request).await?
        }
        Command::Profiles { delete } => handle_profiles(&config, delete)?,
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gatecrawl=info,warn"),
            1 => EnvFilter::new("gatecrawl=debug,info"),
            2 => EnvFilter::new("gatecrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Wired components shared by the setup and crawl commands
struct Service {
    orchestrator: AuthSetupOrchestrator,
    executor: CrawlExecutor,
}

fn build_service(config: &ServiceConfig) -> Result<Service, Box<dyn std::error::Error>> {
    let rules = Arc::new(load_engine(config)?);
    let store: Arc<dyn SessionStore> =
        Arc::new(open_store(Path::new(&config.session.database_path))?);
    let pool = Arc::new(BrowserPool::new(
        config.browser.clone(),
        config.pool.max_contexts,
    ));
    let acquire_timeout = Duration::from_millis(config.pool.acquire_timeout);

    let orchestrator = AuthSetupOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&rules),
        Arc::clone(&pool),
        config.setup.clone(),
        config.crawl.clone(),
        acquire_timeout,
    );

    let executor = CrawlExecutor::new(
        rules,
        Arc::clone(&store),
        pool,
        config.browser.clone(),
        config.crawl.clone(),
        acquire_timeout,
    );

    Ok(Service {
        orchestrator,
        executor,
    })
}

fn load_engine(config: &ServiceConfig) -> Result<RuleEngine, Box<dyn std::error::Error>> {
    let engine = load_rules(Path::new(&config.rules.table_path))?;
    tracing::info!(
        "Rule table loaded: {} domains (hash: {})",
        engine.len(),
        engine.table_hash()
    );
    Ok(engine)
}

/// Handles the `rules` command: validates and summarizes the rule table
fn handle_rules(
    config: &ServiceConfig,
    config_hash: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Gatecrawl Rule Check ===\n");

    println!("Config hash: {}", config_hash);
    println!("Rule table:  {}", config.rules.table_path);

    let engine = load_engine(config)?;

    println!("\nPool:");
    println!("  Max contexts:    {}", config.pool.max_contexts);
    println!("  Acquire timeout: {}ms", config.pool.acquire_timeout);

    println!("\nCrawl:");
    println!("  Page timeout: {}ms", config.crawl.page_timeout);
    println!("  Settle delay: {}ms", config.crawl.settle_delay);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Rule table resolves {} domains (hash: {})",
        engine.len(),
        engine.table_hash()
    );

    Ok(())
}

/// Handles the `setup` command
async fn handle_setup(
    config: ServiceConfig,
    site: String,
    login_url: String,
    test_url: String,
    timeout_secs: Option<u64>,
    simple_wait_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(&config)?;

    let profile = match simple_wait_secs {
        Some(wait) => {
            service
                .orchestrator
                .setup_simple_wait(&site, &login_url, &test_url, Duration::from_secs(wait))
                .await?
        }
        None => {
            let setup_timeout =
                Duration::from_secs(timeout_secs.unwrap_or(config.setup.default_timeout));
            service
                .orchestrator
                .setup(SetupRequest {
                    site_name: site,
                    login_url,
                    test_url,
                    setup_timeout,
                    policy: SetupPolicy::WaitForLogin,
                })
                .await?
        }
    };

    println!("✓ Session for '{}' is {}", profile.site_name, profile.status);
    if let Some(validated) = profile.last_validated_at {
        println!("  Last validated: {}", validated.to_rfc3339());
    }

    Ok(())
}

/// Handles the `crawl` command
async fn handle_crawl(
    config: ServiceConfig,
    request: CrawlRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(&config)?;

    let result = service.executor.crawl(request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.success {
        Ok(())
    } else {
        Err(result
            .error_message
            .unwrap_or_else(|| "crawl failed".to_string())
            .into())
    }
}

/// Handles the `profiles` command
fn handle_profiles(
    config: &ServiceConfig,
    delete: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(Path::new(&config.session.database_path))?;

    if let Some(site) = delete {
        if store.delete(&site)? {
            println!("✓ Deleted profile '{}'", site);
        } else {
            println!("No profile '{}' to delete", site);
        }
        return Ok(());
    }

    let profiles = store.list()?;
    if profiles.is_empty() {
        println!("No stored profiles");
        return Ok(());
    }

    println!("{} profile(s):", profiles.len());
    for profile in profiles {
        println!(
            "  {} [{}] created {} validated {}",
            profile.site_name,
            profile.status,
            profile.created_at.to_rfc3339(),
            profile
                .last_validated_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
    }

    Ok(())
}
