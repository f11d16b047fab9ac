//! Extract product listings from a web page into a CSV file.
//!
//! Reads the API key from `GROQ_API_KEY` (a `.env` file is honoured).
//!
//! # Examples
//!
//! ```sh
//! # Default page, default model
//! shelfscan
//!
//! # Another page, more attempts, CSV into ./out
//! shelfscan https://www.ikea.com/nl/en/cat/chairs-fu002/ \
//!   --retries 4 --output-dir out
//!
//! # Treat an empty product list as a failed attempt
//! shelfscan --require-products -vv
//! ```

use chrono::Local;
use clap::Parser;
use shelfscan::agent::{
    AgentConfig, ExtractionAgent, ExtractionError, LoggingHandler, NonEmptyValidator,
    ResultValidator, TypeCheckValidator,
};
use shelfscan::api::RetryConfig;
use shelfscan::fetch::{DEFAULT_SCRATCH_FILE, FetchConfig, HttpFetcher};
use shelfscan::output::{UsageReport, persist};
use shelfscan::tools::{FETCH_TOOL_NAME, FetchHtmlText, ToolSet};
use shelfscan::{BackendConfig, ChatClient};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "https://www.ikea.com/nl/en/cat/best-sellers/";

/// Extract product listings from a web page into a CSV file.
///
/// Reads the API key from the GROQ_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "shelfscan", version)]
struct Cli {
    /// Page to extract products from
    #[arg(default_value = DEFAULT_URL)]
    url: String,

    // ── Backend ────────────────────────────────────────────────
    /// Model identifier (overrides SHELFSCAN_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Chat-completions endpoint (overrides SHELFSCAN_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Maximum tokens per response
    #[arg(long, default_value_t = shelfscan::agent::config::DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Sampling temperature
    #[arg(long, default_value_t = shelfscan::agent::config::DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Backoff retries for transient backend errors within one request
    #[arg(long, default_value_t = 2)]
    api_retries: u32,

    // ── Retry budgets ──────────────────────────────────────────
    /// Agent-level retries for missing or invalid answers
    #[arg(long, default_value_t = shelfscan::agent::config::DEFAULT_RETRIES)]
    retries: u32,

    /// Retries for a fetch call that fails hard
    #[arg(long, default_value_t = shelfscan::tools::DEFAULT_TOOL_RETRIES)]
    tool_retries: u32,

    /// Backend round trips allowed per attempt
    #[arg(long, default_value_t = shelfscan::agent::config::DEFAULT_MAX_TOOL_ROUNDS)]
    max_tool_rounds: u32,

    /// Reject answers with no products
    #[arg(long)]
    require_products: bool,

    // ── Fetching ───────────────────────────────────────────────
    /// Page fetch timeout in seconds
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,

    /// Where the reduced page text is written after each fetch
    #[arg(long, default_value = DEFAULT_SCRATCH_FILE)]
    scratch_file: PathBuf,

    // ── Output ─────────────────────────────────────────────────
    /// Directory for the CSV file
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// More logging (-v debug, -vv trace). RUST_LOG is used when absent.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> Result<(), String> {
    let mut backend_config = BackendConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        backend_config = backend_config.with_api_url(url);
    }
    if let Some(model) = &cli.model {
        backend_config = backend_config.with_model(model);
    }
    let model = backend_config.model.clone();
    let client = ChatClient::new(backend_config)?;

    let fetch_timeout = Duration::from_secs(cli.timeout_secs);
    let fetcher = HttpFetcher::new(
        FetchConfig::default()
            .with_timeout(fetch_timeout)
            .with_scratch_path(Some(cli.scratch_file.clone())),
    )
    .map_err(|e| e.to_string())?;

    // The dispatch timeout only backs up the client's own timeout.
    let tools = ToolSet::new()
        .with_arg_validation(true)
        .with_default_timeout(Some(fetch_timeout + Duration::from_secs(5)))
        .with_retries_for(FETCH_TOOL_NAME, cli.tool_retries)
        .with(FetchHtmlText::new(Arc::new(fetcher)));

    let config = AgentConfig::new(model)
        .with_max_tokens(cli.max_tokens)
        .with_temperature(cli.temperature)
        .with_retries(cli.retries)
        .with_max_tool_rounds(cli.max_tool_rounds)
        .with_api_retry(RetryConfig::with_retries(cli.api_retries));

    let validator: &dyn ResultValidator = if cli.require_products {
        &NonEmptyValidator
    } else {
        &TypeCheckValidator
    };

    let agent = ExtractionAgent::new(&client, &tools, config)
        .with_validator(validator)
        .with_event_handler(&LoggingHandler);

    let outcome = agent.run(&cli.url).await;
    match &outcome {
        Ok(extraction) => println!("{}", UsageReport(&extraction.usage)),
        Err(err @ ExtractionError::Backend(_)) => return Err(err.to_string()),
        Err(err) => {
            if let ExtractionError::Exhausted {
                trace_id, history, ..
            } = err
            {
                for record in history {
                    warn!(
                        "[{trace_id}] attempt {}: {} ({})",
                        record.attempt, record.message, record.kind
                    );
                }
            }
            warn!("{err}");
            if let Some(usage) = err.usage() {
                info!("{}", usage.summary());
            }
        }
    }

    if let Some(path) = persist(&outcome, &cli.output_dir, Local::now()).await
        && let Ok(extraction) = &outcome
    {
        println!(
            "Saved {} product(s) to {}",
            extraction.results.dataset.len(),
            path.display()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
