//! # stock-sentinel
//!
//! Command-line entry point: one-off analysis, a single batch, or the
//! polling stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stock_sentinel::config::{parse_symbols, AppConfig};
use stock_sentinel::data::YahooFinanceSource;
use stock_sentinel::models::scorer::{DEFAULT_CONTAMINATION, DEFAULT_MIN_WINDOW_SIZE};
use stock_sentinel::pipeline::stream::run_stream;
use stock_sentinel::pipeline::{HttpSink, InsightGenerator, LanguageModel, OpenAiClient};
use stock_sentinel::{AnomalyScorer, Pipeline, PipelineSettings, ScorerConfig};

#[derive(Parser)]
#[command(name = "stock-sentinel")]
#[command(about = "Stock price/volume anomaly pipeline", long_about = None)]
struct Cli {
    /// Expected fraction of anomalous observations, in (0, 0.5]
    #[arg(long, global = true, default_value_t = DEFAULT_CONTAMINATION)]
    contamination: f64,

    /// Windows shorter than this are reported as normal without fitting
    #[arg(long, global = true, default_value_t = DEFAULT_MIN_WINDOW_SIZE)]
    min_window: usize,

    /// Backend base URL (overrides BACKEND_URL)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse one symbol and print the record as JSON
    Analyze {
        symbol: String,
    },

    /// Process symbols once and deliver the records
    Once {
        /// Symbols to process (default: STREAM_SYMBOLS)
        symbols: Vec<String>,

        /// Print only, do not post to the backend
        #[arg(long)]
        no_deliver: bool,
    },

    /// Poll STREAM_SYMBOLS every STREAM_INTERVAL seconds
    Stream {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<usize>,

        /// Poll interval in seconds (overrides STREAM_INTERVAL)
        #[arg(long)]
        interval: Option<u64>,
    },
}

fn build_pipeline(cli: &Cli, config: &AppConfig, settings: PipelineSettings) -> Result<Pipeline> {
    let scorer_config = ScorerConfig::default()
        .with_contamination(cli.contamination)
        .with_min_window_size(cli.min_window);
    let scorer = AnomalyScorer::new(scorer_config).context("invalid scorer parameters")?;

    let model: Option<Arc<dyn LanguageModel>> = match config.openai_api_key.as_deref() {
        Some(key) => Some(Arc::new(OpenAiClient::new(key)?.with_model(&config.openai_model))),
        None => None,
    };
    let insights = InsightGenerator::new(model);
    if !insights.has_model() {
        info!("OPENAI_API_KEY not set; using local trend insight");
    }

    let sink = HttpSink::new(config.backend_endpoint())?.with_auth_token(config.backend_auth_token.clone());
    info!(endpoint = sink.endpoint(), "backend configured");

    Ok(Pipeline::new(
        Arc::new(YahooFinanceSource::new()?),
        scorer,
        insights,
        settings,
    )
    .with_sink(Arc::new(sink)))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_sentinel=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(url) = &cli.backend_url {
        config.backend_url = url.trim_end_matches('/').to_string();
    }

    let base_settings = PipelineSettings {
        period: config.data_period.clone(),
        interval: config.data_interval.clone(),
        ..PipelineSettings::default()
    };

    match &cli.command {
        Commands::Analyze { symbol } => {
            let settings = PipelineSettings {
                period: "1d".to_string(),
                interval: "1m".to_string(),
                ..base_settings
            };
            let pipeline = build_pipeline(&cli, &config, settings)?;
            let output = match pipeline.process_symbol(&symbol.to_uppercase()).await {
                Ok(record) => serde_json::to_value(&record)?,
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            };
            println!("{}", serde_json::to_string(&output)?);
        }

        Commands::Once { symbols, no_deliver } => {
            let symbols = if symbols.is_empty() {
                config.symbols.clone()
            } else {
                parse_symbols(&symbols.join(","))
            };
            let pipeline = build_pipeline(&cli, &config, base_settings)?;
            let report = pipeline.run_once(&symbols).await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !no_deliver {
                let sent = pipeline.deliver(&report.records).await;
                info!(sent, total = report.records.len(), "delivery finished");
            }
            if !report.failures.is_empty() {
                warn!(failed = report.failures.len(), "some symbols could not be analysed");
            }
        }

        Commands::Stream { cycles, interval } => {
            let every = Duration::from_secs(interval.unwrap_or(config.stream_interval.as_secs()).max(1));
            let pipeline = build_pipeline(&cli, &config, base_settings)?;
            let symbols = config.symbols.clone();

            tokio::select! {
                n = run_stream(pipeline, symbols, every, *cycles) => {
                    info!(cycles = n, "stream stopped");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Stopped by user");
                }
            }
        }
    }

    Ok(())
}
