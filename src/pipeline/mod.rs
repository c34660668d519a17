//! Per-symbol analysis: fetch -> indicators -> score -> insight -> deliver.
//!
//! Symbols are independent. A failure for one symbol is recorded and never
//! stops the others.

pub mod delivery;
pub mod insight;
pub mod record;
pub mod stream;

pub use delivery::{DeliverySink, HttpSink};
pub use insight::{Insight, InsightGenerator, LanguageModel, OpenAiClient};
pub use record::{AnalysisRecord, SymbolFailure};

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::data::{FeatureWindow, MarketDataSource};
use crate::error::PipelineError;
use crate::models::scorer::AnomalyScorer;
use crate::utils::indicators::add_indicators;

/// Fetch parameters and fan-out limit.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub period: String,
    pub interval: String,
    /// Symbols processed at the same time by [`Pipeline::run_once`].
    pub max_concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            period: "1d".to_string(),
            interval: "5m".to_string(),
            max_concurrency: num_cpus::get().max(1),
        }
    }
}

/// Outcome of processing a batch of symbols once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub records: Vec<AnalysisRecord>,
    pub failures: Vec<SymbolFailure>,
}

/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn MarketDataSource>,
    scorer: Arc<AnomalyScorer>,
    insights: Arc<InsightGenerator>,
    sink: Option<Arc<dyn DeliverySink>>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        scorer: AnomalyScorer,
        insights: InsightGenerator,
        settings: PipelineSettings,
    ) -> Self {
        Pipeline {
            source,
            scorer: Arc::new(scorer),
            insights: Arc::new(insights),
            sink: None,
            settings,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DeliverySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Analyse one symbol. An empty history is [`PipelineError::NoData`].
    pub async fn process_symbol(&self, symbol: &str) -> Result<AnalysisRecord, PipelineError> {
        debug!(symbol = %symbol, "processing");
        let bars = self
            .source
            .fetch(symbol, &self.settings.period, &self.settings.interval)
            .await?;
        if bars.is_empty() {
            return Err(PipelineError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let mut window = FeatureWindow::from_bars(&bars);
        add_indicators(&mut window);

        // Fitting is CPU-bound; keep it off the async workers
        let scorer = Arc::clone(&self.scorer);
        let scored = window.clone();
        let result = tokio::task::spawn_blocking(move || scorer.score(&scored))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;

        let insight = self.insights.generate(&window, symbol).await;
        if !insight.is_generated() {
            debug!(symbol = %symbol, "using fallback insight");
        }

        let record = AnalysisRecord::build(symbol, &window, &result, insight.into_text(), Utc::now());
        if record.is_anomalous() {
            info!(symbol = %symbol, score = record.anomaly_score, "anomaly on latest observation");
        }
        Ok(record)
    }

    /// Process every symbol once with bounded concurrency. Output keeps the
    /// input order.
    pub async fn run_once(&self, symbols: &[String]) -> CycleReport {
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (idx, symbol) in symbols.iter().enumerate() {
            let pipeline = self.clone();
            let symbol = symbol.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let outcome = pipeline.process_symbol(&symbol).await;
                (idx, symbol, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(symbols.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!("symbol task panicked: {}", e),
            }
        }
        outcomes.sort_by_key(|(idx, _, _)| *idx);

        let mut report = CycleReport::default();
        for (_, symbol, outcome) in outcomes {
            match outcome {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    warn!(symbol = %symbol, "skipping symbol: {}", e);
                    report.failures.push(SymbolFailure {
                        symbol,
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Send records to the configured sink. Returns how many were accepted.
    pub async fn deliver(&self, records: &[AnalysisRecord]) -> usize {
        let Some(sink) = &self.sink else {
            info!("No backend configured; skipping send.");
            return 0;
        };

        let mut delivered = 0;
        for record in records {
            match sink.deliver(record).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(symbol = %record.symbol, "{}", e),
            }
        }
        delivered
    }

    /// Process one symbol and deliver it; errors are logged, never returned.
    pub async fn process_and_deliver(&self, symbol: &str) {
        match self.process_symbol(symbol).await {
            Ok(record) => {
                self.deliver(std::slice::from_ref(&record)).await;
            }
            Err(e) => warn!(symbol = %symbol, "Stream error: {}", e),
        }
    }
}
