use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{FeatureWindow, CLOSE, VOLUME};
use crate::models::scorer::{latest_anomaly, AnomalyResult};
use crate::pipeline::insight::percent_change;
use crate::utils::fill::fill_missing;
use crate::utils::indicators::{RSI_COLUMN, SMA_COLUMN};

/// One analysed symbol, as delivered to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub symbol: String,
    pub current_price: f64,
    pub volume: i64,
    pub sma_20: Option<f64>,
    pub rsi: Option<f64>,
    pub change_percent: f64,
    /// 1 for normal, -1 for anomalous.
    pub anomaly: i8,
    pub anomaly_score: f64,
    pub insight: String,
    pub timestamp: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Summarise the latest row of an analysed window.
    pub fn build(
        symbol: &str,
        window: &FeatureWindow,
        result: &AnomalyResult,
        insight: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let closes = fill_missing(&window.column(CLOSE));
        let volumes = fill_missing(&window.column(VOLUME));
        let last = window.last();
        let (label, score) = latest_anomaly(result);

        AnalysisRecord {
            symbol: symbol.to_string(),
            current_price: closes.last().copied().unwrap_or(0.0),
            volume: volumes.last().copied().unwrap_or(0.0) as i64,
            sma_20: last.and_then(|r| r.value(SMA_COLUMN)),
            rsi: last.and_then(|r| r.value(RSI_COLUMN)),
            change_percent: percent_change(&closes),
            anomaly: label.as_i8(),
            anomaly_score: score,
            insight,
            timestamp,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.anomaly < 0
    }
}

/// A symbol that could not be analysed this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: String,
}
