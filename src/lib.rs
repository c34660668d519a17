//! Stock anomaly pipeline.
//!
//! Price and volume windows are scored with an isolation forest fitted per
//! window; the latest row's verdict is combined with indicators and a short
//! insight into an [`AnalysisRecord`] and forwarded to a backend.

pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod utils;

#[cfg(feature = "python")]
mod python;

pub use config::AppConfig;
pub use data::{Bar, FeatureWindow, MarketDataSource, Observation};
pub use error::{PipelineError, ScorerError};
pub use models::base_model::{AnomalyLabel, OutlierModel};
pub use models::iforest::IsolationForest;
pub use models::scorer::{latest_anomaly, AnomalyResult, AnomalyScorer, ScoredObservation, ScorerConfig};
pub use pipeline::{AnalysisRecord, CycleReport, Pipeline, PipelineSettings};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A Python module implemented in Rust.
#[cfg(feature = "python")]
#[pymodule]
fn stock_sentinel(_py: Python, m: &PyModule) -> PyResult<()> {
    // Scorer:
    m.add_class::<python::PyAnomalyScorer>()?;
    Ok(())
}
