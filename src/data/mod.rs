//! Market data types and the data-source seam.
//!
//! A [`FeatureWindow`] is the table handed to the scorer: rows of named
//! numeric fields where any value may be missing. [`Bar`] is what a
//! [`MarketDataSource`] returns.

pub mod yahoo;

pub use yahoo::YahooFinanceSource;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";

/// Single OHLCV bar. Providers report gaps as missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, close: f64, volume: f64) -> Self {
        Bar {
            timestamp,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close: Some(close),
            volume: Some(volume),
        }
    }
}

/// One row of a time series.
///
/// A field that is present but has no value (or a non-finite one) is a
/// missing value. A field that is not present at all is a different thing:
/// the scorer rejects rows that lack a required field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    values: BTreeMap<String, Option<f64>>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Observation::set`].
    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    pub fn with_missing(mut self, field: impl Into<String>) -> Self {
        self.set(field, None);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        self.values.insert(field.into(), value);
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Value of `field`, or `None` if the field is absent or missing.
    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    pub fn from_bar(bar: &Bar) -> Self {
        let mut obs = Observation::new();
        obs.set(CLOSE, bar.close);
        obs.set(VOLUME, bar.volume);
        obs
    }
}

/// Ordered sequence of observations, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureWindow {
    rows: Vec<Observation>,
}

impl FeatureWindow {
    pub fn new(rows: Vec<Observation>) -> Self {
        FeatureWindow { rows }
    }

    pub fn from_bars(bars: &[Bar]) -> Self {
        FeatureWindow {
            rows: bars.iter().map(Observation::from_bar).collect(),
        }
    }

    /// Build a window from parallel `close` and `volume` columns.
    pub fn from_columns(close: &[Option<f64>], volume: &[Option<f64>]) -> Self {
        let rows = close
            .iter()
            .zip(volume.iter())
            .map(|(c, v)| {
                let mut obs = Observation::new();
                obs.set(CLOSE, *c);
                obs.set(VOLUME, *v);
                obs
            })
            .collect();
        FeatureWindow { rows }
    }

    pub fn push(&mut self, obs: Observation) {
        self.rows.push(obs);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn last(&self) -> Option<&Observation> {
        self.rows.last()
    }

    /// Raw column values in row order; absent and missing both read as `None`.
    pub fn column(&self, field: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.value(field)).collect()
    }

    /// Attach a derived column. Extra values beyond the window length are ignored.
    pub fn insert_column(&mut self, field: &str, values: &[Option<f64>]) {
        for (row, value) in self.rows.iter_mut().zip(values.iter()) {
            row.set(field, *value);
        }
    }
}

/// Source of OHLCV history for a symbol.
///
/// An empty series means "no data" and is not an error at this level.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch(&self, symbol: &str, period: &str, interval: &str) -> Result<Vec<Bar>, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_absent_fields_are_distinct() {
        let obs = Observation::new().with(CLOSE, 10.0).with_missing(VOLUME);
        assert!(obs.has_field(VOLUME));
        assert_eq!(obs.value(VOLUME), None);
        assert!(!obs.has_field("rsi"));
        assert_eq!(obs.value(CLOSE), Some(10.0));
    }

    #[test]
    fn non_finite_values_are_missing() {
        let obs = Observation::new().with(CLOSE, f64::NAN).with(VOLUME, f64::INFINITY);
        assert!(obs.has_field(CLOSE));
        assert_eq!(obs.value(CLOSE), None);
        assert_eq!(obs.value(VOLUME), None);
    }

    #[test]
    fn window_from_bars_keeps_order() {
        let t = Utc::now();
        let bars = vec![Bar::new(t, 1.0, 100.0), Bar::new(t, 2.0, 200.0)];
        let window = FeatureWindow::from_bars(&bars);
        assert_eq!(window.len(), 2);
        assert_eq!(window.column(CLOSE), vec![Some(1.0), Some(2.0)]);
        assert_eq!(window.column(VOLUME), vec![Some(100.0), Some(200.0)]);
    }

    #[test]
    fn insert_column_attaches_values() {
        let mut window = FeatureWindow::from_columns(&[Some(1.0), Some(2.0)], &[Some(5.0), None]);
        window.insert_column("sma_20", &[None, Some(1.5)]);
        assert_eq!(window.column("sma_20"), vec![None, Some(1.5)]);
        assert!(window.rows()[0].has_field("sma_20"));
        assert_eq!(window.column(VOLUME), vec![Some(5.0), None]);
    }
}
