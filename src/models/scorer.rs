//! Window-level anomaly scoring.
//!
//! [`AnomalyScorer::score`] fits a fresh outlier model on the window it is
//! asked to score and labels every row against that window's own decision
//! boundary. Nothing is carried between calls, so scores from different
//! windows are not comparable.

use crate::data::{FeatureWindow, CLOSE, VOLUME};
use crate::error::{Result, ScorerError};
use crate::models::base_model::{AnomalyLabel, OutlierModel};
use crate::models::iforest::IsolationForest;
use crate::utils::fill::feature_matrix;

/// Seed used for every fit unless a config overrides it.
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_CONTAMINATION: f64 = 0.05;
pub const DEFAULT_MIN_WINDOW_SIZE: usize = 10;
pub const DEFAULT_N_ESTIMATORS: usize = 100;
pub const DEFAULT_MAX_SAMPLES: usize = 256;

/// Explicit scorer configuration. Never read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    /// Expected fraction of anomalous rows, in (0, 0.5].
    pub contamination: f64,
    /// Below this many rows no model is fitted and every row is normal.
    pub min_window_size: usize,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_samples: usize,
    /// Feature columns, in matrix order.
    pub features: Vec<String>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        ScorerConfig {
            contamination: DEFAULT_CONTAMINATION,
            min_window_size: DEFAULT_MIN_WINDOW_SIZE,
            seed: DEFAULT_SEED,
            n_estimators: DEFAULT_N_ESTIMATORS,
            max_samples: DEFAULT_MAX_SAMPLES,
            features: vec![CLOSE.to_string(), VOLUME.to_string()],
        }
    }
}

impl ScorerConfig {
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_min_window_size(mut self, min_window_size: usize) -> Self {
        self.min_window_size = min_window_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_features<S: Into<String>>(mut self, features: impl IntoIterator<Item = S>) -> Self {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(invalid("contamination", format!("must be in (0, 0.5], got {}", self.contamination)));
        }
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "must be at least 1".to_string()));
        }
        if self.max_samples == 0 {
            return Err(invalid("max_samples", "must be at least 1".to_string()));
        }
        if self.features.is_empty() {
            return Err(invalid("features", "at least one feature column is required".to_string()));
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: String) -> ScorerError {
    ScorerError::InvalidParameter {
        name: name.to_string(),
        reason,
    }
}

/// Label and decision score of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoredObservation {
    pub label: AnomalyLabel,
    /// Lower is more anomalous; negative means past the fitted boundary.
    pub score: f64,
}

/// Per-row results, same length and order as the scored window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnomalyResult {
    entries: Vec<ScoredObservation>,
}

impl AnomalyResult {
    pub fn new(entries: Vec<ScoredObservation>) -> Self {
        AnomalyResult { entries }
    }

    fn all_normal(len: usize) -> Self {
        AnomalyResult {
            entries: vec![ScoredObservation::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ScoredObservation] {
        &self.entries
    }

    pub fn labels(&self) -> Vec<AnomalyLabel> {
        self.entries.iter().map(|e| e.label).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.score).collect()
    }

    pub fn anomaly_count(&self) -> usize {
        self.entries.iter().filter(|e| e.label.is_anomalous()).count()
    }

    /// Get indices of anomalies
    pub fn anomaly_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.label.is_anomalous().then_some(i))
            .collect()
    }

    /// The most recent row's result, or `(Normal, 0.0)` when empty.
    pub fn latest(&self) -> ScoredObservation {
        self.entries.last().copied().unwrap_or_default()
    }
}

/// Last `(label, score)` pair of `result`, `(Normal, 0.0)` if it is empty.
pub fn latest_anomaly(result: &AnomalyResult) -> (AnomalyLabel, f64) {
    let latest = result.latest();
    (latest.label, latest.score)
}

/// Stateless window scorer.
#[derive(Debug, Clone)]
pub struct AnomalyScorer {
    config: ScorerConfig,
}

impl AnomalyScorer {
    pub fn new(config: ScorerConfig) -> Result<Self> {
        config.validate()?;
        Ok(AnomalyScorer { config })
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score `window` with a freshly fitted isolation forest.
    pub fn score(&self, window: &FeatureWindow) -> Result<AnomalyResult> {
        let model = IsolationForest::new(self.config.n_estimators, self.config.contamination)
            .with_seed(self.config.seed)
            .with_max_samples(self.config.max_samples);
        self.score_with(window, model)
    }

    /// Score `window` with any outlier model. The model is consumed: it is
    /// fitted on this window only.
    pub fn score_with<M: OutlierModel>(&self, window: &FeatureWindow, mut model: M) -> Result<AnomalyResult> {
        // Missing fields are rejected even when the window is too short to fit
        let matrix = feature_matrix(window, &self.config.features)?;

        if window.len() < self.config.min_window_size {
            return Ok(AnomalyResult::all_normal(window.len()));
        }

        let labels = model.fit_predict(&matrix);
        let scores = model.decision_function(&matrix);

        let entries = labels
            .into_iter()
            .zip(scores.iter())
            .map(|(label, &score)| ScoredObservation { label, score })
            .collect();
        Ok(AnomalyResult::new(entries))
    }
}

/// One-shot form of [`AnomalyScorer::score`] with default seed and trees.
pub fn score(window: &FeatureWindow, contamination: f64, min_window_size: usize) -> Result<AnomalyResult> {
    let config = ScorerConfig::default()
        .with_contamination(contamination)
        .with_min_window_size(min_window_size);
    AnomalyScorer::new(config)?.score(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Observation;
    use ndarray::{Array1, Array2};

    fn flat_window(n: usize) -> FeatureWindow {
        let close: Vec<Option<f64>> = (0..n).map(|i| Some(100.0 + (i % 3) as f64 * 0.1)).collect();
        let volume: Vec<Option<f64>> = (0..n).map(|i| Some(1000.0 + (i % 4) as f64 * 10.0)).collect();
        FeatureWindow::from_columns(&close, &volume)
    }

    #[test]
    fn short_window_is_all_normal() {
        let window = flat_window(9);
        let result = score(&window, 0.05, 10).unwrap();
        assert_eq!(result.len(), 9);
        assert!(result.entries().iter().all(|e| e.label == AnomalyLabel::Normal && e.score == 0.0));
    }

    #[test]
    fn short_window_still_checks_fields() {
        let window = FeatureWindow::new(vec![Observation::new().with(CLOSE, 1.0)]);
        assert!(matches!(
            score(&window, 0.05, 10),
            Err(ScorerError::InvalidInput { row: 0, .. })
        ));
    }

    #[test]
    fn empty_window_gives_empty_result() {
        let result = score(&FeatureWindow::default(), 0.05, 10).unwrap();
        assert!(result.is_empty());
        assert_eq!(latest_anomaly(&result), (AnomalyLabel::Normal, 0.0));
    }

    #[test]
    fn contamination_out_of_range_is_rejected() {
        for c in [0.0, -0.1, 0.51, f64::NAN] {
            let err = AnomalyScorer::new(ScorerConfig::default().with_contamination(c)).unwrap_err();
            assert!(matches!(err, ScorerError::InvalidParameter { ref name, .. } if name == "contamination"));
        }
        assert!(AnomalyScorer::new(ScorerConfig::default().with_contamination(0.5)).is_ok());
    }

    #[test]
    fn empty_feature_list_is_rejected() {
        let config = ScorerConfig::default().with_features(Vec::<String>::new());
        assert!(AnomalyScorer::new(config).is_err());
    }

    #[test]
    fn latest_returns_last_entry() {
        let result = AnomalyResult::new(vec![
            ScoredObservation { label: AnomalyLabel::Normal, score: 0.1 },
            ScoredObservation { label: AnomalyLabel::Anomalous, score: -0.2 },
        ]);
        assert_eq!(latest_anomaly(&result), (AnomalyLabel::Anomalous, -0.2));
        assert_eq!(result.anomaly_indices(), vec![1]);
    }

    // Model that marks every row whose first feature exceeds a fixed level.
    struct Threshold(f64);

    impl OutlierModel for Threshold {
        fn fit(&mut self, _matrix: &Array2<f64>) {}

        fn decision_function(&self, matrix: &Array2<f64>) -> Array1<f64> {
            matrix.column(0).mapv(|v| self.0 - v)
        }
    }

    #[test]
    fn any_outlier_model_can_be_plugged_in() {
        let scorer = AnomalyScorer::new(ScorerConfig::default()).unwrap();
        let mut window = flat_window(12);
        window.push(Observation::new().with(CLOSE, 500.0).with(VOLUME, 1000.0));
        let result = scorer.score_with(&window, Threshold(200.0)).unwrap();
        assert_eq!(result.anomaly_indices(), vec![12]);
        assert_eq!(result.latest().score, -300.0);
    }
}
