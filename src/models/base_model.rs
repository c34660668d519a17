use ndarray::{Array1, Array2};
use serde::{Serialize, Serializer};

/// Per-observation classification from an outlier model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnomalyLabel {
    #[default]
    Normal,
    Anomalous,
}

impl AnomalyLabel {
    /// Integer form used on the wire: 1 for normal, -1 for anomalous.
    pub fn as_i8(self) -> i8 {
        match self {
            AnomalyLabel::Normal => 1,
            AnomalyLabel::Anomalous => -1,
        }
    }

    pub fn is_anomalous(self) -> bool {
        self == AnomalyLabel::Anomalous
    }

    /// Label implied by a decision score: below the boundary means anomalous.
    pub fn from_decision(score: f64) -> Self {
        if score < 0.0 {
            AnomalyLabel::Anomalous
        } else {
            AnomalyLabel::Normal
        }
    }
}

impl Serialize for AnomalyLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.as_i8())
    }
}

/// A common Rust trait for batch outlier models.
///
/// Implementors only need `fit` and `decision_function`; the decision
/// boundary sits at zero, lower scores are more anomalous.
pub trait OutlierModel {
    /// Fit on a (rows x features) matrix.
    fn fit(&mut self, matrix: &Array2<f64>);

    /// Raw decision score per row. Negative = outlier.
    fn decision_function(&self, matrix: &Array2<f64>) -> Array1<f64>;

    /// Default: threshold the decision function at zero.
    fn predict(&self, matrix: &Array2<f64>) -> Vec<AnomalyLabel> {
        self.decision_function(matrix)
            .iter()
            .map(|&s| AnomalyLabel::from_decision(s))
            .collect()
    }

    /// Default: fit then predict on the same matrix.
    fn fit_predict(&mut self, matrix: &Array2<f64>) -> Vec<AnomalyLabel> {
        self.fit(matrix);
        self.predict(matrix)
    }
}
