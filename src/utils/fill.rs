use ndarray::Array2;

use crate::data::FeatureWindow;
use crate::error::{Result, ScorerError};

/// Replace each gap with the most recent preceding value. Leading gaps stay missing.
pub fn forward_fill(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    column
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

/// Forward fill, then set whatever is still missing to zero.
pub fn fill_missing(column: &[Option<f64>]) -> Vec<f64> {
    forward_fill(column)
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect()
}

/// Gap-filled (rows x features) matrix of the requested columns.
///
/// Every row must carry every field in `features`; a row without one is
/// rejected with [`ScorerError::InvalidInput`].
pub fn feature_matrix(window: &FeatureWindow, features: &[String]) -> Result<Array2<f64>> {
    for (row, obs) in window.rows().iter().enumerate() {
        if let Some(field) = features.iter().find(|f| !obs.has_field(f)) {
            return Err(ScorerError::InvalidInput {
                row,
                field: field.clone(),
            });
        }
    }

    let mut matrix = Array2::zeros((window.len(), features.len()));
    for (j, field) in features.iter().enumerate() {
        let filled = fill_missing(&window.column(field));
        for (i, value) in filled.into_iter().enumerate() {
            matrix[[i, j]] = value;
        }
    }
    Ok(matrix)
}
