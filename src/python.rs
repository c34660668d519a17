use numpy::{IntoPyArray, PyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::data::{FeatureWindow, Observation};
use crate::models::scorer::{AnomalyScorer, ScorerConfig, DEFAULT_CONTAMINATION, DEFAULT_MIN_WINDOW_SIZE, DEFAULT_SEED};

/// Python‐exposed wrapper around the window scorer.
///
/// Input is a 2D float64 array with one column per feature, in the order
/// given by `features`. NaN marks a missing value.
#[pyclass(name = "AnomalyScorer")]
pub struct PyAnomalyScorer {
    inner: AnomalyScorer,
}

fn to_py_err(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn matrix_to_window(xs: &PyReadonlyArray2<f64>, features: &[String]) -> PyResult<FeatureWindow> {
    let arr = xs.as_array();
    if arr.ncols() != features.len() {
        return Err(PyValueError::new_err(format!(
            "expected {} feature columns, got {}",
            features.len(),
            arr.ncols()
        )));
    }

    let rows = arr
        .rows()
        .into_iter()
        .map(|row| {
            let mut obs = Observation::new();
            for (field, &v) in features.iter().zip(row.iter()) {
                obs.set(field.as_str(), Some(v));
            }
            obs
        })
        .collect();
    Ok(FeatureWindow::new(rows))
}

#[pymethods]
impl PyAnomalyScorer {
    #[new]
    #[pyo3(signature = (contamination=DEFAULT_CONTAMINATION, min_window_size=DEFAULT_MIN_WINDOW_SIZE, random_state=DEFAULT_SEED, features=None))]
    fn new(
        contamination: f64,
        min_window_size: usize,
        random_state: u64,
        features: Option<Vec<String>>,
    ) -> PyResult<Self> {
        let mut config = ScorerConfig::default()
            .with_contamination(contamination)
            .with_min_window_size(min_window_size)
            .with_seed(random_state);
        if let Some(features) = features {
            config = config.with_features(features);
        }
        let inner = AnomalyScorer::new(config).map_err(to_py_err)?;
        Ok(PyAnomalyScorer { inner })
    }

    /// Returns `(labels, scores)`; labels are 1 (normal) or -1 (anomalous).
    fn score<'py>(
        &self,
        py: Python<'py>,
        xs: PyReadonlyArray2<f64>,
    ) -> PyResult<(&'py PyArray1<i8>, &'py PyArray1<f64>)> {
        let window = matrix_to_window(&xs, &self.inner.config().features)?;
        let result = py.allow_threads(|| self.inner.score(&window)).map_err(to_py_err)?;

        let labels: Vec<i8> = result.labels().into_iter().map(|l| l.as_i8()).collect();
        Ok((labels.into_pyarray(py), result.scores().into_pyarray(py)))
    }

    /// Label and score of the last row, `(1, 0.0)` for an empty matrix.
    fn latest_anomaly(&self, py: Python<'_>, xs: PyReadonlyArray2<f64>) -> PyResult<(i8, f64)> {
        let window = matrix_to_window(&xs, &self.inner.config().features)?;
        let result = py.allow_threads(|| self.inner.score(&window)).map_err(to_py_err)?;
        let latest = result.latest();
        Ok((latest.label.as_i8(), latest.score))
    }
}
