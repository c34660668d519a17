use std::collections::VecDeque;

/// Rolling mean over the last `window_len` values of a univariate stream.
pub struct WindowStatistic {
    window_len: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl WindowStatistic {
    pub fn new(window_len: usize) -> Self {
        let window_len = window_len.max(1);
        WindowStatistic {
            window_len,
            window: VecDeque::with_capacity(window_len),
            sum: 0.0,
        }
    }

    /// Push a value, evicting the oldest one once the window is full.
    pub fn update(&mut self, x: f64) {
        if self.window.len() == self.window_len {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        self.window.push_back(x);
        self.sum += x;
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.window_len
    }

    pub fn get_mean(&self) -> Option<f64> {
        if self.window.is_empty() {
            None
        } else {
            Some(self.sum / self.window.len() as f64)
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile_sorted(&sorted(values), 50.0)
}

/// `q`-th percentile (0..=100) with linear interpolation between order
/// statistics. Returns 0.0 for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    percentile_sorted(&sorted(values), q).unwrap_or(0.0)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 100.0) / 100.0;
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn percentile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(percentile(&v, 0.0), 1.0);
        assert_relative_eq!(percentile(&v, 100.0), 4.0);
        assert_relative_eq!(percentile(&v, 50.0), 2.5);
        // position 0.05 * 3 = 0.15 between 1.0 and 2.0
        assert_relative_eq!(percentile(&v, 5.0), 1.15, epsilon = 1e-12);
        assert_eq!(percentile(&[], 5.0), 0.0);
    }

    #[test]
    fn median_of_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn window_statistic_evicts_oldest() {
        let mut ws = WindowStatistic::new(3);
        for x in [1.0, 2.0, 3.0, 10.0] {
            ws.update(x);
        }
        assert!(ws.is_full());
        assert_relative_eq!(ws.get_mean().unwrap_or_default(), 5.0);
    }
}
