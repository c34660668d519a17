//! Technical indicators computed as full columns aligned with the input.

use crate::data::{FeatureWindow, CLOSE};
use crate::utils::fill::forward_fill;
use crate::utils::stats::WindowStatistic;

pub const SMA_PERIOD: usize = 20;
pub const RSI_PERIOD: usize = 14;

pub const SMA_COLUMN: &str = "sma_20";
pub const RSI_COLUMN: &str = "rsi";

/// Simple moving average. `None` until `period` values have been seen.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut window = WindowStatistic::new(period);
    values
        .iter()
        .map(|&v| {
            window.update(v);
            if window.is_full() {
                window.get_mean()
            } else {
                None
            }
        })
        .collect()
}

/// Relative strength index with Wilder's smoothing.
///
/// The first value appears at index `period` (it needs `period` price
/// changes). A window with no losses reads 100.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let split = |change: f64| if change > 0.0 { (change, 0.0) } else { (0.0, -change) };

    let (mut avg_gain, mut avg_loss) = changes
        .iter()
        .take(period)
        .fold((0.0, 0.0), |(g, l), &c| {
            let (gain, loss) = split(c);
            (g + gain, l + loss)
        });
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    let p = period as f64;
    for (i, &change) in changes.iter().enumerate().skip(period) {
        let (gain, loss) = split(change);
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Apply `f` to the forward-filled part of a column. Rows before the first
/// known value stay `None`.
fn on_known_suffix(column: &[Option<f64>], f: impl Fn(&[f64]) -> Vec<Option<f64>>) -> Vec<Option<f64>> {
    let filled = forward_fill(column);
    let start = filled.iter().position(Option::is_some).unwrap_or(filled.len());
    let known: Vec<f64> = filled[start..].iter().flatten().copied().collect();

    let mut out = vec![None; start];
    out.extend(f(&known));
    out
}

/// Add the `sma_20` and `rsi` columns computed from `close`.
pub fn add_indicators(window: &mut FeatureWindow) {
    let closes = window.column(CLOSE);
    let sma_col = on_known_suffix(&closes, |v| sma(v, SMA_PERIOD));
    let rsi_col = on_known_suffix(&closes, |v| rsi(v, RSI_PERIOD));
    window.insert_column(SMA_COLUMN, &sma_col);
    window.insert_column(RSI_COLUMN, &rsi_col);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sma_warms_up() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 2.0);
        assert_relative_eq!(out[3].unwrap(), 3.0);
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&prices, 14);
        assert!(out[..14].iter().all(Option::is_none));
        assert_eq!(out[14], Some(100.0));
        assert_eq!(out[19], Some(100.0));
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let prices: Vec<f64> = (0..16).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&prices, 14);
        assert_relative_eq!(out[15].unwrap(), 0.0);
    }

    #[test]
    fn rsi_balanced_moves_near_50() {
        let prices: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let v = rsi(&prices, 14)[29].unwrap();
        assert!(v > 40.0 && v < 60.0, "rsi = {}", v);
    }

    #[test]
    fn rsi_too_short_is_all_none() {
        assert!(rsi(&[1.0; 14], 14).iter().all(Option::is_none));
    }

    #[test]
    fn indicators_skip_leading_gaps() {
        let mut close: Vec<Option<f64>> = vec![None, None];
        close.extend((0..25).map(|i| Some(10.0 + i as f64)));
        let volume = vec![Some(1.0); close.len()];
        let mut window = FeatureWindow::from_columns(&close, &volume);
        add_indicators(&mut window);

        let sma_col = window.column(SMA_COLUMN);
        assert_eq!(sma_col.len(), 27);
        assert!(sma_col[..21].iter().all(Option::is_none));
        // first full window covers 10..=29
        assert_relative_eq!(sma_col[21].unwrap(), 19.5);
        assert_eq!(window.column(RSI_COLUMN)[16], Some(100.0));
    }
}
