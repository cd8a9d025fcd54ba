//! Causal technical indicators.
//!
//! Every function returns a vector aligned with its input: element `i` is
//! computed from `data[..=i]` only and is `None` while the indicator is
//! warming up.

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let mut sum: f64 = data[..period].iter().sum();
    result[period - 1] = Some(sum / period as f64);
    for i in period..data.len() {
        sum += data[i] - data[i - period];
        result[i] = Some(sum / period as f64);
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values.
pub fn ema(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(prev);

    for i in period..data.len() {
        prev = (data[i] - prev) * multiplier + prev;
        result[i] = Some(prev);
    }
    result
}

/// EMA over a partially defined series; warm-up starts at the first `Some`.
fn ema_of_defined(data: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    let start = match data.iter().position(|v| v.is_some()) {
        Some(s) => s,
        None => return result,
    };
    let values: Vec<f64> = data[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
    for (offset, value) in ema(&values, period).into_iter().enumerate() {
        result[start + offset] = value;
    }
    result
}

/// Relative Strength Index (Wilder smoothing)
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    result[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<Option<f64>>,
    pub signal_line: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

pub fn macd(data: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    let n = data.len();
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || slow_period < fast_period {
        return MacdResult {
            macd_line: vec![None; n],
            signal_line: vec![None; n],
            histogram: vec![None; n],
        };
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal_line = ema_of_defined(&macd_line, signal_period);

    let histogram = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger %B: position of the price inside the bands (0 = lower, 1 = upper).
pub fn bollinger_percent_b(data: &[f64], period: usize, std_dev: f64) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let middle = sma(data, period);
    for i in period - 1..data.len() {
        let mean = match middle[i] {
            Some(m) => m,
            None => continue,
        };
        let slice = &data[i + 1 - period..=i];
        let variance: f64 = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let band = std_dev * variance.sqrt();
        result[i] = if band > 0.0 {
            Some((data[i] - (mean - band)) / (2.0 * band))
        } else {
            Some(0.5)
        };
    }
    result
}

/// Return over the last `lookback` periods: `data[i] / data[i - lookback] - 1`.
pub fn momentum(data: &[f64], lookback: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if lookback == 0 {
        return result;
    }
    for i in lookback..data.len() {
        let base = data[i - lookback];
        if base > 0.0 {
            result[i] = Some(data[i] / base - 1.0);
        }
    }
    result
}

/// Sample standard deviation of one-period simple returns over `period` returns.
pub fn rolling_volatility(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period < 2 || data.len() < period + 1 {
        return result;
    }

    let returns: Vec<f64> = data
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();

    for i in period..data.len() {
        // returns[j] is the return ending at data[j + 1]
        let window = &returns[i - period..i];
        result[i] = research_core::stats::std_dev(window);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    #[test]
    fn test_sma_aligned() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);
        assert_eq!(result.len(), 5);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_abs_diff_eq!(result[2].unwrap(), 2.0);
        assert_abs_diff_eq!(result[4].unwrap(), 4.0);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let data = vec![2.0, 4.0, 6.0, 8.0];
        let result = ema(&data, 3);
        assert_eq!(result[1], None);
        assert_abs_diff_eq!(result[2].unwrap(), 4.0);
        // (8 - 4) * 0.5 + 4
        assert_abs_diff_eq!(result[3].unwrap(), 6.0);
    }

    #[test]
    fn test_indicators_are_causal() {
        let prices = sample_prices();
        let full = rsi(&prices, 14);
        let mut altered = prices.clone();
        let last = altered.len() - 1;
        altered[last] *= 2.0;
        let changed = rsi(&altered, 14);
        // Only the final element may differ.
        assert_eq!(full[..last], changed[..last]);
        assert_ne!(full[last], changed[last]);
    }

    #[test]
    fn test_rsi_range() {
        let result = rsi(&sample_prices(), 14);
        assert!(result[13].is_none());
        for v in result.iter().flatten() {
            assert!((0.0..=100.0).contains(v));
        }
    }

    #[test]
    fn test_rsi_all_gains() {
        let data: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        let result = rsi(&data, 14);
        assert_abs_diff_eq!(result[19].unwrap(), 100.0);
    }

    #[test]
    fn test_macd_warmup() {
        let data: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let result = macd(&data, 12, 26, 9);
        assert!(result.macd_line[24].is_none());
        assert!(result.macd_line[25].is_some());
        assert!(result.signal_line[32].is_none());
        assert!(result.signal_line[33].is_some());
        let m = result.macd_line[40].unwrap();
        let s = result.signal_line[40].unwrap();
        assert_abs_diff_eq!(result.histogram[40].unwrap(), m - s, epsilon = 1e-12);
    }

    #[test]
    fn test_percent_b_flat_series() {
        let data = vec![10.0; 25];
        let result = bollinger_percent_b(&data, 20, 2.0);
        assert_abs_diff_eq!(result[24].unwrap(), 0.5);
    }

    #[test]
    fn test_momentum_and_volatility() {
        let data = vec![100.0, 110.0, 121.0];
        let mom = momentum(&data, 1);
        assert_eq!(mom[0], None);
        assert_abs_diff_eq!(mom[2].unwrap(), 0.1, epsilon = 1e-12);

        let vol = rolling_volatility(&data, 2);
        // two identical 10% returns
        assert_abs_diff_eq!(vol[2].unwrap(), 0.0, epsilon = 1e-12);
    }
}
