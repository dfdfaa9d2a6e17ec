/// Default moving-average window, in frames.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Centered moving average over a zero-padded sequence.
///
/// Output has the same length as the input. Positions outside the sequence
/// count as 0 and every sum is divided by `window`, so the first and last
/// `window / 2` values are pulled toward 0. Sequences shorter than `window`
/// (and windows of 0 or 1) are returned unchanged.
pub fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    let len = values.len();
    if window <= 1 || len < window {
        return values.to_vec();
    }

    let half = window / 2;
    (0..len)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + window - half).min(len);
            values[start..end].iter().sum::<f64>() / window as f64
        })
        .collect()
}
