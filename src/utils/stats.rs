/// `part / total * 100`, defined as 0 when `total` is not positive.
pub fn percentage(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

/// `part / total`, defined as 0 when `total` is zero.
pub fn ratio(part: usize, total: usize) -> f64 {
    if total > 0 {
        part as f64 / total as f64
    } else {
        0.0
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn format1(value: f64) -> String {
    format!("{value:.1}")
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Spread between the most and least loaded share. A lone share is measured
/// against an implicit zero.
pub fn imbalance<'a>(shares: impl IntoIterator<Item = &'a f64>) -> f64 {
    let values: Vec<f64> = shares.into_iter().copied().collect();
    match values.len() {
        0 => 0.0,
        1 => values[0].abs(),
        _ => {
            let max = values.iter().cloned().fold(f64::MIN, f64::max);
            let min = values.iter().cloned().fold(f64::MAX, f64::min);
            max - min
        }
    }
}
