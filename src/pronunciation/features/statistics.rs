//! Summary statistics over feature contours.

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

pub(crate) fn range(values: &[f64]) -> Option<f64> {
    let (min, max) = values.iter().fold(None, |bounds, &v| match bounds {
        None => Some((v, v)),
        Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
    })?;
    Some(max - min)
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Centre on the mean and divide by `std + 1`, so flat contours stay near zero.
pub(crate) fn standardize(values: &[f64]) -> Vec<f64> {
    let (Some(mean), Some(std)) = (mean(values), std_dev(values)) else {
        return Vec::new();
    };
    values.iter().map(|v| (v - mean) / (std + 1.0)).collect()
}
