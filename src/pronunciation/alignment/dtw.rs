use ndarray::Array2;

use crate::pronunciation::{ErrorKind, PronunciationError, Result};

/// Largest cost table `align` will allocate (two tables of this many cells).
pub const MAX_ALIGNMENT_CELLS: usize = 4_000_000;

/// Outcome of warping one contour onto another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DtwAlignment {
    /// Accumulated absolute difference along the optimal path.
    pub total_cost: f64,
    /// Number of matched pairs on the optimal path.
    pub path_length: usize,
}

impl DtwAlignment {
    /// Path-length-normalised distance.
    pub fn distance(&self) -> f64 {
        self.total_cost / self.path_length as f64
    }
}

/// Monotonic, continuous DTW with steps (1,0), (0,1) and (1,1).
///
/// Ties on cost resolve toward the shorter path, which keeps
/// `align(a, b)` and `align(b, a)` bitwise identical.
pub fn align(reference: &[f64], attempt: &[f64]) -> Result<DtwAlignment> {
    ensure_sequence(reference, "reference")?;
    ensure_sequence(attempt, "attempt")?;

    let rows = reference.len();
    let cols = attempt.len();
    if rows.saturating_mul(cols) > MAX_ALIGNMENT_CELLS {
        return Err(PronunciationError::new(
            ErrorKind::AudioTooLong,
            format!(
                "aligning {rows} by {cols} frames exceeds the {MAX_ALIGNMENT_CELLS} cell budget"
            ),
        ));
    }
    let mut cost = Array2::<f64>::from_elem((rows, cols), f64::INFINITY);
    let mut length = Array2::<usize>::zeros((rows, cols));

    for i in 0..rows {
        for j in 0..cols {
            let local = (reference[i] - attempt[j]).abs();
            let best = [
                (i > 0).then(|| (i - 1, j)),
                (j > 0).then(|| (i, j - 1)),
                (i > 0 && j > 0).then(|| (i - 1, j - 1)),
            ]
            .into_iter()
            .flatten()
            .map(|cell| (cost[cell], length[cell]))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let (previous_cost, previous_length) = best.unwrap_or((0.0, 0));
            cost[(i, j)] = previous_cost + local;
            length[(i, j)] = previous_length + 1;
        }
    }

    let total_cost = cost[(rows - 1, cols - 1)];
    if !total_cost.is_finite() {
        return Err(PronunciationError::new(
            ErrorKind::FeatureExtractionFailure,
            "failed to compute finite DTW alignment cost",
        ));
    }
    Ok(DtwAlignment {
        total_cost,
        path_length: length[(rows - 1, cols - 1)],
    })
}

fn ensure_sequence(values: &[f64], label: &str) -> Result<()> {
    if values.is_empty() {
        return Err(PronunciationError::new(
            ErrorKind::EmptySequence,
            format!("{label} contour is empty"),
        ));
    }
    if let Some(position) = values.iter().position(|v| !v.is_finite()) {
        return Err(PronunciationError::new(
            ErrorKind::FeatureExtractionFailure,
            format!("{label} contour has a non-finite value at index {position}"),
        ));
    }
    Ok(())
}
