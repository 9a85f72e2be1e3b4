pub mod dtw;

use crate::pronunciation::Result;

pub use dtw::DtwAlignment;

/// Aligns one-dimensional feature contours that may differ in length.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceAligner;

impl SequenceAligner {
    pub fn new() -> Self {
        Self
    }

    /// Normalised DTW distance between two contours; 0 for identical input.
    pub fn distance(&self, reference: &[f64], attempt: &[f64]) -> Result<f64> {
        Ok(self.align(reference, attempt)?.distance())
    }

    pub fn align(&self, reference: &[f64], attempt: &[f64]) -> Result<DtwAlignment> {
        dtw::align(reference, attempt)
    }
}
