//! Color sensor model
//!
//! A binary match model with a single true-positive probability `P`: a particle whose predicted color matches the
//! observed color gets weight `P`, anything else gets `1 - P`. Off-carpet particles (no predicted color) are treated
//! as a mismatch. Because `0 < P < 1` every particle has a strictly positive weight and the weight sum of a non
//! empty particle set can never be zero.
use crate::ColorId;
use crate::error::{CarpetError, Result};

/// Default probability that the color sensor reports the true color of the tile under it
pub const DEFAULT_HIT_PROBABILITY: f64 = 0.95;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorModel {
    hit_probability: f64,
}

impl Default for SensorModel {
    fn default() -> Self {
        SensorModel {
            hit_probability: DEFAULT_HIT_PROBABILITY,
        }
    }
}

impl SensorModel {
    /// Create a sensor model with a true-positive probability in the open interval (0, 1).
    pub fn new(hit_probability: f64) -> Result<Self> {
        if !(hit_probability > 0.0 && hit_probability < 1.0) {
            return Err(CarpetError::InvalidConfig(format!(
                "hit probability must lie strictly between 0 and 1, got {hit_probability}"
            )));
        }
        Ok(SensorModel { hit_probability })
    }
    pub fn hit_probability(&self) -> f64 {
        self.hit_probability
    }
    /// Weight given to particles whose predicted color does not match the observation
    pub fn miss_weight(&self) -> f64 {
        1.0 - self.hit_probability
    }
    /// Likelihood of observing `observed` when the map predicts `predicted` (`None` when off the carpet).
    pub fn weight(&self, predicted: Option<ColorId>, observed: ColorId) -> f64 {
        match predicted {
            Some(color) if color == observed => self.hit_probability,
            _ => self.miss_weight(),
        }
    }
}
