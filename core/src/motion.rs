//! Odometry motion model
//!
//! Propagates a pose by a body frame odometry increment and adds independent zero-mean Gaussian process noise to
//! the position and heading. The process noise models the uncertainty of the motion model itself and keeps the
//! particle set from collapsing onto a handful of identical hypotheses after resampling. It is applied on top of
//! whatever noise is already present in the odometry measurement.
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{CarpetError, Result};
use crate::{OdomMeasurement, Pose};

#[derive(Clone, Debug)]
pub struct MotionModel {
    position_noise_std: f64,
    heading_noise_std: f64,
    position_noise: Normal<f64>,
    heading_noise: Normal<f64>,
}

impl MotionModel {
    /// Create a new motion model
    ///
    /// # Arguments
    ///
    /// * `position_noise_std` - Standard deviation of the noise added to x and y per update (meters)
    /// * `heading_noise_std` - Standard deviation of the noise added to the heading per update (radians)
    pub fn new(position_noise_std: f64, heading_noise_std: f64) -> Result<Self> {
        let position_noise = Normal::new(0.0, position_noise_std).map_err(|e| {
            CarpetError::InvalidConfig(format!(
                "position noise std {position_noise_std} is invalid: {e}"
            ))
        })?;
        let heading_noise = Normal::new(0.0, heading_noise_std).map_err(|e| {
            CarpetError::InvalidConfig(format!(
                "heading noise std {heading_noise_std} is invalid: {e}"
            ))
        })?;
        Ok(MotionModel {
            position_noise_std,
            heading_noise_std,
            position_noise,
            heading_noise,
        })
    }
    pub fn position_noise_std(&self) -> f64 {
        self.position_noise_std
    }
    pub fn heading_noise_std(&self) -> f64 {
        self.heading_noise_std
    }
    /// Propagate a pose by an odometry increment and add process noise.
    ///
    /// The increment is rotated into the world frame using the pose's current heading (see [`Pose::compose`]).
    /// Noise is sampled independently for x, y and heading; a zero standard deviation disables the respective
    /// noise term without consuming random numbers.
    pub fn propagate<R: Rng + ?Sized>(
        &self,
        pose: &Pose,
        odometry: &OdomMeasurement,
        rng: &mut R,
    ) -> Pose {
        let moved = pose.compose(odometry);
        let (noise_x, noise_y) = if self.position_noise_std > 0.0 {
            (
                self.position_noise.sample(rng),
                self.position_noise.sample(rng),
            )
        } else {
            (0.0, 0.0)
        };
        let noise_heading = if self.heading_noise_std > 0.0 {
            self.heading_noise.sample(rng)
        } else {
            0.0
        };
        Pose::new(
            moved.x + noise_x,
            moved.y + noise_y,
            moved.heading + noise_heading,
        )
    }
}
