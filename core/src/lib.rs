//! Carpet-based Monte Carlo localization
//!
//! This crate estimates the planar pose (x, y, heading) of a mobile robot driving over a floor that is tiled
//! with a known pattern of colored carpet cells. The robot has no external positioning. It only has two noisy
//! sensor streams:
//! - incremental odometry: the relative motion since the previous update, expressed in the robot's body frame
//! - a single downward facing color sensor that reports the discrete color of the tile currently under the robot
//!
//! A single color reading is a very coarse and ambiguous fingerprint (many cells share a color) but a sequence of
//! readings taken along a trajectory quickly becomes unique. A particle filter (Monte Carlo localization) is a
//! natural fit for this: the posterior over the pose is multi-modal for most of the run and only collapses to a
//! single mode after enough of the carpet has been traversed.
//!
//! ## Crate overview
//!
//! - [map]: The immutable [`CarpetMap`](map::CarpetMap) grid and its coordinate-to-color lookup.
//! - [colors]: The catalog of carpet colors, their integer ids and display colors.
//! - [motion]: The odometry motion model used to propagate particles.
//! - [sensor]: The binary color-match sensor model used to weight particles.
//! - [particle]: Particles, resampling strategies and the pose estimate derived from a particle set.
//! - [filter]: The [`CarpetParticleFilter`](filter::CarpetParticleFilter) orchestrating the full update cycle.
//! - [input_log]: Recording and replay of the inputs a filter has seen.
//! - [config]: Filter configuration and configuration file I/O.
//! - [sim]: Random carpets and synthetic trajectories for testing and demonstration.
//!
//! ## Coordinate conventions
//!
//! The world frame origin is the bottom-left corner of the bottom-left carpet cell. The x-axis points to the
//! right along the grid columns and the y-axis points up along the grid rows. Headings are measured
//! counter-clockwise from the x-axis in radians and are always wrapped into the half open interval $(-\pi, \pi]$.
//!
//! Odometry increments are expressed in the robot's body frame at the time of the previous update: `dx` is
//! forward, `dy` is to the left and `dheading` is the counter-clockwise change in heading. Given a pose
//! $(x, y, \theta)$ and an increment $(\delta_x, \delta_y, \delta_\theta)$ the propagated pose is:
//!
//! $$
//! \begin{bmatrix} x' \\\\ y' \end{bmatrix} = \begin{bmatrix} x \\\\ y \end{bmatrix} +
//! \begin{bmatrix} \cos\theta & -\sin\theta \\\\ \sin\theta & \cos\theta \end{bmatrix}
//! \begin{bmatrix} \delta_x \\\\ \delta_y \end{bmatrix}, \quad \theta' = \theta + \delta_\theta
//! $$
pub mod colors;
pub mod config;
pub mod error;
pub mod filter;
pub mod input_log;
pub mod map;
pub mod motion;
pub mod particle;
pub mod sensor;
pub mod sim;

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use std::f64::consts::{PI, TAU};
use std::fmt::{self, Display};

pub use crate::colors::CarpetColor;
pub use crate::config::FilterConfig;
pub use crate::error::{CarpetError, Result};
pub use crate::filter::CarpetParticleFilter;
pub use crate::input_log::{InputLogEntry, load_input_log, write_input_log};
pub use crate::map::CarpetMap;

/// Integer id of a carpet color.
///
/// Ids are dense in `[0, K)` for a carpet with `K` distinguishable colors. The mapping from human readable
/// names to ids lives in [colors]; the filter itself only ever deals with the integer ids.
pub type ColorId = u32;

/// Wrap an angle in radians into the half open interval $(-\pi, \pi]$.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = PI - (PI - angle).rem_euclid(TAU);
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Planar robot pose in the carpet (world) frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position along the x-axis in meters
    pub x: f64,
    /// Position along the y-axis in meters
    pub y: f64,
    /// Heading in radians, counter-clockwise from the x-axis, wrapped into $(-\pi, \pi]$
    pub heading: f64,
}
impl Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.3} m, {:.3} m, {:.3} rad)",
            self.x, self.y, self.heading
        )
    }
}
impl Pose {
    /// Create a new pose, wrapping the heading into $(-\pi, \pi]$.
    pub fn new(x: f64, y: f64, heading: f64) -> Pose {
        Pose {
            x,
            y,
            heading: wrap_angle(heading),
        }
    }
    /// Position component of the pose as a vector
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
    /// Apply a body frame motion increment to this pose (noise free).
    ///
    /// The increment is rotated into the world frame by the current heading, added to the position, and the
    /// heading increment is added and wrapped.
    pub fn compose(&self, odometry: &OdomMeasurement) -> Pose {
        let displacement = Rotation2::new(self.heading) * odometry.translation();
        Pose::new(
            self.x + displacement.x,
            self.y + displacement.y,
            self.heading + odometry.dheading,
        )
    }
    /// Euclidean distance between the positions of two poses in meters
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (self.position() - other.position()).norm()
    }
    /// Signed heading difference `self - other`, wrapped into $(-\pi, \pi]$
    pub fn heading_error(&self, other: &Pose) -> f64 {
        wrap_angle(self.heading - other.heading)
    }
}

/// Relative motion reported by the odometry since the previous update.
///
/// The increment is expressed in the robot's body frame at the time of the previous update. This is the output
/// of the instrument and may already contain measurement noise; the filter adds its own process noise on top of
/// it when propagating particles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OdomMeasurement {
    /// Forward displacement in meters
    pub dx: f64,
    /// Leftward displacement in meters
    pub dy: f64,
    /// Counter-clockwise heading change in radians
    pub dheading: f64,
}
impl OdomMeasurement {
    pub fn new(dx: f64, dy: f64, dheading: f64) -> OdomMeasurement {
        OdomMeasurement { dx, dy, dheading }
    }
    /// Translational part of the increment as a vector
    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.dx, self.dy)
    }
}
