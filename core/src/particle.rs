//! Particles, resampling and the pose estimate of a particle set.
//!
//! A particle is a weighted pose hypothesis. The filter keeps a fixed size population of them, re-weights them
//! against every color observation and then draws a fresh, equally weighted generation proportional to those
//! weights. The resampling schemes here all return the *indices* of the particles to copy so the caller decides
//! how to build the next generation.
use rand::Rng;
use serde::{Deserialize, Serialize};

use std::fmt::{self, Display};

use crate::{Pose, wrap_angle};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Particle {
    pub pose: Pose,
    pub weight: f64,
}
impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("x", &self.pose.x)
            .field("y", &self.pose.y)
            .field("heading", &self.pose.heading)
            .field("weight", &self.weight)
            .finish()
    }
}
impl Particle {
    pub fn new(pose: Pose, weight: f64) -> Particle {
        Particle { pose, weight }
    }
}

/// Scheme used to draw the next particle generation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ParticleResamplingStrategy {
    /// Low variance resampling with a single random offset (stochastic universal sampling)
    #[default]
    Systematic,
    /// One independent draw per stratum of width 1/N
    Stratified,
    /// N independent draws from the weight distribution
    Multinomial,
    /// Deterministic copies of floor(N w) followed by systematic sampling of the residual weights
    Residual,
}

impl ParticleResamplingStrategy {
    /// Draw `n` particle indices with probability proportional to `weights`.
    ///
    /// `weights` must be non-negative with a positive sum; they do not need to be normalized.
    pub fn resample<R: Rng + ?Sized>(&self, weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
        match self {
            ParticleResamplingStrategy::Systematic => systematic_resample(weights, n, rng),
            ParticleResamplingStrategy::Stratified => stratified_resample(weights, n, rng),
            ParticleResamplingStrategy::Multinomial => multinomial_resample(weights, n, rng),
            ParticleResamplingStrategy::Residual => residual_resample(weights, n, rng),
        }
    }
}

/// Normalized cumulative sum of the weights; the last entry is pinned to exactly 1.
fn cumulative_weights(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    let mut running = 0.0;
    let mut cumulative: Vec<f64> = weights
        .iter()
        .map(|w| {
            running += w / total;
            running
        })
        .collect();
    if let Some(last) = cumulative.last_mut() {
        *last = 1.0;
    }
    cumulative
}

/// Map sorted positions in [0, 1) onto particle indices by walking the cumulative weights once.
fn select_sorted(cumulative: &[f64], positions: impl Iterator<Item = f64>) -> Vec<usize> {
    let last = cumulative.len().saturating_sub(1);
    let mut i = 0;
    positions
        .map(|u| {
            while i < last && u >= cumulative[i] {
                i += 1;
            }
            i
        })
        .collect()
}

pub fn systematic_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    if weights.is_empty() || n == 0 {
        return Vec::new();
    }
    let cumulative = cumulative_weights(weights);
    let step = 1.0 / n as f64;
    let offset = rng.random::<f64>() * step;
    select_sorted(&cumulative, (0..n).map(|j| offset + j as f64 * step))
}

pub fn stratified_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    if weights.is_empty() || n == 0 {
        return Vec::new();
    }
    let cumulative = cumulative_weights(weights);
    let step = 1.0 / n as f64;
    let positions: Vec<f64> = (0..n)
        .map(|j| (j as f64 + rng.random::<f64>()) * step)
        .collect();
    select_sorted(&cumulative, positions.into_iter())
}

pub fn multinomial_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    if weights.is_empty() || n == 0 {
        return Vec::new();
    }
    let cumulative = cumulative_weights(weights);
    let last = cumulative.len() - 1;
    (0..n)
        .map(|_| {
            let u = rng.random::<f64>();
            cumulative.partition_point(|&c| c <= u).min(last)
        })
        .collect()
}

pub fn residual_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    if weights.is_empty() || n == 0 {
        return Vec::new();
    }
    let total: f64 = weights.iter().sum();
    let mut indices = Vec::with_capacity(n);
    let mut residual: Vec<f64> = Vec::with_capacity(weights.len());
    for (i, &w) in weights.iter().enumerate() {
        let expected = w / total * n as f64;
        let copies = expected.floor() as usize;
        indices.extend(std::iter::repeat_n(i, copies));
        residual.push(expected - copies as f64);
    }
    // floor() can only under-count, but rounding in `expected` may push the sum a hair over n
    indices.truncate(n);
    let remaining = n - indices.len();
    if remaining > 0 {
        if residual.iter().sum::<f64>() > 0.0 {
            indices.extend(systematic_resample(&residual, remaining, rng));
        } else {
            indices.extend(systematic_resample(weights, remaining, rng));
        }
    }
    indices
}

/// Normalize particle weights in place so they sum to one.
///
/// Returns the raw weight sum before normalization. If that sum is not a positive finite number the weights are
/// reset to uniform instead.
pub fn normalize_weights(particles: &mut [Particle]) -> f64 {
    let sum: f64 = particles.iter().map(|p| p.weight).sum();
    if sum > 0.0 && sum.is_finite() {
        for particle in particles.iter_mut() {
            particle.weight /= sum;
        }
    } else if !particles.is_empty() {
        let uniform = 1.0 / particles.len() as f64;
        for particle in particles.iter_mut() {
            particle.weight = uniform;
        }
    }
    sum
}

/// Effective sample size N_eff = 1 / sum(w_i^2) of a normalized particle set
pub fn effective_sample_size(particles: &[Particle]) -> f64 {
    let sum_of_squares: f64 = particles.iter().map(|p| p.weight * p.weight).sum();
    if sum_of_squares > 0.0 {
        1.0 / sum_of_squares
    } else {
        0.0
    }
}

/// Weighted mean pose of a particle set.
///
/// Position is the weighted arithmetic mean. Heading is the weighted circular mean, i.e. the direction of the
/// weighted sum of unit heading vectors, so hypotheses on either side of the +/- pi seam average correctly.
/// Returns `None` for an empty set or a set whose weights do not sum to a positive number.
pub fn weighted_mean_pose(particles: &[Particle]) -> Option<Pose> {
    let total: f64 = particles.iter().map(|p| p.weight).sum();
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }
    let (mut x, mut y, mut sin, mut cos) = (0.0, 0.0, 0.0, 0.0);
    for particle in particles {
        let w = particle.weight / total;
        x += w * particle.pose.x;
        y += w * particle.pose.y;
        sin += w * particle.pose.heading.sin();
        cos += w * particle.pose.heading.cos();
    }
    // atan2(0, 0) is 0, so perfectly opposed headings still give a finite answer
    Some(Pose::new(x, y, wrap_angle(sin.atan2(cos))))
}
