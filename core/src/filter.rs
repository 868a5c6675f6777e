//! Carpet particle filter
//!
//! [`CarpetParticleFilter`] owns the particle population and runs the full Monte Carlo localization cycle on
//! every call to [`CarpetParticleFilter::update`]:
//!
//! 1. propagate every particle through the [`MotionModel`] by the reported odometry increment
//! 2. look up the color the [`CarpetMap`] predicts under every particle
//! 3. weight every particle with the [`SensorModel`] against the observed color
//! 4. normalize the weights and resample a fresh, equally weighted generation
//! 5. return the weighted mean pose of the new generation
//!
//! The filter starts out uninitialized. The first update draws the initial population uniformly over the whole
//! carpet with uniformly distributed headings, weights and resamples it against the first color reading, and does
//! *not* apply the first odometry increment. Resampling is unconditional on every update.
//!
//! ```rust
//! use std::sync::Arc;
//! use carpet::{CarpetMap, CarpetParticleFilter, FilterConfig, OdomMeasurement};
//!
//! let map = Arc::new(CarpetMap::new(vec![vec![0, 1], vec![1, 0]], 0.5).unwrap());
//! let mut pf = CarpetParticleFilter::with_seed(map, FilterConfig::default(), 42).unwrap();
//! let estimate = pf.update(&OdomMeasurement::default(), 1, None);
//! assert_eq!(pf.particles().unwrap().len(), 500);
//! assert_eq!(pf.current_pose().unwrap(), estimate);
//! ```
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::f64::consts::PI;
use std::path::Path;
use std::sync::Arc;

use crate::config::FilterConfig;
use crate::error::{CarpetError, Result};
use crate::input_log::{self, InputLogEntry};
use crate::map::CarpetMap;
use crate::motion::MotionModel;
use crate::particle::{Particle, effective_sample_size, normalize_weights, weighted_mean_pose};
use crate::sensor::SensorModel;
use crate::{ColorId, OdomMeasurement, Pose};

pub struct CarpetParticleFilter<R: Rng = StdRng> {
    map: Arc<CarpetMap>,
    config: FilterConfig,
    motion_model: MotionModel,
    sensor_model: SensorModel,
    /// `None` until the first update
    particles: Option<Vec<Particle>>,
    most_recent_color: Option<ColorId>,
    input_log: Option<Vec<InputLogEntry>>,
    last_raw_weight_sum: Option<f64>,
    num_updates: usize,
    rng: R,
}

impl CarpetParticleFilter<StdRng> {
    /// Create a filter driven by a [`StdRng`] seeded with `seed`.
    ///
    /// Two filters built with the same map, configuration and seed produce identical particles and estimates when
    /// fed identical inputs.
    pub fn with_seed(map: Arc<CarpetMap>, config: FilterConfig, seed: u64) -> Result<Self> {
        Self::new(map, config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> CarpetParticleFilter<R> {
    /// Create a new, uninitialized filter
    ///
    /// # Arguments
    ///
    /// * `map` - Shared handle to the carpet the robot drives on
    /// * `config` - Filter configuration, validated here
    /// * `rng` - Random source used for initialization, process noise and resampling
    pub fn new(map: Arc<CarpetMap>, config: FilterConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let motion_model =
            MotionModel::new(config.position_noise_std_m, config.heading_noise_std_rad)?;
        let sensor_model = SensorModel::new(config.hit_probability)?;
        let input_log = config.log_inputs.then(Vec::new);
        Ok(CarpetParticleFilter {
            map,
            config,
            motion_model,
            sensor_model,
            particles: None,
            most_recent_color: None,
            input_log,
            last_raw_weight_sum: None,
            num_updates: 0,
            rng,
        })
    }

    /// Run one filter cycle and return the new pose estimate.
    ///
    /// # Arguments
    ///
    /// * `odometry` - Body frame motion since the previous update; ignored on the first (initializing) update
    /// * `observed_color` - Color id reported by the color sensor
    /// * `ground_truth` - True pose if known; only recorded in the input log, never used for estimation
    pub fn update(
        &mut self,
        odometry: &OdomMeasurement,
        observed_color: ColorId,
        ground_truth: Option<Pose>,
    ) -> Pose {
        let particles = match self.particles.take() {
            None => {
                debug!(
                    "Initializing {} particles over a {:.2} m x {:.2} m carpet",
                    self.config.num_particles,
                    self.map.width(),
                    self.map.height()
                );
                self.initial_particles()
            }
            Some(mut particles) => {
                for particle in particles.iter_mut() {
                    particle.pose =
                        self.motion_model
                            .propagate(&particle.pose, odometry, &mut self.rng);
                }
                particles
            }
        };
        let particles = self.weight_and_resample(particles, observed_color);
        let estimate = weighted_mean_pose(&particles).unwrap_or_default();
        self.particles = Some(particles);
        self.most_recent_color = Some(observed_color);
        self.num_updates += 1;
        if let Some(log) = self.input_log.as_mut() {
            log.push(InputLogEntry::new(*odometry, observed_color, ground_truth));
        }
        estimate
    }

    /// Feed a recorded sequence of inputs through the filter and return the estimate after every update.
    pub fn replay(&mut self, entries: &[InputLogEntry]) -> Vec<Pose> {
        if entries.is_empty() {
            warn!("Replaying an empty input log; the filter is left unchanged");
        }
        entries
            .iter()
            .map(|entry| self.update(&entry.odometry, entry.color, entry.ground_truth))
            .collect()
    }

    fn initial_particles(&mut self) -> Vec<Particle> {
        let n = self.config.num_particles;
        let (width, height) = (self.map.width(), self.map.height());
        let weight = 1.0 / n as f64;
        (0..n)
            .map(|_| {
                let x = self.rng.random_range(0.0..width);
                let y = self.rng.random_range(0.0..height);
                let heading = self.rng.random_range(-PI..PI);
                Particle::new(Pose::new(x, y, heading), weight)
            })
            .collect()
    }

    fn weight_and_resample(
        &mut self,
        mut particles: Vec<Particle>,
        observed_color: ColorId,
    ) -> Vec<Particle> {
        let coords: Vec<(f64, f64)> = particles.iter().map(|p| (p.pose.x, p.pose.y)).collect();
        let predicted = self.map.lookup(&coords);
        for (particle, color) in particles.iter_mut().zip(predicted) {
            particle.weight = self.sensor_model.weight(color, observed_color);
        }
        let raw_sum = normalize_weights(&mut particles);
        if !(raw_sum > 0.0 && raw_sum.is_finite()) {
            warn!("Degenerate particle weight sum {raw_sum}; falling back to uniform weights");
        }
        self.last_raw_weight_sum = Some(raw_sum);
        let n = self.config.num_particles;
        debug!(
            "Update {}: observed color {}, raw weight sum {:.4}, effective sample size {:.1}/{}",
            self.num_updates + 1,
            observed_color,
            raw_sum,
            effective_sample_size(&particles),
            n
        );
        let weights: Vec<f64> = particles.iter().map(|p| p.weight).collect();
        let indices = self
            .config
            .resampling_strategy
            .resample(&weights, n, &mut self.rng);
        let weight = 1.0 / n as f64;
        indices
            .into_iter()
            .map(|i| Particle::new(particles[i].pose, weight))
            .collect()
    }

    /// Weighted mean pose of the current particle set with a circular mean for the heading.
    pub fn current_pose(&self) -> Result<Pose> {
        let particles = self.particles()?;
        weighted_mean_pose(particles).ok_or(CarpetError::NotInitialized)
    }
    /// Read-only view of the current particle set
    pub fn particles(&self) -> Result<&[Particle]> {
        self.particles.as_deref().ok_or(CarpetError::NotInitialized)
    }
    /// The color passed to the most recent update, if any
    pub fn most_recent_color(&self) -> Option<ColorId> {
        self.most_recent_color
    }
    pub fn is_initialized(&self) -> bool {
        self.particles.is_some()
    }
    pub fn num_particles(&self) -> usize {
        self.config.num_particles
    }
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
    pub fn map(&self) -> &Arc<CarpetMap> {
        &self.map
    }
    /// Sum of the particle weights of the most recent update, before normalization
    pub fn last_raw_weight_sum(&self) -> Option<f64> {
        self.last_raw_weight_sum
    }
    pub fn num_updates(&self) -> usize {
        self.num_updates
    }
    /// Inputs recorded so far, or `None` if input logging is disabled
    pub fn input_log(&self) -> Option<&[InputLogEntry]> {
        self.input_log.as_deref()
    }
    /// Write the recorded inputs to a file readable by [`load_input_log`](crate::input_log::load_input_log).
    pub fn write_input_log<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match self.input_log.as_deref() {
            Some(entries) => input_log::write_input_log(entries, path),
            None => Err(CarpetError::LoggingDisabled),
        }
    }
}
