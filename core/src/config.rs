//! Particle filter configuration.
//!
//! The configuration can be built in code, or read from and written to JSON, YAML or TOML files; the format is
//! chosen from the file extension. Missing fields fall back to their defaults so a configuration file only needs
//! to list what it changes:
//!
//! ```toml
//! num_particles = 1000
//! hit_probability = 0.9
//! resampling_strategy = "stratified"
//! ```
use serde::{Deserialize, Serialize};

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{CarpetError, Result};
use crate::particle::ParticleResamplingStrategy;
use crate::sensor::DEFAULT_HIT_PROBABILITY;

/// Default particle population size
pub const DEFAULT_NUM_PARTICLES: usize = 500;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Number of particles, fixed for the lifetime of a filter
    pub num_particles: usize,
    /// Probability that the color sensor reports the true color of the tile under the robot
    pub hit_probability: f64,
    /// Standard deviation of the process noise added to x and y on every update (meters)
    pub position_noise_std_m: f64,
    /// Standard deviation of the process noise added to the heading on every update (radians)
    pub heading_noise_std_rad: f64,
    /// Scheme used to draw each new particle generation
    pub resampling_strategy: ParticleResamplingStrategy,
    /// Record every update's inputs so the run can be written out and replayed
    pub log_inputs: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            num_particles: DEFAULT_NUM_PARTICLES,
            hit_probability: DEFAULT_HIT_PROBABILITY,
            position_noise_std_m: 0.1,
            heading_noise_std_rad: 0.1,
            resampling_strategy: ParticleResamplingStrategy::Systematic,
            log_inputs: false,
        }
    }
}

impl FilterConfig {
    /// Check that the configuration describes a usable filter.
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(CarpetError::InvalidConfig(
                "number of particles must be positive".to_string(),
            ));
        }
        if !(self.hit_probability > 0.0 && self.hit_probability < 1.0) {
            return Err(CarpetError::InvalidConfig(format!(
                "hit probability must lie strictly between 0 and 1, got {}",
                self.hit_probability
            )));
        }
        for (name, value) in [
            ("position noise std", self.position_noise_std_m),
            ("heading noise std", self.heading_noise_std_rad),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CarpetError::InvalidConfig(format!(
                    "{name} must be a non-negative finite number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        Ok(toml::from_str(&s)?)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(CarpetError::UnsupportedFormat(p.display().to_string())),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(CarpetError::UnsupportedFormat(p.display().to_string())),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}
