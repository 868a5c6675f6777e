//! Synthetic carpets, trajectories and result records.
//!
//! This module provides:
//! - [`generate_random_map`] and the fixed reference carpet [`make_map`]
//! - [`make_input_data`], which drives a simulated robot along a list of straight legs and turns and produces
//!   the (odometry, observed color, ground truth) inputs a real robot would have fed the filter
//! - [`EstimateRecord`] for writing and reading the per-update estimates of a run to and from CSV
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use std::f64::consts::{FRAC_PI_2, PI};
use std::path::Path;

use crate::error::{CarpetError, Result};
use crate::input_log::InputLogEntry;
use crate::map::CarpetMap;
use crate::{ColorId, OdomMeasurement, Pose};

/// Seed of the random grid behind [`make_map`]
pub const REFERENCE_MAP_SEED: u64 = 2718;

/// Generate a carpet whose cells are drawn uniformly from `n_colors` colors.
pub fn generate_random_map<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    cell_size: f64,
    n_colors: u32,
    rng: &mut R,
) -> Result<CarpetMap> {
    if n_colors == 0 {
        return Err(CarpetError::InvalidMap(
            "a carpet needs at least one color".to_string(),
        ));
    }
    let grid = (0..rows)
        .map(|_| (0..cols).map(|_| rng.random_range(0..n_colors)).collect())
        .collect();
    CarpetMap::new(grid, cell_size)
}

/// The reference test carpet: 10 x 10 cells of 0.5 m in four colors, always the same.
pub fn make_map() -> Result<CarpetMap> {
    let mut rng = StdRng::seed_from_u64(REFERENCE_MAP_SEED);
    generate_random_map(10, 10, 0.5, 4, &mut rng)
}

/// A straight segment of a simulated trajectory followed by a turn on the spot
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    /// Distance driven straight ahead in meters
    pub distance_m: f64,
    /// Counter-clockwise turn at the end of the leg in radians
    pub turn_rad: f64,
}

impl Leg {
    pub fn new(distance_m: f64, turn_rad: f64) -> Leg {
        Leg {
            distance_m,
            turn_rad,
        }
    }
}

/// Description of a simulated run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryConfig {
    pub start: Pose,
    pub legs: Vec<Leg>,
    /// Nominal distance between consecutive updates while driving straight
    pub step_length_m: f64,
    /// Standard deviation of the noise added to the reported dx and dy
    pub odom_position_noise_std_m: f64,
    /// Standard deviation of the noise added to the reported heading change
    pub odom_heading_noise_std_rad: f64,
    /// Probability that the color sensor reports a wrong color
    pub color_noise: f64,
}

impl TrajectoryConfig {
    /// Noise free loop over a carpet.
    ///
    /// The robot starts near the bottom-left corner facing along +x, drives a counter-clockwise spiral inwards,
    /// turns around, spirals back out clockwise and ends on its starting position facing along -x. The loop is
    /// scaled to the shorter side of the carpet so it stays on the carpet for any map.
    pub fn reference(map: &CarpetMap) -> TrajectoryConfig {
        let side = map.width().min(map.height());
        let legs = [
            (0.75, FRAC_PI_2),
            (0.75, FRAC_PI_2),
            (0.75, FRAC_PI_2),
            (0.5, FRAC_PI_2),
            (0.5, FRAC_PI_2),
            (0.25, FRAC_PI_2),
            (0.25, 0.0),
            (0.0, PI),
            (0.25, -FRAC_PI_2),
            (0.25, -FRAC_PI_2),
            (0.5, -FRAC_PI_2),
            (0.5, -FRAC_PI_2),
            (0.75, -FRAC_PI_2),
            (0.75, -FRAC_PI_2),
            (0.75, 0.0),
        ]
        .into_iter()
        .map(|(fraction, turn)| Leg::new(fraction * side, turn))
        .collect();
        TrajectoryConfig {
            start: Pose::new(side / 8.0, side / 8.0, 0.0),
            legs,
            step_length_m: 0.1,
            odom_position_noise_std_m: 0.0,
            odom_heading_noise_std_rad: 0.0,
            color_noise: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.step_length_m.is_finite() && self.step_length_m > 0.0) {
            return Err(CarpetError::InvalidConfig(format!(
                "step length must be positive, got {}",
                self.step_length_m
            )));
        }
        if !(0.0..=1.0).contains(&self.color_noise) {
            return Err(CarpetError::InvalidConfig(format!(
                "color noise must be a probability, got {}",
                self.color_noise
            )));
        }
        if self
            .legs
            .iter()
            .any(|leg| !(leg.distance_m.is_finite() && leg.distance_m >= 0.0) || !leg.turn_rad.is_finite())
        {
            return Err(CarpetError::InvalidConfig(
                "leg distances must be non-negative and turns finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sensor noise applied to the simulated readings
struct SensorNoise {
    position: Option<Normal<f64>>,
    heading: Option<Normal<f64>>,
    color_noise: f64,
    num_colors: u32,
}

impl SensorNoise {
    fn new(config: &TrajectoryConfig, map: &CarpetMap) -> Result<SensorNoise> {
        let normal = |std: f64, name: &str| -> Result<Option<Normal<f64>>> {
            if std == 0.0 {
                return Ok(None);
            }
            Normal::new(0.0, std).map(Some).map_err(|e| {
                CarpetError::InvalidConfig(format!("{name} noise std {std} is invalid: {e}"))
            })
        };
        Ok(SensorNoise {
            position: normal(config.odom_position_noise_std_m, "odometry position")?,
            heading: normal(config.odom_heading_noise_std_rad, "odometry heading")?,
            color_noise: config.color_noise,
            num_colors: map.num_colors() as u32,
        })
    }

    fn odometry<R: Rng + ?Sized>(&self, truth: OdomMeasurement, rng: &mut R) -> OdomMeasurement {
        let (dx, dy) = match &self.position {
            Some(noise) => (truth.dx + noise.sample(rng), truth.dy + noise.sample(rng)),
            None => (truth.dx, truth.dy),
        };
        let dheading = match &self.heading {
            Some(noise) => truth.dheading + noise.sample(rng),
            None => truth.dheading,
        };
        OdomMeasurement::new(dx, dy, dheading)
    }

    /// With probability `color_noise` replace the true color by a uniformly chosen different one.
    fn color<R: Rng + ?Sized>(&self, truth: ColorId, rng: &mut R) -> ColorId {
        if self.num_colors < 2 || self.color_noise == 0.0 || rng.random::<f64>() >= self.color_noise
        {
            return truth;
        }
        let other = rng.random_range(0..self.num_colors - 1);
        if other >= truth { other + 1 } else { other }
    }
}

/// Simulate a robot driving the given trajectory over a carpet.
///
/// The first entry carries zero odometry, the color under the start pose and the start pose itself; it is the
/// input of the filter's initializing update. Every straight leg is split into equal steps close to
/// `step_length_m`, each producing one entry. A non-zero turn produces one more entry with a pure rotation.
///
/// Fails with [`CarpetError::InvalidConfig`] if the trajectory leaves the carpet.
pub fn make_input_data<R: Rng + ?Sized>(
    map: &CarpetMap,
    config: &TrajectoryConfig,
    rng: &mut R,
) -> Result<Vec<InputLogEntry>> {
    config.validate()?;
    let noise = SensorNoise::new(config, map)?;

    let mut entries = Vec::new();
    let mut truth = config.start;
    let mut record = |truth: Pose, odometry: Option<OdomMeasurement>, rng: &mut R| -> Result<()> {
        let color = map.color_at(truth.x, truth.y).ok_or_else(|| {
            CarpetError::InvalidConfig(format!("trajectory leaves the carpet at {truth}"))
        })?;
        let odometry = match odometry {
            Some(odometry) => noise.odometry(odometry, &mut *rng),
            None => OdomMeasurement::default(),
        };
        let color = noise.color(color, &mut *rng);
        entries.push(InputLogEntry::new(odometry, color, Some(truth)));
        Ok(())
    };

    record(truth, None, &mut *rng)?;
    for leg in &config.legs {
        let steps = (leg.distance_m / config.step_length_m).round() as usize;
        if steps > 0 {
            let step = OdomMeasurement::new(leg.distance_m / steps as f64, 0.0, 0.0);
            for _ in 0..steps {
                truth = truth.compose(&step);
                record(truth, Some(step), &mut *rng)?;
            }
        }
        if leg.turn_rad != 0.0 {
            let turn = OdomMeasurement::new(0.0, 0.0, leg.turn_rad);
            truth = truth.compose(&turn);
            record(truth, Some(turn), &mut *rng)?;
        }
    }
    Ok(entries)
}

/// One row of a run's results: the estimate after an update and, when known, the true pose and the errors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimateRecord {
    pub step: usize,
    pub observed_color: ColorId,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub true_x: Option<f64>,
    pub true_y: Option<f64>,
    pub true_heading: Option<f64>,
    /// Euclidean distance between estimated and true position in meters
    pub position_error: Option<f64>,
    /// Wrapped heading difference, estimate minus truth, in radians
    pub heading_error: Option<f64>,
}

impl EstimateRecord {
    pub fn new(step: usize, observed_color: ColorId, estimate: Pose, truth: Option<Pose>) -> Self {
        EstimateRecord {
            step,
            observed_color,
            x: estimate.x,
            y: estimate.y,
            heading: estimate.heading,
            true_x: truth.map(|t| t.x),
            true_y: truth.map(|t| t.y),
            true_heading: truth.map(|t| t.heading),
            position_error: truth.map(|t| estimate.distance_to(&t)),
            heading_error: truth.map(|t| estimate.heading_error(&t)),
        }
    }

    /// Pair the inputs of a run with the estimates the filter returned for them.
    pub fn from_run(entries: &[InputLogEntry], estimates: &[Pose]) -> Vec<Self> {
        entries
            .iter()
            .zip(estimates)
            .enumerate()
            .map(|(step, (entry, estimate))| {
                EstimateRecord::new(step, entry.color, *estimate, entry.ground_truth)
            })
            .collect()
    }

    /// Reads a CSV file written by [`EstimateRecord::to_csv`].
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: Self = result?;
            records.push(record);
        }
        Ok(records)
    }

    /// Writes records to a CSV file with a header row. Unknown ground truth leaves its columns empty.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn test_generate_random_map() {
        let mut rng = StdRng::seed_from_u64(1);
        let map = generate_random_map(6, 8, 0.25, 3, &mut rng).unwrap();
        assert_eq!(map.rows(), 6);
        assert_eq!(map.cols(), 8);
        assert_approx_eq!(map.width(), 2.0, 1e-12);
        assert_approx_eq!(map.height(), 1.5, 1e-12);
        assert!(map.grid_rows().flatten().all(|&c| c < 3));
        assert!(generate_random_map(2, 2, 0.25, 0, &mut rng).is_err());
        assert!(generate_random_map(0, 2, 0.25, 3, &mut rng).is_err());
    }

    #[test]
    fn test_make_map_is_fixed() {
        let a = make_map().unwrap();
        let b = make_map().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.rows(), 10);
        assert_eq!(a.cols(), 10);
        assert_approx_eq!(a.cell_size(), 0.5, 1e-12);
    }

    #[test]
    fn test_reference_trajectory_is_a_closed_loop() {
        let map = make_map().unwrap();
        let config = TrajectoryConfig::reference(&map);
        let mut rng = StdRng::seed_from_u64(0);
        let entries = make_input_data(&map, &config, &mut rng).unwrap();

        assert_eq!(entries[0].odometry, OdomMeasurement::default());
        assert_eq!(entries[0].ground_truth, Some(config.start));
        for entry in &entries {
            let truth = entry.ground_truth.unwrap();
            // noise free: the reported color is always the color under the true pose
            assert_eq!(Some(entry.color), map.color_at(truth.x, truth.y));
        }
        let end = entries.last().unwrap().ground_truth.unwrap();
        assert_approx_eq!(end.x, config.start.x, 1e-9);
        assert_approx_eq!(end.y, config.start.y, 1e-9);
        assert_approx_eq!(end.heading.abs(), PI, 1e-9);
        let turns = entries[1..]
            .iter()
            .filter(|e| e.odometry.dheading != 0.0)
            .count();
        assert_eq!(turns, 14);
    }

    #[test]
    fn test_trajectory_leaving_the_carpet_is_rejected() {
        let map = make_map().unwrap();
        let config = TrajectoryConfig {
            legs: vec![Leg::new(20.0, 0.0)],
            ..TrajectoryConfig::reference(&map)
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            make_input_data(&map, &config, &mut rng),
            Err(CarpetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_color_noise_reports_other_colors() {
        let map = make_map().unwrap();
        let config = TrajectoryConfig {
            color_noise: 0.3,
            ..TrajectoryConfig::reference(&map)
        };
        let mut rng = StdRng::seed_from_u64(21);
        let entries = make_input_data(&map, &config, &mut rng).unwrap();
        let wrong = entries
            .iter()
            .filter(|e| {
                let truth = e.ground_truth.unwrap();
                map.color_at(truth.x, truth.y) != Some(e.color)
            })
            .count();
        let fraction = wrong as f64 / entries.len() as f64;
        assert!(fraction > 0.2 && fraction < 0.4, "wrong color fraction {fraction}");
        assert!(entries.iter().all(|e| (e.color as usize) < map.num_colors()));
    }

    #[test]
    fn test_odometry_noise() {
        let map = make_map().unwrap();
        let config = TrajectoryConfig {
            odom_position_noise_std_m: 0.01,
            odom_heading_noise_std_rad: 0.01,
            ..TrajectoryConfig::reference(&map)
        };
        let mut rng = StdRng::seed_from_u64(4);
        let entries = make_input_data(&map, &config, &mut rng).unwrap();
        // the ground truth is noise free, only the reported odometry is perturbed
        let end = entries.last().unwrap().ground_truth.unwrap();
        assert_approx_eq!(end.x, config.start.x, 1e-9);
        assert!(entries[1..].iter().any(|e| e.odometry.dy != 0.0));
        assert_eq!(entries[0].odometry, OdomMeasurement::default());
    }

    #[test]
    fn test_invalid_trajectory_config() {
        let map = make_map().unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        for config in [
            TrajectoryConfig {
                step_length_m: 0.0,
                ..TrajectoryConfig::reference(&map)
            },
            TrajectoryConfig {
                color_noise: 1.5,
                ..TrajectoryConfig::reference(&map)
            },
            TrajectoryConfig {
                odom_heading_noise_std_rad: -1.0,
                ..TrajectoryConfig::reference(&map)
            },
        ] {
            assert!(make_input_data(&map, &config, &mut rng).is_err());
        }
    }

    #[test]
    fn test_estimate_records_csv_roundtrip() {
        let entries = vec![
            InputLogEntry::new(OdomMeasurement::default(), 1, Some(Pose::new(3.0, 4.0, 0.5))),
            InputLogEntry::new(OdomMeasurement::new(0.1, 0.0, 0.0), 2, None),
        ];
        let estimates = vec![Pose::new(0.0, 0.0, 0.25), Pose::new(1.0, 1.0, -0.5)];
        let records = EstimateRecord::from_run(&entries, &estimates);
        assert_eq!(records.len(), 2);
        assert_approx_eq!(records[0].position_error.unwrap(), 5.0, 1e-12);
        assert_approx_eq!(records[0].heading_error.unwrap(), -0.25, 1e-12);
        assert_eq!(records[1].true_x, None);

        let f = NamedTempFile::new().unwrap();
        EstimateRecord::to_csv(&records, f.path()).unwrap();
        let read = EstimateRecord::from_csv(f.path()).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].step, 0);
        assert_eq!(read[0].observed_color, 1);
        assert_approx_eq!(read[0].true_y.unwrap(), 4.0, 1e-12);
        assert_eq!(read[1].position_error, None);
    }

    #[test]
    fn test_estimate_records_from_missing_file() {
        assert!(EstimateRecord::from_csv("/nonexistent/estimates.csv").is_err());
    }
}
