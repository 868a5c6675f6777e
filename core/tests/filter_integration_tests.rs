//! End-to-end tests of the carpet particle filter
//!
//! These tests drive the filter with synthetic inputs generated over the reference carpet (see
//! [`carpet::sim::make_map`]) and check the behaviour of the whole update cycle rather than individual
//! components:
//! - initialization concentrates the particles on cells of the observed color
//! - a noise free run converges on the true pose
//! - runs are reproducible from a seed and can be recorded and replayed exactly
use std::sync::Arc;

use assert_approx_eq::assert_approx_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::NamedTempFile;

use carpet::sim::{TrajectoryConfig, make_input_data, make_map};
use carpet::{
    CarpetColor, CarpetError, CarpetMap, CarpetParticleFilter, ColorId, FilterConfig,
    InputLogEntry, OdomMeasurement, load_input_log,
};

fn reference_inputs(map: &CarpetMap) -> Vec<InputLogEntry> {
    let config = TrajectoryConfig::reference(map);
    let mut rng = StdRng::seed_from_u64(0);
    make_input_data(map, &config, &mut rng).unwrap()
}

/// 10 x 10 checkerboard of light blue and dark grey; each color covers exactly half of the carpet
fn checkerboard() -> Arc<CarpetMap> {
    let light_blue = CarpetColor::LightBlue.index();
    let dark_grey = CarpetColor::DarkGrey.index();
    let grid = (0..10)
        .map(|row| {
            (0..10)
                .map(|col| {
                    if (row + col) % 2 == 0 {
                        light_blue
                    } else {
                        dark_grey
                    }
                })
                .collect()
        })
        .collect();
    Arc::new(CarpetMap::new(grid, 0.5).unwrap())
}

fn matching_fraction(pf: &CarpetParticleFilter, map: &CarpetMap, color: ColorId) -> f64 {
    let particles = pf.particles().unwrap();
    let matching = particles
        .iter()
        .filter(|p| map.color_at(p.pose.x, p.pose.y) == Some(color))
        .count();
    matching as f64 / particles.len() as f64
}

#[test]
fn initialization_concentrates_particles_on_the_observed_color() {
    let map = checkerboard();
    let light_blue = CarpetColor::LightBlue.index();
    let runs = 20;
    let mut total = 0.0;
    for seed in 0..runs {
        let mut pf = CarpetParticleFilter::with_seed(map.clone(), FilterConfig::default(), seed)
            .unwrap();
        pf.update(&OdomMeasurement::default(), light_blue, None);
        assert_eq!(pf.particles().unwrap().len(), 500);
        let fraction = matching_fraction(&pf, &map, light_blue);
        assert_approx_eq!(fraction, 0.95, 0.05);
        total += fraction;
    }
    assert_approx_eq!(total / runs as f64, 0.95, 0.01);
}

#[test]
fn noise_free_run_converges_on_the_true_pose() {
    let map = Arc::new(make_map().unwrap());
    let inputs = reference_inputs(&map);
    let config = FilterConfig {
        num_particles: 2000,
        ..FilterConfig::default()
    };
    let mut pf = CarpetParticleFilter::with_seed(map, config, 123).unwrap();
    for entry in &inputs {
        pf.update(&entry.odometry, entry.color, entry.ground_truth);
    }
    let truth = inputs.last().unwrap().ground_truth.unwrap();
    let estimate = pf.current_pose().unwrap();
    assert!(
        estimate.distance_to(&truth) < 0.5,
        "estimate {estimate} too far from truth {truth}"
    );
    assert!(
        estimate.heading_error(&truth).abs() < 0.5,
        "estimate {estimate} heading too far from truth {truth}"
    );
}

#[test]
fn logged_inputs_roundtrip_through_a_file() {
    let map = Arc::new(make_map().unwrap());
    let inputs = reference_inputs(&map);
    let config = FilterConfig {
        log_inputs: true,
        num_particles: 100,
        ..FilterConfig::default()
    };
    let mut pf = CarpetParticleFilter::with_seed(map, config, 1).unwrap();
    for entry in &inputs {
        pf.update(&entry.odometry, entry.color, entry.ground_truth);
    }
    assert_eq!(pf.input_log().unwrap(), inputs.as_slice());

    let f = NamedTempFile::new().unwrap();
    pf.write_input_log(f.path()).unwrap();
    let logged = load_input_log(f.path()).unwrap();
    assert_eq!(logged, inputs);
}

#[test]
fn same_seed_gives_identical_runs() {
    let map = Arc::new(make_map().unwrap());
    let inputs = reference_inputs(&map);
    let config = FilterConfig {
        num_particles: 300,
        ..FilterConfig::default()
    };
    let mut a = CarpetParticleFilter::with_seed(map.clone(), config.clone(), 99).unwrap();
    let mut b = CarpetParticleFilter::with_seed(map.clone(), config.clone(), 99).unwrap();
    for entry in inputs.iter().take(50) {
        let pose_a = a.update(&entry.odometry, entry.color, None);
        let pose_b = b.update(&entry.odometry, entry.color, None);
        assert_eq!(pose_a, pose_b);
        assert_eq!(a.particles().unwrap(), b.particles().unwrap());
    }

    let mut c = CarpetParticleFilter::with_seed(map, config, 100).unwrap();
    let mut d = CarpetParticleFilter::with_seed(Arc::new(make_map().unwrap()), c.config().clone(), 99)
        .unwrap();
    c.update(&inputs[0].odometry, inputs[0].color, None);
    d.update(&inputs[0].odometry, inputs[0].color, None);
    assert_ne!(c.particles().unwrap(), d.particles().unwrap());
}

#[test]
fn replay_matches_the_live_run() {
    let map = Arc::new(make_map().unwrap());
    let mut trajectory = TrajectoryConfig::reference(&map);
    trajectory.odom_position_noise_std_m = 0.01;
    trajectory.odom_heading_noise_std_rad = 0.01;
    trajectory.color_noise = 0.05;
    let mut rng = StdRng::seed_from_u64(5);
    let inputs = make_input_data(&map, &trajectory, &mut rng).unwrap();

    let mut live = CarpetParticleFilter::with_seed(map.clone(), FilterConfig::default(), 8).unwrap();
    let live_poses: Vec<_> = inputs
        .iter()
        .map(|e| live.update(&e.odometry, e.color, e.ground_truth))
        .collect();

    let mut replayed = CarpetParticleFilter::with_seed(map, FilterConfig::default(), 8).unwrap();
    let replayed_poses = replayed.replay(&inputs);
    assert_eq!(live_poses, replayed_poses);
    assert_eq!(replayed.num_updates(), inputs.len());
    assert_eq!(replayed.most_recent_color(), Some(inputs.last().unwrap().color));
}

#[test]
fn weights_stay_normalized_on_noisy_data() {
    let map = Arc::new(make_map().unwrap());
    let mut trajectory = TrajectoryConfig::reference(&map);
    trajectory.color_noise = 0.2;
    let mut rng = StdRng::seed_from_u64(12);
    let inputs = make_input_data(&map, &trajectory, &mut rng).unwrap();

    let mut pf = CarpetParticleFilter::with_seed(map, FilterConfig::default(), 4).unwrap();
    for entry in &inputs {
        pf.update(&entry.odometry, entry.color, None);
        assert!(pf.last_raw_weight_sum().unwrap() > 0.0);
        let total: f64 = pf.particles().unwrap().iter().map(|p| p.weight).sum();
        assert_approx_eq!(total, 1.0, 1e-9);
    }
}

#[test]
fn accessors_fail_before_the_first_update() {
    let map = Arc::new(make_map().unwrap());
    let pf = CarpetParticleFilter::with_seed(map, FilterConfig::default(), 0).unwrap();
    assert!(matches!(pf.current_pose(), Err(CarpetError::NotInitialized)));
    assert!(matches!(pf.particles(), Err(CarpetError::NotInitialized)));
    assert_eq!(pf.most_recent_color(), None);
}

#[test]
fn filters_share_one_map() {
    let map = Arc::new(make_map().unwrap());
    let inputs = reference_inputs(&map);
    let mut filters: Vec<_> = (0..2)
        .map(|seed| CarpetParticleFilter::with_seed(map.clone(), FilterConfig::default(), seed))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(Arc::strong_count(&map), 3);
    for pf in filters.iter_mut() {
        pf.update(&inputs[0].odometry, inputs[0].color, None);
        assert!(Arc::ptr_eq(pf.map(), &map));
    }
    drop(filters);
    assert_eq!(Arc::strong_count(&map), 1);
}
