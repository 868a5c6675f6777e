//! CARPET-PF: Monte Carlo localization over a colored carpet.
//!
//! The program runs the carpet particle filter on either simulated or recorded inputs and writes the estimate
//! after every update to a CSV file.
//!
//! - `simulate`: generate a random carpet, drive a simulated robot over it and localize it
//! - `replay`: run the filter on a carpet file and a previously recorded input log
//! - `config`: write a template filter configuration file
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use carpet::sim::{EstimateRecord, TrajectoryConfig, generate_random_map, make_input_data};
use carpet::{CarpetMap, CarpetParticleFilter, FilterConfig, InputLogEntry, load_input_log};

const LONG_ABOUT: &str = "CARPET-PF: Monte Carlo localization of a mobile robot over a floor tiled with a known \
pattern of colored carpet cells, using odometry and a single downward facing color sensor.

Filter parameters default to 500 particles, a 0.95 color hit probability and systematic resampling. They can be \
changed with a configuration file (TOML/JSON/YAML) passed via --config; use the `config` subcommand to write a \
template.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Carpet-based particle filter localization.", long_about = LONG_ABOUT)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        about = "Localize a simulated robot on a random carpet",
        long_about = "Generate a random carpet and a loop trajectory over it, simulate noisy odometry and color readings along the trajectory, run the particle filter on them and write the estimates next to the ground truth."
    )]
    Simulate(SimulateArgs),
    #[command(
        about = "Run the filter on a recorded input log",
        long_about = "Load a carpet map (JSON) and an input log written by a previous run, feed the logged inputs through a fresh filter and write the estimates. Errors against ground truth are reported when the log carries it."
    )]
    Replay(ReplayArgs),
    #[command(name = "config", about = "Generate a template filter configuration file")]
    CreateConfig(CreateConfigArgs),
}

/// Filter arguments shared by all runs
#[derive(Args, Clone, Debug)]
struct FilterArgs {
    /// Filter configuration file (TOML/JSON/YAML); defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed for the filter
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output CSV file path for the estimates
    #[arg(short, long, value_parser)]
    output: PathBuf,
}

#[derive(Args, Clone, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Number of carpet rows
    #[arg(long, default_value_t = 10)]
    rows: usize,

    /// Number of carpet columns
    #[arg(long, default_value_t = 10)]
    cols: usize,

    /// Side length of a carpet cell (meters)
    #[arg(long, default_value_t = 0.5)]
    cell_size: f64,

    /// Number of distinct carpet colors
    #[arg(long, default_value_t = 4)]
    colors: u32,

    /// RNG seed for the carpet and the simulated sensor noise
    #[arg(long, default_value_t = 7)]
    sim_seed: u64,

    /// Odometry position noise standard deviation per update (meters)
    #[arg(long, default_value_t = 0.0)]
    odom_position_noise: f64,

    /// Odometry heading noise standard deviation per update (radians)
    #[arg(long, default_value_t = 0.0)]
    odom_heading_noise: f64,

    /// Probability that the color sensor reports a wrong color
    #[arg(long, default_value_t = 0.0)]
    color_noise: f64,

    /// Write the simulated inputs to this file for later replay
    #[arg(long)]
    input_log: Option<PathBuf>,

    /// Write the generated carpet to this JSON file
    #[arg(long)]
    map_out: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
struct ReplayArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Carpet map JSON file
    #[arg(short, long)]
    map: PathBuf,

    /// Input log written by a previous run
    #[arg(short, long)]
    input_log: PathBuf,
}

#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Output path; the format follows the extension (.toml, .json, .yaml, .yml)
    #[arg(short, long, default_value = "carpet_pf.toml")]
    output: PathBuf,
}

/// Initialize the logger with the specified configuration
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to a log file; logs are appended to it instead of written to stderr
fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

fn load_filter_config(path: Option<&Path>) -> Result<FilterConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            info!("Loading filter configuration from {}", path.display());
            Ok(FilterConfig::from_file(path)?)
        }
        None => Ok(FilterConfig::default()),
    }
}

/// Run a fresh filter over `entries`, write the estimates and report the final error.
fn run_filter(
    map: Arc<CarpetMap>,
    entries: &[InputLogEntry],
    args: &FilterArgs,
) -> Result<(), Box<dyn Error>> {
    let config = load_filter_config(args.config.as_deref())?;
    info!(
        "Running {} particles ({:?} resampling) over {} updates",
        config.num_particles,
        config.resampling_strategy,
        entries.len()
    );
    let mut pf = CarpetParticleFilter::with_seed(map, config, args.seed)?;
    let estimates = pf.replay(entries);
    let records = EstimateRecord::from_run(entries, &estimates);
    EstimateRecord::to_csv(&records, &args.output)?;
    info!(
        "Wrote {} estimates to {}",
        records.len(),
        args.output.display()
    );

    match records.last() {
        Some(EstimateRecord {
            position_error: Some(position_error),
            heading_error: Some(heading_error),
            x,
            y,
            heading,
            ..
        }) => info!(
            "Final estimate ({x:.3} m, {y:.3} m, {heading:.3} rad): position error {position_error:.3} m, heading error {heading_error:.3} rad"
        ),
        Some(last) => info!(
            "Final estimate ({:.3} m, {:.3} m, {:.3} rad), no ground truth available",
            last.x, last.y, last.heading
        ),
        None => warn!("No estimates produced"),
    }
    Ok(())
}

fn run_simulate(args: &SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut rng = StdRng::seed_from_u64(args.sim_seed);
    let map = generate_random_map(args.rows, args.cols, args.cell_size, args.colors, &mut rng)?;
    info!(
        "Generated a {}x{} carpet ({:.2} m x {:.2} m) with {} colors",
        map.rows(),
        map.cols(),
        map.width(),
        map.height(),
        args.colors
    );
    if let Some(path) = &args.map_out {
        map.to_json(path)?;
        info!("Wrote carpet to {}", path.display());
    }

    let trajectory = TrajectoryConfig {
        odom_position_noise_std_m: args.odom_position_noise,
        odom_heading_noise_std_rad: args.odom_heading_noise,
        color_noise: args.color_noise,
        ..TrajectoryConfig::reference(&map)
    };
    let entries = make_input_data(&map, &trajectory, &mut rng)?;
    if let Some(path) = &args.input_log {
        carpet::write_input_log(&entries, path)?;
        info!("Wrote {} inputs to {}", entries.len(), path.display());
    }
    run_filter(Arc::new(map), &entries, &args.filter)
}

fn run_replay(args: &ReplayArgs) -> Result<(), Box<dyn Error>> {
    let map = CarpetMap::from_json(&args.map)?;
    let entries = load_input_log(&args.input_log)?;
    info!(
        "Loaded a {}x{} carpet from {} and {} inputs from {}",
        map.rows(),
        map.cols(),
        args.map.display(),
        entries.len(),
        args.input_log.display()
    );
    run_filter(Arc::new(map), &entries, &args.filter)
}

fn create_config_file(args: &CreateConfigArgs) -> Result<(), Box<dyn Error>> {
    FilterConfig::default().to_file(&args.output)?;
    info!("Wrote template configuration to {}", args.output.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    match &cli.command {
        Command::Simulate(args) => run_simulate(args),
        Command::Replay(args) => run_replay(args),
        Command::CreateConfig(args) => create_config_file(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate_arguments() {
        let cli = Cli::try_parse_from([
            "carpet-pf",
            "simulate",
            "--output",
            "out.csv",
            "--color-noise",
            "0.1",
            "--seed",
            "3",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Simulate(args) => {
                assert_eq!(args.filter.output, PathBuf::from("out.csv"));
                assert_eq!(args.filter.seed, 3);
                assert_eq!(args.color_noise, 0.1);
                assert_eq!(args.rows, 10);
            }
            _ => panic!("expected the simulate command"),
        }
    }

    #[test]
    fn test_replay_requires_inputs() {
        assert!(Cli::try_parse_from(["carpet-pf", "replay", "--output", "out.csv"]).is_err());
    }

    #[test]
    fn test_simulate_then_replay() {
        let dir = tempdir().unwrap();
        let simulate = SimulateArgs {
            filter: FilterArgs {
                config: None,
                seed: 1,
                output: dir.path().join("simulated.csv"),
            },
            rows: 6,
            cols: 6,
            cell_size: 0.5,
            colors: 3,
            sim_seed: 2,
            odom_position_noise: 0.0,
            odom_heading_noise: 0.0,
            color_noise: 0.0,
            input_log: Some(dir.path().join("inputs.json")),
            map_out: Some(dir.path().join("map.json")),
        };
        run_simulate(&simulate).unwrap();

        let replay = ReplayArgs {
            filter: FilterArgs {
                output: dir.path().join("replayed.csv"),
                ..simulate.filter.clone()
            },
            map: dir.path().join("map.json"),
            input_log: dir.path().join("inputs.json"),
        };
        run_replay(&replay).unwrap();

        let simulated = EstimateRecord::from_csv(dir.path().join("simulated.csv")).unwrap();
        let replayed = EstimateRecord::from_csv(dir.path().join("replayed.csv")).unwrap();
        assert!(!simulated.is_empty());
        assert_eq!(simulated, replayed);
    }

    #[test]
    fn test_create_config_file() {
        let dir = tempdir().unwrap();
        let args = CreateConfigArgs {
            output: dir.path().join("carpet_pf.yaml"),
        };
        create_config_file(&args).unwrap();
        assert_eq!(
            FilterConfig::from_file(&args.output).unwrap(),
            FilterConfig::default()
        );
    }
}
