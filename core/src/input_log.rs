//! Recording of filter inputs for offline replay.
//!
//! Every update of a filter consumes an odometry increment and an observed color, and optionally carries the
//! ground truth pose for evaluation. A recorded run is an ordered list of those triples. It is written as a
//! versioned JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": [
//!     { "odometry": { "dx": 0.1, "dy": 0.0, "dheading": 0.0 }, "color": 2, "ground_truth": null }
//!   ]
//! }
//! ```
//!
//! Floating point values are written with enough digits and parsed back exactly, so a loaded log compares equal
//! to the log that was written. Non-finite values cannot be represented in JSON and fail to round trip.
use serde::{Deserialize, Serialize};

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use crate::error::{CarpetError, Result};
use crate::{ColorId, OdomMeasurement, Pose};

/// Current version of the input log file format
pub const INPUT_LOG_VERSION: u32 = 1;

/// The inputs of a single filter update
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputLogEntry {
    pub odometry: OdomMeasurement,
    pub color: ColorId,
    pub ground_truth: Option<Pose>,
}

impl InputLogEntry {
    pub fn new(odometry: OdomMeasurement, color: ColorId, ground_truth: Option<Pose>) -> Self {
        InputLogEntry {
            odometry,
            color,
            ground_truth,
        }
    }
}

#[derive(Serialize)]
struct InputLogDocument<'a> {
    version: u32,
    entries: &'a [InputLogEntry],
}

#[derive(Deserialize)]
struct InputLogHeader {
    version: u32,
}

#[derive(Deserialize)]
struct InputLogContents {
    entries: Vec<InputLogEntry>,
}

/// Write an ordered sequence of filter inputs to a JSON file.
pub fn write_input_log<P: AsRef<Path>>(entries: &[InputLogEntry], path: P) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    let document = InputLogDocument {
        version: INPUT_LOG_VERSION,
        entries,
    };
    serde_json::to_writer(file, &document)?;
    Ok(())
}

/// Load a sequence of filter inputs previously written with [`write_input_log`].
///
/// Fails with [`CarpetError::LogVersion`] if the file was written by an incompatible format version.
pub fn load_input_log<P: AsRef<Path>>(path: P) -> Result<Vec<InputLogEntry>> {
    let contents = fs::read_to_string(path)?;
    let header: InputLogHeader = serde_json::from_str(&contents)?;
    if header.version != INPUT_LOG_VERSION {
        return Err(CarpetError::LogVersion {
            found: header.version,
            expected: INPUT_LOG_VERSION,
        });
    }
    let log: InputLogContents = serde_json::from_str(&contents)?;
    Ok(log.entries)
}
