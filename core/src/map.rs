//! Carpet map: an immutable grid of color ids with a continuous coordinate lookup.
//!
//! The carpet is a rectangular grid of square cells, each filled by a single color. The bottom-left corner of
//! the bottom-left cell is the world origin and every cell occupies a half open interval
//! `[i * cell_size, (i + 1) * cell_size)` along each axis. A point exactly on a cell edge therefore belongs to
//! the cell above / to the right of the edge.
//!
//! The grid is stored the way it is usually written down (and rendered): row 0 is the *top* row of the carpet.
//! The vertical index is thus inverted with respect to world y.
//!
//! Lookups never fail. Points outside of the carpet produce `None`, the out-of-bounds marker, independently for
//! every queried point.
use serde::{Deserialize, Serialize};

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::ColorId;
use crate::error::{CarpetError, Result};

/// Serialized representation of a carpet, validated on the way in.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CarpetMapData {
    grid: Vec<Vec<ColorId>>,
    cell_size: f64,
}

/// Immutable carpet color map
///
/// Built once (usually from a file or by [`crate::sim::generate_random_map`]) and then shared read-only between
/// any number of filters, typically behind an [`std::sync::Arc`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CarpetMapData", into = "CarpetMapData")]
pub struct CarpetMap {
    /// Row major cells, row 0 is the top row
    cells: Vec<ColorId>,
    rows: usize,
    cols: usize,
    cell_size: f64,
}

impl CarpetMap {
    /// Build a carpet from a grid of color ids and a cell size in meters.
    ///
    /// `grid[0]` is the top row of the carpet. All rows must have the same, non-zero length and the cell size
    /// must be finite and strictly positive.
    pub fn new(grid: Vec<Vec<ColorId>>, cell_size: f64) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(CarpetError::InvalidMap(format!(
                "cell size must be a positive finite number of meters, got {cell_size}"
            )));
        }
        let rows = grid.len();
        let cols = grid.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            return Err(CarpetError::InvalidMap("grid must not be empty".to_string()));
        }
        if let Some((i, row)) = grid.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(CarpetError::InvalidMap(format!(
                "grid rows must all have {cols} cells, row {i} has {}",
                row.len()
            )));
        }
        Ok(CarpetMap {
            cells: grid.into_iter().flatten().collect(),
            rows,
            cols,
            cell_size,
        })
    }
    /// Number of grid rows
    pub fn rows(&self) -> usize {
        self.rows
    }
    /// Number of grid columns
    pub fn cols(&self) -> usize {
        self.cols
    }
    /// Edge length of a single cell in meters
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }
    /// Extent of the carpet along the x-axis in meters
    pub fn width(&self) -> f64 {
        self.cols as f64 * self.cell_size
    }
    /// Extent of the carpet along the y-axis in meters
    pub fn height(&self) -> f64 {
        self.rows as f64 * self.cell_size
    }
    /// Number of distinct color ids the carpet can hold, i.e. the largest id present plus one
    pub fn num_colors(&self) -> usize {
        self.cells.iter().max().map_or(0, |&max| max as usize + 1)
    }
    /// Color stored at a grid index, where `row` counts from the top row.
    pub fn cell(&self, row: usize, col: usize) -> Option<ColorId> {
        if row < self.rows && col < self.cols {
            Some(self.cells[row * self.cols + col])
        } else {
            None
        }
    }
    /// Iterate over the rows of the grid, top row first
    pub fn grid_rows(&self) -> impl Iterator<Item = &[ColorId]> {
        self.cells.chunks(self.cols)
    }
    /// Color of the cell containing the world point `(x, y)`, or `None` when the point is off the carpet.
    pub fn color_at(&self, x: f64, y: f64) -> Option<ColorId> {
        let col = (x / self.cell_size).floor();
        let row_from_bottom = (y / self.cell_size).floor();
        // written so that NaN coordinates also land out of bounds
        if !(col >= 0.0 && col < self.cols as f64) {
            return None;
        }
        if !(row_from_bottom >= 0.0 && row_from_bottom < self.rows as f64) {
            return None;
        }
        let row = self.rows - 1 - row_from_bottom as usize;
        self.cell(row, col as usize)
    }
    /// Batch lookup of the colors under a set of world points.
    ///
    /// Out of bounds points yield `None` in their slot without affecting the others.
    pub fn lookup(&self, coords: &[(f64, f64)]) -> Vec<Option<ColorId>> {
        coords.iter().map(|&(x, y)| self.color_at(x, y)).collect()
    }
    /// Fraction of the carpet area covered by the given color
    pub fn coverage(&self, color: ColorId) -> f64 {
        let matching = self.cells.iter().filter(|&&c| c == color).count();
        matching as f64 / self.cells.len() as f64
    }
    /// Write the carpet to a JSON file.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
    /// Read and validate a carpet from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

impl TryFrom<CarpetMapData> for CarpetMap {
    type Error = CarpetError;
    fn try_from(data: CarpetMapData) -> Result<Self> {
        CarpetMap::new(data.grid, data.cell_size)
    }
}

impl From<CarpetMap> for CarpetMapData {
    fn from(map: CarpetMap) -> Self {
        CarpetMapData {
            grid: map.grid_rows().map(<[ColorId]>::to_vec).collect(),
            cell_size: map.cell_size,
        }
    }
}
