//! Catalog of carpet colors.
//!
//! The filter only consumes integer [`ColorId`]s. This module owns the mapping between those ids, human readable
//! names (as used on the command line and in configuration files) and the RGB values used when displaying a
//! carpet. The mapping is a closed enumeration so every id it hands out is valid by construction.
use serde::{Deserialize, Serialize};

use std::fmt::{self, Display};
use std::str::FromStr;

use crate::ColorId;

/// The carpet colors the color sensor can distinguish
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarpetColor {
    DarkGrey,
    LightBlue,
    Beige,
    DarkBlue,
}

impl CarpetColor {
    /// All catalog colors, ordered by id
    pub const ALL: [CarpetColor; 4] = [
        CarpetColor::DarkGrey,
        CarpetColor::LightBlue,
        CarpetColor::Beige,
        CarpetColor::DarkBlue,
    ];

    /// Integer id reported by the color sensor for this color
    pub fn index(self) -> ColorId {
        match self {
            CarpetColor::DarkGrey => 0,
            CarpetColor::LightBlue => 1,
            CarpetColor::Beige => 2,
            CarpetColor::DarkBlue => 3,
        }
    }
    /// Look up a catalog color by id
    pub fn from_index(index: ColorId) -> Option<CarpetColor> {
        CarpetColor::ALL.iter().copied().find(|c| c.index() == index)
    }
    pub fn name(self) -> &'static str {
        match self {
            CarpetColor::DarkGrey => "dark_grey",
            CarpetColor::LightBlue => "light_blue",
            CarpetColor::Beige => "beige",
            CarpetColor::DarkBlue => "dark_blue",
        }
    }
    /// Display color as (r, g, b)
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            CarpetColor::DarkGrey => (80, 80, 80),
            CarpetColor::LightBlue => (51, 204, 255),
            CarpetColor::Beige => (241, 230, 218),
            CarpetColor::DarkBlue => (0, 51, 204),
        }
    }
}

impl Display for CarpetColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CarpetColor {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        CarpetColor::ALL
            .iter()
            .copied()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| format!("unknown carpet color '{s}'"))
    }
}

impl From<CarpetColor> for ColorId {
    fn from(color: CarpetColor) -> Self {
        color.index()
    }
}

impl TryFrom<ColorId> for CarpetColor {
    type Error = String;
    fn try_from(index: ColorId) -> Result<Self, Self::Error> {
        CarpetColor::from_index(index).ok_or_else(|| format!("no carpet color with id {index}"))
    }
}
