use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of cells in the goal grid.
pub const GRID_CELLS: u8 = 9;

/// Row of the 3x3 goal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vertical {
    Top,
    Middle,
    Bottom,
}

/// Column of the 3x3 goal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Horizontal {
    Left,
    Center,
    Right,
}

impl Vertical {
    fn offset(self) -> u8 {
        match self {
            Self::Top => 0,
            Self::Middle => 3,
            Self::Bottom => 6,
        }
    }
}

impl Horizontal {
    fn offset(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Center => 1,
            Self::Right => 2,
        }
    }
}

impl FromStr for Vertical {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "middle" => Ok(Self::Middle),
            "bottom" => Ok(Self::Bottom),
            _ => Err(EngineError::InvalidCoordinate(s.to_string())),
        }
    }
}

impl FromStr for Horizontal {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            _ => Err(EngineError::InvalidCoordinate(s.to_string())),
        }
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Middle => write!(f, "middle"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}

impl fmt::Display for Horizontal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Center => write!(f, "center"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Row-major cell index, 0-8.
pub fn cell_index(vertical: Vertical, horizontal: Horizontal) -> u8 {
    vertical.offset() + horizontal.offset()
}

/// The 1-based form used in challenge rows.
pub fn grid_index(vertical: Vertical, horizontal: Horizontal) -> u8 {
    cell_index(vertical, horizontal) + 1
}

/// Parse a label pair into the 1-based grid index.
pub fn grid_index_from_labels(vertical: &str, horizontal: &str) -> Result<u8> {
    Ok(grid_index(vertical.parse()?, horizontal.parse()?))
}
