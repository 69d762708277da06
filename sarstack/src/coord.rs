//! Geographic bounding boxes in degrees.
//!
//! Boxes are written `south, north, west, east` in template files, matching
//! the `--bbox` convention of the DEM and stack-generation tools.

use std::fmt;
use thiserror::Error;

/// Errors parsing a bounding box string.
#[derive(Debug, Error, PartialEq)]
pub enum BoundsError {
    /// Expected exactly four comma-separated fields
    #[error("expected 'S, N, W, E' with four fields, got {count} in '{text}'")]
    WrongFieldCount { text: String, count: usize },

    /// A field failed to parse as a number
    #[error("invalid coordinate '{field}' in '{text}'")]
    InvalidCoordinate { text: String, field: String },
}

/// A geographic bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern latitude bound
    pub south: f64,
    /// Northern latitude bound
    pub north: f64,
    /// Western longitude bound
    pub west: f64,
    /// Eastern longitude bound
    pub east: f64,
}

impl BoundingBox {
    /// Parse a `"S, N, W, E"` string, tolerating whitespace around fields.
    pub fn parse(text: &str) -> Result<Self, BoundsError> {
        let fields: Vec<&str> = text.split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(BoundsError::WrongFieldCount {
                text: text.to_string(),
                count: fields.len(),
            });
        }

        let mut values = [0f64; 4];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field.parse().map_err(|_| BoundsError::InvalidCoordinate {
                text: text.to_string(),
                field: (*field).to_string(),
            })?;
        }

        Ok(BoundingBox {
            south: values[0],
            north: values[1],
            west: values[2],
            east: values[3],
        })
    }

    /// Expand the box outward by `margin` degrees on every side.
    pub fn buffered(&self, margin: f64) -> Self {
        BoundingBox {
            south: self.south - margin,
            north: self.north + margin,
            west: self.west - margin,
            east: self.east + margin,
        }
    }

    /// Snap outward to whole degrees: floor the lower bounds, ceil the
    /// upper bounds. Some DEM providers accept integer tiles only.
    pub fn snapped_outward(&self) -> [i64; 4] {
        [
            self.south.floor() as i64,
            self.north.ceil() as i64,
            self.west.floor() as i64,
            self.east.ceil() as i64,
        ]
    }

    /// Space-separated `S N W E` form used by tool command lines.
    pub fn to_arg_string(&self) -> String {
        format!("{} {} {} {}", self.south, self.north, self.west, self.east)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.south, self.north, self.west, self.east
        )
    }
}
