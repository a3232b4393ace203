#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! H3 cell geometry for the ADS-B hex map.
//!
//! Thin layer over `h3o` that speaks in opaque cell-id strings (the form
//! stored in the observation dataset and sent by the UI) and hands back
//! coordinates as named `(lat, lon)` pairs so nothing downstream has to
//! remember which order a given library prefers.

use std::str::FromStr as _;

use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while resolving H3 cell geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// The identifier is not a well-formed H3 cell index.
    #[error("Invalid H3 cell id: {cell_id:?}")]
    InvalidCellId {
        /// The rejected identifier.
        cell_id: String,
    },

    /// The coordinate is outside the valid latitude/longitude range.
    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lon: f64,
    },

    /// The resolution is not an H3 resolution (0-15).
    #[error("Unsupported H3 resolution: {resolution}")]
    UnsupportedResolution {
        /// The rejected resolution.
        resolution: u8,
    },
}

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl LatLon {
    /// Creates a new coordinate.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<LatLng> for LatLon {
    fn from(ll: LatLng) -> Self {
        Self {
            lat: ll.lat(),
            lon: ll.lng(),
        }
    }
}

/// The boundary of a cell as a closed ring.
///
/// The first vertex is always repeated as the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellBoundary(Vec<LatLon>);

impl CellBoundary {
    /// Builds a closed ring from the given vertices, appending the first
    /// vertex if the input is not already closed.
    #[must_use]
    pub fn closed(mut vertices: Vec<LatLon>) -> Self {
        let open = match (vertices.first(), vertices.last()) {
            (Some(first), Some(last)) => vertices.len() == 1 || first != last,
            _ => false,
        };
        if open {
            vertices.push(vertices[0]);
        }
        Self(vertices)
    }

    /// All ring vertices, including the closing one.
    #[must_use]
    pub fn vertices(&self) -> &[LatLon] {
        &self.0
    }

    /// Number of distinct corners (5 for pentagons, 6 for hexagons, more
    /// when the boundary crosses an icosahedron edge).
    #[must_use]
    pub fn corner_count(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Returns `true` if the first and last vertex coincide.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.len() > 1 && self.0.first() == self.0.last()
    }
}

/// Parses an H3 cell identifier in its hexadecimal string form.
///
/// # Errors
///
/// Returns [`GridError::InvalidCellId`] if the string is not a valid cell
/// index.
pub fn parse_cell(cell_id: &str) -> Result<CellIndex, GridError> {
    CellIndex::from_str(cell_id.trim()).map_err(|_| GridError::InvalidCellId {
        cell_id: cell_id.to_string(),
    })
}

/// Parses a numeric resolution into an H3 [`Resolution`].
///
/// # Errors
///
/// Returns [`GridError::UnsupportedResolution`] if the value is above 15.
pub fn parse_resolution(resolution: u8) -> Result<Resolution, GridError> {
    Resolution::try_from(resolution).map_err(|_| GridError::UnsupportedResolution { resolution })
}

/// Returns the center of the given cell.
///
/// # Errors
///
/// Returns [`GridError::InvalidCellId`] if the identifier is malformed.
pub fn cell_centroid(cell_id: &str) -> Result<LatLon, GridError> {
    let cell = parse_cell(cell_id)?;
    Ok(LatLng::from(cell).into())
}

/// Returns the boundary of the given cell as a closed `(lat, lon)` ring.
///
/// # Errors
///
/// Returns [`GridError::InvalidCellId`] if the identifier is malformed.
pub fn cell_boundary(cell_id: &str) -> Result<CellBoundary, GridError> {
    let cell = parse_cell(cell_id)?;
    let vertices = cell.boundary().iter().copied().map(LatLon::from).collect();
    Ok(CellBoundary::closed(vertices))
}

/// Indexes a point into the cell containing it at `resolution`, returning
/// the cell id string.
///
/// # Errors
///
/// * [`GridError::UnsupportedResolution`] if `resolution` is above 15
/// * [`GridError::InvalidCoordinate`] if the coordinate is not finite
pub fn cell_for_point(lat: f64, lon: f64, resolution: u8) -> Result<String, GridError> {
    let res = parse_resolution(resolution)?;
    let coord = LatLng::new(lat, lon).map_err(|_| GridError::InvalidCoordinate { lat, lon })?;
    Ok(coord.to_cell(res).to_string())
}
