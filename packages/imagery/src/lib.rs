#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Bounding box and raster size derivation for satellite image crops.
//!
//! Given a selected H3 cell and two half-extent adjustments (in degrees),
//! derives the WGS84 bounding box handed to the imagery provider, then the
//! pixel dimensions of the requested raster. Raster sizing projects the box
//! into UTM to measure its ground extent and keeps the longer side at
//! [`raster::MAX_PIXELS`].

pub mod raster;
pub mod utm;

use adsb_hex_grid::GridError;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

pub use raster::{
    DEFAULT_RESOLUTION, GroundExtent, MAX_PIXELS, RasterSize, SizedRaster, bbox_to_dimensions,
    dimensions_for_resolution, fit_extent,
};

/// Largest accepted adjustment magnitude, in degrees.
pub const MAX_ADJUSTMENT_DEGREES: f64 = 180.0;

/// Sentinel-2 true color evalscript (bands B04, B03, B02 as RGB).
pub const EVALSCRIPT_TRUE_COLOR: &str = r#"
    //VERSION=3

    function setup() {
        return {
            input: [{
                bands: ["B02", "B03", "B04"]
            }],
            output: {
                bands: 3
            }
        };
    }

    function evaluatePixel(sample) {
        return [sample.B04, sample.B03, sample.B02];
    }
"#;

/// The adjustment axis that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
pub enum Axis {
    /// The first adjustment (`x_adjust`).
    X,
    /// The second adjustment (`y_adjust`).
    Y,
}

/// Errors that can occur while deriving a bounding box or raster size.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BboxError {
    /// An adjustment magnitude exceeds [`MAX_ADJUSTMENT_DEGREES`] (or is not
    /// finite).
    #[error("Error, {axis} adjustments are too big in magnitude, convert to lat/lon degrees")]
    AdjustmentOutOfRange {
        /// Which adjustment was rejected.
        axis: Axis,
        /// The rejected value.
        value: f64,
    },

    /// The cell could not be resolved.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// The box has no ground extent, so no resolution can be derived.
    #[error("Bounding box has zero ground extent: {0}")]
    DegenerateBoundingBox(String),

    /// A `y` bound is not a latitude, so the box cannot be projected.
    #[error("Bounding box latitudes ({min_y}, {max_y}) are outside [-90, 90]")]
    LatitudeOutOfRange {
        /// Lower `y` bound of the rejected box.
        min_y: f64,
        /// Upper `y` bound of the rejected box.
        max_y: f64,
    },

    /// The ground resolution is not a positive finite number.
    #[error("Invalid ground resolution: {resolution} m/px")]
    InvalidResolution {
        /// The rejected resolution in meters per pixel.
        resolution: f64,
    },
}

/// Coordinate reference system tag of a [`BoundingBox`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Crs {
    /// WGS84 geographic degrees (EPSG:4326).
    #[default]
    #[serde(rename = "4326")]
    #[strum(serialize = "EPSG:4326")]
    Wgs84,
}

/// An axis-aligned bounding box.
///
/// For [`Crs::Wgs84`] boxes handed to the imagery provider `x` is longitude
/// and `y` is latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Lower `x` bound.
    pub min_x: f64,
    /// Upper `x` bound.
    pub max_x: f64,
    /// Lower `y` bound.
    pub min_y: f64,
    /// Upper `y` bound.
    pub max_y: f64,
    /// Reference system of the bounds.
    #[serde(rename = "_crs")]
    pub crs: Crs,
}

impl BoundingBox {
    /// Creates a WGS84 bounding box.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            crs: Crs::Wgs84,
        }
    }

    /// The bounds as `(min_x, min_y, max_x, max_y)`.
    #[must_use]
    pub const fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// The same box with each axis ordered low to high.
    #[must_use]
    pub const fn normalized(&self) -> Self {
        Self {
            min_x: self.min_x.min(self.max_x),
            max_x: self.min_x.max(self.max_x),
            min_y: self.min_y.min(self.max_y),
            max_y: self.min_y.max(self.max_y),
            crs: self.crs,
        }
    }

    /// Center of the box as `(x, y)`.
    #[must_use]
    pub fn middle(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Human readable description shown next to the image request.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "Box coordinates: ({:?}, {:?}, {:?}, {:?})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

fn check_adjustment(axis: Axis, value: f64) -> Result<(), BboxError> {
    if value.is_finite() && value.abs() <= MAX_ADJUSTMENT_DEGREES {
        Ok(())
    } else {
        Err(BboxError::AdjustmentOutOfRange { axis, value })
    }
}

/// Builds a box extending `x_adjust` either side of `center_lat` and
/// `y_adjust` either side of `center_lon`.
///
/// The result is `(center_lat - x, center_lon - y, center_lat + x,
/// center_lon + y)` as `(min_x, min_y, max_x, max_y)`. Negative adjustments
/// produce the mirrored (inverted) box.
///
/// # Errors
///
/// Returns [`BboxError::AdjustmentOutOfRange`] for the first axis whose
/// magnitude exceeds [`MAX_ADJUSTMENT_DEGREES`]; the X axis is checked first.
pub fn center_to_bbox(
    center_lat: f64,
    center_lon: f64,
    x_adjust: f64,
    y_adjust: f64,
) -> Result<BoundingBox, BboxError> {
    check_adjustment(Axis::X, x_adjust)?;
    check_adjustment(Axis::Y, y_adjust)?;

    Ok(BoundingBox::new(
        center_lat - x_adjust,
        center_lon - y_adjust,
        center_lat + x_adjust,
        center_lon + y_adjust,
    ))
}

/// Builds the imagery bounding box around the centroid of `cell_id`.
///
/// The centroid's longitude is passed as `center_lat` and its latitude as
/// `center_lon`. The parameter names of [`center_to_bbox`] are wrong for
/// this call site, but the resulting numbers are what the imagery provider
/// needs: `x` spans longitude (`x_adjust`) and `y` spans latitude
/// (`y_adjust`).
///
/// # Errors
///
/// * [`BboxError::Grid`] if the cell id is malformed
/// * [`BboxError::AdjustmentOutOfRange`] as for [`center_to_bbox`]
pub fn cell_to_bbox(cell_id: &str, x_adjust: f64, y_adjust: f64) -> Result<BoundingBox, BboxError> {
    let center = adsb_hex_grid::cell_centroid(cell_id)?;
    log::debug!(
        "cell {cell_id} centroid lat={} lon={}",
        center.lat,
        center.lon
    );
    center_to_bbox(center.lon, center.lat, x_adjust, y_adjust)
}
