//! Raster size derivation for a bounding box at a given ground resolution.

use serde::{Deserialize, Serialize};

use crate::utm::{self, UtmZone};
use crate::{BboxError, BoundingBox};

/// Largest raster side, in pixels, requested from the imagery provider.
pub const MAX_PIXELS: u32 = 2500;

/// Ground resolution of the first sizing pass, in meters per pixel.
pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// Raster dimensions in pixels. Serialized as `[width, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct RasterSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl RasterSize {
    /// The longer side.
    #[must_use]
    pub fn longest(self) -> u32 {
        self.width.max(self.height)
    }
}

impl From<RasterSize> for [u32; 2] {
    fn from(size: RasterSize) -> Self {
        [size.width, size.height]
    }
}

impl From<[u32; 2]> for RasterSize {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

/// Ground extent of a bounding box in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundExtent {
    /// East-west extent in meters.
    pub width_m: f64,
    /// North-south extent in meters.
    pub height_m: f64,
}

impl GroundExtent {
    /// Measures a WGS84 box by projecting its lower-left and upper-right
    /// corners into the UTM zone of its middle.
    ///
    /// # Errors
    ///
    /// Returns [`BboxError::LatitudeOutOfRange`] if either `y` bound is not a
    /// latitude in `[-90, 90]`.
    pub fn of(bbox: &BoundingBox) -> Result<Self, BboxError> {
        if !(is_latitude(bbox.min_y) && is_latitude(bbox.max_y)) {
            return Err(BboxError::LatitudeOutOfRange {
                min_y: bbox.min_y,
                max_y: bbox.max_y,
            });
        }

        let (mid_lon, mid_lat) = bbox.middle();
        let zone = UtmZone::for_point(mid_lon, mid_lat);
        log::trace!("measuring {} in EPSG:{}", bbox.describe(), zone.epsg());
        let lower_left = utm::project(bbox.min_x, bbox.min_y, zone);
        let upper_right = utm::project(bbox.max_x, bbox.max_y, zone);

        Ok(Self {
            width_m: (upper_right.easting - lower_left.easting).abs(),
            height_m: (upper_right.northing - lower_left.northing).abs(),
        })
    }

    fn degenerate(&self, resolution: f64) -> BboxError {
        BboxError::DegenerateBoundingBox(format!(
            "{:.3}m x {:.3}m at {resolution} m/px",
            self.width_m, self.height_m
        ))
    }

    /// Pixel size at `resolution` meters per pixel, rounding half to even.
    ///
    /// # Errors
    ///
    /// Returns [`BboxError::InvalidResolution`] if `resolution` is not a
    /// positive finite number.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn size_at(&self, resolution: f64) -> Result<RasterSize, BboxError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(BboxError::InvalidResolution { resolution });
        }

        Ok(RasterSize {
            width: (self.width_m / resolution).round_ties_even() as u32,
            height: (self.height_m / resolution).round_ties_even() as u32,
        })
    }
}

/// A raster size together with the resolution it was computed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedRaster {
    /// Final raster size.
    pub size: RasterSize,
    /// Resolution of the final size in meters per pixel.
    pub resolution: f64,
    /// Whether the resolution was rescaled from the requested one.
    pub corrected: bool,
}

impl SizedRaster {
    /// Note describing the rescaled raster, present only when a correction
    /// was applied.
    #[must_use]
    pub fn correction_note(&self) -> Option<String> {
        self.corrected.then(|| {
            format!(
                "New Image shape at {:?} m resolution: ({}, {}) pixels",
                self.resolution, self.size.width, self.size.height
            )
        })
    }
}

fn is_latitude(value: f64) -> bool {
    (-90.0..=90.0).contains(&value)
}

/// Computes the raster size of `bbox` at `resolution` meters per pixel.
///
/// # Errors
///
/// * [`BboxError::LatitudeOutOfRange`] as for [`GroundExtent::of`]
/// * [`BboxError::InvalidResolution`] if `resolution` is not a positive
///   finite number
pub fn bbox_to_dimensions(bbox: &BoundingBox, resolution: f64) -> Result<RasterSize, BboxError> {
    GroundExtent::of(bbox)?.size_at(resolution)
}

/// Sizes `extent` so that its longer side lands on [`MAX_PIXELS`].
///
/// If the longer side at `resolution` is not exactly [`MAX_PIXELS`], the
/// resolution is scaled by `longest / MAX_PIXELS` and the size recomputed
/// once. The shorter side follows proportionally. For extents only a few
/// pixels across, the rounded `longest` is far enough off that this pass
/// overshoots the limit (3.4 m at 1 m/px comes out at 2833 px). In that case
/// the resolution is taken from the extent itself, `longer side /
/// MAX_PIXELS`, so the returned resolution always reproduces the returned
/// size.
///
/// # Errors
///
/// * [`BboxError::InvalidResolution`] if `resolution` is not a positive
///   finite number
/// * [`BboxError::DegenerateBoundingBox`] if either side of the final size
///   is zero pixels
pub fn fit_extent(extent: GroundExtent, resolution: f64) -> Result<SizedRaster, BboxError> {
    let size = extent.size_at(resolution)?;
    let longest = size.longest();

    if longest == 0 {
        return Err(extent.degenerate(resolution));
    }

    let sized = if longest == MAX_PIXELS {
        SizedRaster {
            size,
            resolution,
            corrected: false,
        }
    } else {
        let mut new_resolution = resolution * f64::from(longest) / f64::from(MAX_PIXELS);
        let mut rescaled = extent.size_at(new_resolution)?;
        if rescaled.longest() > MAX_PIXELS {
            new_resolution = extent.width_m.max(extent.height_m) / f64::from(MAX_PIXELS);
            rescaled = extent.size_at(new_resolution)?;
        }

        log::debug!(
            "rescaled raster from {longest}px at {resolution} m/px to {rescaled:?} at {new_resolution} m/px"
        );

        SizedRaster {
            size: rescaled,
            resolution: new_resolution,
            corrected: true,
        }
    };

    if sized.size.width == 0 || sized.size.height == 0 {
        return Err(extent.degenerate(sized.resolution));
    }

    Ok(sized)
}

/// Sizes the raster for `bbox`, starting at `resolution` meters per pixel
/// and rescaling once so the longer side is [`MAX_PIXELS`].
///
/// # Errors
///
/// See [`GroundExtent::of`] and [`fit_extent`].
pub fn dimensions_for_resolution(
    bbox: &BoundingBox,
    resolution: f64,
) -> Result<SizedRaster, BboxError> {
    fit_extent(GroundExtent::of(bbox)?, resolution)
}
