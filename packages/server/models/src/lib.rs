#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the ADS-B hex map server.
//!
//! The `/map` endpoint accepts a loosely shaped `{"data": {...}}` body. It
//! is converted into a [`MapRequest`] before anything else looks at it, so
//! handlers only ever see validated, typed parameters.

use adsb_hex_imagery::{BoundingBox, RasterSize};
use adsb_hex_observation_models::Observation;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// Body key holding the request parameters.
pub const DATA_KEY: &str = "data";
/// Parameter whose presence selects an aggregation request.
pub const DISTANCE_KEY: &str = "Distance";
/// Parameter whose presence selects a bounding box request.
pub const X_ADJUST_KEY: &str = "x_adjust";
/// Key of the error message in [`MapErrorPayload`].
pub const MAP_ERROR_KEY: &str = "Error during map making";

/// Significance used when a request does not carry one.
pub const DEFAULT_SIGNIFICANCE: u64 = 1;

const fn default_significance() -> u64 {
    DEFAULT_SIGNIFICANCE
}

/// Parameters of an aggregation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateParams {
    /// Distance threshold in miles.
    #[serde(rename = "Distance")]
    pub distance: f64,
    /// H3 resolution to aggregate at.
    #[serde(rename = "Resolution")]
    pub resolution: u8,
    /// Minimum observation count per cell.
    #[serde(rename = "Significance", default = "default_significance")]
    pub significance: u64,
}

/// Parameters of a bounding box request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BboxParams {
    /// Half-width of the box in degrees.
    pub x_adjust: f64,
    /// Half-height of the box in degrees.
    pub y_adjust: f64,
    /// Cell whose centroid the box is built around.
    pub cell_id: String,
}

/// Kind of a `/map` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum MapRequestKind {
    /// H3 aggregation.
    Aggregate,
    /// Imagery bounding box.
    Bbox,
}

/// A validated `/map` request.
#[derive(Debug, Clone, PartialEq)]
pub enum MapRequest {
    /// Aggregate observations onto H3 cells.
    Aggregate(AggregateParams),
    /// Derive the imagery bounding box for a cell.
    Bbox(BboxParams),
}

impl MapRequest {
    /// The kind of this request.
    #[must_use]
    pub const fn kind(&self) -> MapRequestKind {
        match self {
            Self::Aggregate(_) => MapRequestKind::Aggregate,
            Self::Bbox(_) => MapRequestKind::Bbox,
        }
    }
}

/// Errors converting a request body into a [`MapRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapRequestError {
    /// The body has no `data` object, or `data` carries neither selector key.
    #[error("Unrecognized request: {0}")]
    UnrecognizedShape(String),

    /// The selected request kind is missing or has malformed parameters.
    #[error("Invalid {kind} parameters: {message}")]
    InvalidParams {
        /// Kind selected by the body.
        kind: MapRequestKind,
        /// What was wrong with the parameters.
        message: String,
    },
}

impl TryFrom<&Value> for MapRequest {
    type Error = MapRequestError;

    /// Dispatches on key presence in `body.data`: `Distance` selects an
    /// aggregation, otherwise `x_adjust` selects a bounding box.
    fn try_from(body: &Value) -> Result<Self, Self::Error> {
        let data = body
            .get(DATA_KEY)
            .filter(|data| data.is_object())
            .ok_or_else(|| {
                MapRequestError::UnrecognizedShape(format!("expected a {DATA_KEY:?} object"))
            })?;

        let invalid = |kind: MapRequestKind| {
            move |e: serde_json::Error| MapRequestError::InvalidParams {
                kind,
                message: e.to_string(),
            }
        };

        if data.get(DISTANCE_KEY).is_some() {
            return AggregateParams::deserialize(data)
                .map(Self::Aggregate)
                .map_err(invalid(MapRequestKind::Aggregate));
        }

        if data.get(X_ADJUST_KEY).is_some() {
            return BboxParams::deserialize(data)
                .map(Self::Bbox)
                .map_err(invalid(MapRequestKind::Bbox));
        }

        Err(MapRequestError::UnrecognizedShape(format!(
            "{DATA_KEY:?} has neither {DISTANCE_KEY:?} nor {X_ADJUST_KEY:?}"
        )))
    }
}

/// Response to an aggregation request.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    /// Per-cell records as a JSON string.
    pub h3_df: String,
    /// Row-indexed feature collection as a JSON string.
    pub h3_gdf: String,
    /// Cell-id keyed feature collection for the choropleth layer.
    pub geojson_obj_h3_gdf: FeatureCollection,
}

/// Response to a bounding box request.
#[derive(Debug, Clone, Serialize)]
pub struct BboxResponse {
    /// Evalscript to run against the imagery provider.
    pub evalscript_true_color: String,
    /// Box to request imagery for.
    pub tampa_bbox: BoundingBox,
    /// Raster size to request, `[width, height]`.
    pub tampa_size: RasterSize,
    /// Human readable box coordinates.
    pub bcords_str: String,
    /// Present only when the resolution was rescaled to fit the raster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nw_rs_str: Option<String>,
}

/// Error body returned by `/map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapErrorPayload {
    /// What went wrong.
    #[serde(rename = "Error during map making")]
    pub error: String,
    /// The request body as received.
    pub data: Value,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Query parameters for the observations endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservationQueryParams {
    /// Maximum number of rows.
    pub limit: Option<usize>,
    /// Rows to skip.
    pub offset: Option<usize>,
}

/// A page of observations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationPage {
    /// Rows in the whole dataset.
    pub total: usize,
    /// Offset of the first returned row.
    pub offset: usize,
    /// The rows.
    pub observations: Vec<Observation>,
}

/// Result of a dataset reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReload {
    /// Rows in the new snapshot.
    pub observations: usize,
    /// Resolutions with a cell column in the new snapshot.
    pub resolutions: Vec<u8>,
}
