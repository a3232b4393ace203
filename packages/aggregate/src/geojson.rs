//! `GeoJSON` encoding of cell aggregates.
//!
//! Each aggregate becomes one `Feature` whose geometry is the cell's
//! boundary polygon with RFC 7946 `[lon, lat]` positions.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use adsb_hex_grid::CellBoundary;
use geo::{LineString, Polygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::{AggregateError, CellAggregate};

/// Which aggregate field becomes the feature `id`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum IdField {
    /// The H3 cell id.
    #[default]
    CellId,
}

/// Which aggregate field becomes `properties.value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ValueField {
    /// Total observations in the cell.
    #[default]
    Count,
    /// Observations of a single emitter category; zero when the cell has
    /// none.
    Category(String),
}

/// Returned when a value field name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown value field {0:?}: expected \"count\" or \"category:<name>\"")]
pub struct UnknownValueField(pub String);

impl FromStr for ValueField {
    type Err = UnknownValueField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s == "count" => Ok(Self::Count),
            Some(("category", name)) if !name.is_empty() => Ok(Self::Category(name.to_string())),
            _ => Err(UnknownValueField(s.to_string())),
        }
    }
}

impl fmt::Display for ValueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count => f.write_str("count"),
            Self::Category(name) => write!(f, "category:{name}"),
        }
    }
}

impl ValueField {
    /// Reads this field from `aggregate`.
    #[must_use]
    pub fn value_of(&self, aggregate: &CellAggregate) -> u64 {
        match self {
            Self::Count => aggregate.count,
            Self::Category(name) => aggregate.category_tally.get(name).copied().unwrap_or(0),
        }
    }
}

impl IdField {
    fn id_of(self, aggregate: &CellAggregate) -> Id {
        match self {
            Self::CellId => Id::String(aggregate.cell_id.clone()),
        }
    }
}

/// Polygon geometry of a boundary ring, as `[lon, lat]` positions.
#[must_use]
pub fn boundary_geometry(boundary: &CellBoundary) -> Geometry {
    let exterior: LineString<f64> = boundary
        .vertices()
        .iter()
        .map(|v| (v.lon, v.lat))
        .collect::<Vec<_>>()
        .into();
    let polygon = Polygon::new(exterior, Vec::new());
    Geometry::new(geojson::Value::from(&polygon))
}

/// Builds a `FeatureCollection` with one feature per aggregate, in input
/// order.
#[must_use]
pub fn to_feature_collection(
    aggregates: &[CellAggregate],
    id_field: IdField,
    value_field: &ValueField,
) -> FeatureCollection {
    let features = aggregates
        .iter()
        .map(|aggregate| {
            let mut properties = JsonObject::new();
            properties.insert("value".to_string(), Value::from(value_field.value_of(aggregate)));

            Feature {
                bbox: None,
                geometry: Some(boundary_geometry(&aggregate.boundary)),
                id: Some(id_field.id_of(aggregate)),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Serializes the feature collection to a string.
///
/// # Errors
///
/// Returns [`AggregateError::Json`] if serialization fails.
pub fn feature_collection_string(
    aggregates: &[CellAggregate],
    id_field: IdField,
    value_field: &ValueField,
) -> Result<String, AggregateError> {
    Ok(serde_json::to_string(&to_feature_collection(
        aggregates,
        id_field,
        value_field,
    ))?)
}

/// Writes the serialized feature collection into `sink`.
///
/// The bytes written are identical to [`feature_collection_string`].
///
/// # Errors
///
/// Returns [`AggregateError::Json`] if serialization or the write fails.
pub fn write_feature_collection<W: Write>(
    aggregates: &[CellAggregate],
    id_field: IdField,
    value_field: &ValueField,
    sink: W,
) -> Result<(), AggregateError> {
    let collection = to_feature_collection(aggregates, id_field, value_field);
    serde_json::to_writer(sink, &collection)?;
    Ok(())
}
