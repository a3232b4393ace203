//! Tabular encodings of cell aggregates for the map UI.
//!
//! * [`records_json`] is the `h3_df` table: one JSON record per cell.
//! * [`geodataframe_json`] is the `h3_gdf` table: a `FeatureCollection`
//!   whose features are keyed by row index and carry every column as a
//!   property.

use adsb_hex_observation_models::cell_column;
use geojson::{Feature, FeatureCollection, JsonObject, feature::Id};
use serde::ser::SerializeMap as _;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::geojson::boundary_geometry;
use crate::{AggregateError, CellAggregate};

/// Name of the count column.
pub const COUNT_COLUMN: &str = "count";
/// Name of the per-category tally column.
pub const CATEGORY_COLUMN: &str = "category";

struct Record<'a> {
    cell_column: &'a str,
    aggregate: &'a CellAggregate,
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(self.cell_column, &self.aggregate.cell_id)?;
        map.serialize_entry(COUNT_COLUMN, &self.aggregate.count)?;
        map.serialize_entry(CATEGORY_COLUMN, &self.aggregate.category_tally)?;
        map.end()
    }
}

/// Encodes aggregates as a JSON array of records keyed by
/// `H3_{resolution}_cell`, `count` and `category`.
///
/// # Errors
///
/// Returns [`AggregateError::Json`] if serialization fails.
pub fn records_json(
    aggregates: &[CellAggregate],
    resolution: u8,
) -> Result<String, AggregateError> {
    let cell_column = cell_column(resolution);
    let records: Vec<Record<'_>> = aggregates
        .iter()
        .map(|aggregate| Record {
            cell_column: &cell_column,
            aggregate,
        })
        .collect();
    Ok(serde_json::to_string(&records)?)
}

/// Builds the `h3_gdf` feature collection.
///
/// Feature ids are the row index as a string (`"0"`, `"1"`, ...).
///
/// # Errors
///
/// Returns [`AggregateError::Json`] if a column cannot be converted to JSON.
pub fn geodataframe(
    aggregates: &[CellAggregate],
    resolution: u8,
) -> Result<FeatureCollection, AggregateError> {
    let cell_column = cell_column(resolution);
    let features = aggregates
        .iter()
        .enumerate()
        .map(|(row, aggregate)| {
            let mut properties = JsonObject::new();
            properties.insert(cell_column.clone(), Value::from(aggregate.cell_id.as_str()));
            properties.insert(COUNT_COLUMN.to_string(), Value::from(aggregate.count));
            properties.insert(
                CATEGORY_COLUMN.to_string(),
                serde_json::to_value(&aggregate.category_tally)?,
            );

            Ok(Feature {
                bbox: None,
                geometry: Some(boundary_geometry(&aggregate.boundary)),
                id: Some(Id::String(row.to_string())),
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect::<Result<Vec<_>, AggregateError>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Serializes [`geodataframe`] to a string.
///
/// # Errors
///
/// Returns [`AggregateError::Json`] if serialization fails.
pub fn geodataframe_json(
    aggregates: &[CellAggregate],
    resolution: u8,
) -> Result<String, AggregateError> {
    Ok(serde_json::to_string(&geodataframe(aggregates, resolution)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate;
    use crate::fixtures::{RESOLUTION, cells, tampa};

    #[test]
    fn records_are_keyed_by_resolution_column() {
        let aggregates = aggregate(&tampa(), 500.0, RESOLUTION, 2).unwrap();
        let json: Value = serde_json::from_str(&records_json(&aggregates, RESOLUTION).unwrap())
            .unwrap();
        let cells = cells();

        assert_eq!(
            json,
            serde_json::json!([
                {"H3_9_cell": cells[0], "count": 3, "category": {"A1": 2, "A3": 1}},
                {"H3_9_cell": cells[1], "count": 2, "category": {"A7": 2}},
            ])
        );
    }

    #[test]
    fn empty_records_are_an_empty_array() {
        assert_eq!(records_json(&[], RESOLUTION).unwrap(), "[]");
    }

    #[test]
    fn geodataframe_uses_row_index_ids_and_all_columns() {
        let aggregates = aggregate(&tampa(), 500.0, RESOLUTION, 1).unwrap();
        let collection = geodataframe(&aggregates, RESOLUTION).unwrap();

        assert_eq!(collection.features.len(), 3);
        for (row, (feature, aggregate)) in collection.features.iter().zip(&aggregates).enumerate()
        {
            assert_eq!(feature.id, Some(Id::String(row.to_string())));
            assert_eq!(
                feature.property("H3_9_cell"),
                Some(&Value::from(aggregate.cell_id.as_str()))
            );
            assert_eq!(feature.property("count"), Some(&Value::from(aggregate.count)));
            assert!(feature.property("category").is_some_and(Value::is_object));
            assert!(feature.geometry.is_some());
        }
    }

    #[test]
    fn geodataframe_json_parses_as_feature_collection() {
        let aggregates = aggregate(&tampa(), 500.0, RESOLUTION, 1).unwrap();
        let json = geodataframe_json(&aggregates, RESOLUTION).unwrap();
        let parsed: FeatureCollection = json.parse::<geojson::GeoJson>().unwrap().try_into().unwrap();
        assert_eq!(parsed.features.len(), aggregates.len());
    }
}
