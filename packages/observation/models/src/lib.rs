#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! ADS-B observation records and dataset schema types.
//!
//! An observation is a single aircraft position report that has already
//! been reduced to a distance value, an emitter category (`A1`, `B6`, ...)
//! and one precomputed H3 cell id per supported resolution. The dataset is
//! loaded once and shared read-only; these types never change after
//! construction.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::SerializeMap as _;
use serde::{Serialize, Serializer};

/// Name of the distance column.
pub const DISTANCE_COLUMN: &str = "distance";
/// Name of the emitter category column.
pub const CATEGORY_COLUMN: &str = "category";
/// Name of the optional latitude column.
pub const LAT_COLUMN: &str = "lat";
/// Name of the optional longitude column.
pub const LON_COLUMN: &str = "lon";

/// Column name holding the cell id at `resolution` (e.g. `H3_10_cell`).
#[must_use]
pub fn cell_column(resolution: u8) -> String {
    format!("H3_{resolution}_cell")
}

/// Parses a cell column name back into its resolution.
#[must_use]
pub fn parse_cell_column(name: &str) -> Option<u8> {
    name.strip_prefix("H3_")?
        .strip_suffix("_cell")?
        .parse()
        .ok()
}

/// A single ADS-B observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Distance value in the dataset's unit.
    pub distance: f64,
    /// Emitter category label.
    pub category: String,
    /// Latitude, when the dataset carries raw positions.
    pub lat: Option<f64>,
    /// Longitude, when the dataset carries raw positions.
    pub lon: Option<f64>,
    /// Cell id per resolution. A resolution missing here means the row has
    /// no cell at that resolution.
    pub cells: BTreeMap<u8, String>,
}

impl Observation {
    /// Creates an observation without position or cells.
    #[must_use]
    pub fn new(distance: f64, category: impl Into<String>) -> Self {
        Self {
            distance,
            category: category.into(),
            lat: None,
            lon: None,
            cells: BTreeMap::new(),
        }
    }

    /// Adds the cell id at `resolution`.
    #[must_use]
    pub fn with_cell(mut self, resolution: u8, cell_id: impl Into<String>) -> Self {
        self.cells.insert(resolution, cell_id.into());
        self
    }

    /// Sets the raw position.
    #[must_use]
    pub const fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    /// The cell id at `resolution`, if any.
    #[must_use]
    pub fn cell(&self, resolution: u8) -> Option<&str> {
        self.cells.get(&resolution).map(String::as_str)
    }
}

/// Serializes as a flat record using the dataset's column names.
impl Serialize for Observation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(DISTANCE_COLUMN, &self.distance)?;
        map.serialize_entry(CATEGORY_COLUMN, &self.category)?;
        if let Some(lat) = self.lat {
            map.serialize_entry(LAT_COLUMN, &lat)?;
        }
        if let Some(lon) = self.lon {
            map.serialize_entry(LON_COLUMN, &lon)?;
        }
        for (resolution, cell_id) in &self.cells {
            map.serialize_entry(&cell_column(*resolution), cell_id)?;
        }
        map.end()
    }
}

/// An immutable set of observations plus its schema.
///
/// The schema (which resolutions have a cell column) is known even when
/// the set holds no rows, so an empty dataset can still tell a supported
/// resolution from an unsupported one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSet {
    resolutions: BTreeSet<u8>,
    observations: Vec<Observation>,
}

impl ObservationSet {
    /// Creates a set with the given schema and rows.
    #[must_use]
    pub const fn new(resolutions: BTreeSet<u8>, observations: Vec<Observation>) -> Self {
        Self {
            resolutions,
            observations,
        }
    }

    /// Resolutions that have a cell column.
    #[must_use]
    pub const fn resolutions(&self) -> &BTreeSet<u8> {
        &self.resolutions
    }

    /// Whether the schema has a cell column for `resolution`.
    #[must_use]
    pub fn supports(&self, resolution: u8) -> bool {
        self.resolutions.contains(&resolution)
    }

    /// All rows, in load order.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the set holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
