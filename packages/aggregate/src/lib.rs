#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! H3 aggregation of ADS-B observations.
//!
//! Filters observations by distance, groups the survivors by their cell id
//! at the requested resolution, tallies emitter categories per cell, drops
//! cells below the significance threshold and attaches each surviving
//! cell's boundary ring. The [`geojson`] and [`records`] modules encode the
//! result for the map layer.

pub mod geojson;
pub mod records;

use std::collections::BTreeMap;
use std::sync::Arc;

use adsb_hex_grid::{CellBoundary, GridError};
use adsb_hex_observation_models::ObservationSet;
use serde::Serialize;
use thiserror::Error;

/// Miles per degree used to turn a mile threshold into the dataset's
/// distance unit.
pub const MILES_PER_DEGREE: f64 = 69.0;

/// Errors that can occur during aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The dataset has no cell column for the requested resolution.
    #[error("Unsupported resolution {resolution}: dataset has cell columns for {available:?}")]
    UnsupportedResolution {
        /// The requested resolution.
        resolution: u8,
        /// Resolutions the dataset does have.
        available: Vec<u8>,
    },

    /// A cell id in the dataset could not be resolved to geometry.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// Encoding the result failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parameters of a single aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationRequest {
    /// Keep observations within this many miles.
    pub distance_miles: f64,
    /// H3 resolution to group by.
    pub resolution: u8,
    /// Minimum observation count for a cell to be kept.
    pub significance: u64,
}

/// Aggregated observations for one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellAggregate {
    /// Cell id.
    pub cell_id: String,
    /// Number of observations in the cell.
    pub count: u64,
    /// Observations per emitter category. Sums to `count`.
    pub category_tally: BTreeMap<String, u64>,
    /// Closed boundary ring of the cell.
    pub boundary: CellBoundary,
}

/// Runs aggregations against an injected dataset snapshot.
#[derive(Debug, Clone)]
pub struct SpatialAggregator {
    dataset: Arc<ObservationSet>,
}

impl SpatialAggregator {
    /// Creates an aggregator over `dataset`.
    #[must_use]
    pub const fn new(dataset: Arc<ObservationSet>) -> Self {
        Self { dataset }
    }

    /// The dataset this aggregator reads.
    #[must_use]
    pub fn dataset(&self) -> &ObservationSet {
        &self.dataset
    }

    /// Runs `request` against the dataset.
    ///
    /// # Errors
    ///
    /// See [`aggregate`].
    pub fn aggregate(
        &self,
        request: &AggregationRequest,
    ) -> Result<Vec<CellAggregate>, AggregateError> {
        aggregate(
            &self.dataset,
            request.distance_miles,
            request.resolution,
            request.significance,
        )
    }
}

/// Aggregates `observations` onto the cells at `resolution`.
///
/// Keeps observations with `distance <= distance_threshold_miles / 69`,
/// groups them by cell, and drops cells with fewer than `significance`
/// observations. Observations without a cell at `resolution` are skipped.
/// Cells come back in ascending cell-id order.
///
/// # Errors
///
/// * [`AggregateError::UnsupportedResolution`] if the dataset has no cell
///   column for `resolution`
/// * [`AggregateError::Grid`] if a surviving cell id is malformed
pub fn aggregate(
    observations: &ObservationSet,
    distance_threshold_miles: f64,
    resolution: u8,
    significance: u64,
) -> Result<Vec<CellAggregate>, AggregateError> {
    if !observations.supports(resolution) {
        return Err(AggregateError::UnsupportedResolution {
            resolution,
            available: observations.resolutions().iter().copied().collect(),
        });
    }

    let max_distance = distance_threshold_miles / MILES_PER_DEGREE;

    let mut groups: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();
    for obs in observations
        .observations()
        .iter()
        .filter(|obs| obs.distance <= max_distance)
    {
        let Some(cell_id) = obs.cell(resolution) else {
            continue;
        };
        *groups
            .entry(cell_id)
            .or_default()
            .entry(obs.category.as_str())
            .or_default() += 1;
    }

    let total_cells = groups.len();
    let aggregates = groups
        .into_iter()
        .filter_map(|(cell_id, tally)| {
            let count: u64 = tally.values().sum();
            (count >= significance).then_some((cell_id, count, tally))
        })
        .map(|(cell_id, count, tally)| {
            Ok(CellAggregate {
                cell_id: cell_id.to_string(),
                count,
                category_tally: tally
                    .into_iter()
                    .map(|(category, n)| (category.to_string(), n))
                    .collect(),
                boundary: adsb_hex_grid::cell_boundary(cell_id)?,
            })
        })
        .collect::<Result<Vec<_>, AggregateError>>()?;

    log::debug!(
        "aggregated resolution {resolution} within {distance_threshold_miles} mi: \
         {} of {total_cells} cells have at least {significance} observations",
        aggregates.len()
    );

    Ok(aggregates)
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use adsb_hex_observation_models::Observation;

    use super::fixtures::{RESOLUTION, cells, obs, set, tampa};
    use super::*;

    fn total(aggregates: &[CellAggregate]) -> u64 {
        aggregates.iter().map(|a| a.count).sum()
    }

    #[test]
    fn groups_counts_and_tallies_by_cell() {
        let cells = cells();
        let result = aggregate(&tampa(), 500.0, RESOLUTION, 1).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].cell_id, cells[0]);
        assert_eq!(result[0].count, 3);
        assert_eq!(
            result[0].category_tally,
            BTreeMap::from([("A1".to_string(), 2), ("A3".to_string(), 1)])
        );
        assert_eq!(result[1].count, 2);
        assert_eq!(result[2].category_tally.get("B6"), Some(&1));
        assert!(result.iter().all(|a| a.boundary.is_closed()));
    }

    #[test]
    fn counts_always_match_tallies_and_significance() {
        for significance in 0..=4 {
            let result = aggregate(&tampa(), 500.0, RESOLUTION, significance).unwrap();
            for cell in &result {
                assert!(cell.count >= significance, "{cell:?}");
                assert_eq!(cell.count, cell.category_tally.values().sum::<u64>());
            }
        }
    }

    #[test]
    fn significance_drops_sparse_cells() {
        let result = aggregate(&tampa(), 500.0, RESOLUTION, 2).unwrap();
        assert_eq!(result.len(), 2);
        let result = aggregate(&tampa(), 500.0, RESOLUTION, 4).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn distance_threshold_is_in_miles_per_degree() {
        // 69 miles keeps everything within one distance unit.
        let result = aggregate(&tampa(), 69.0, RESOLUTION, 1).unwrap();
        assert_eq!(total(&result), 2);
        let result = aggregate(&tampa(), 69.0 * 2.0, RESOLUTION, 1).unwrap();
        assert_eq!(total(&result), 4);
        let result = aggregate(&tampa(), 0.0, RESOLUTION, 1).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn widening_the_threshold_never_removes_observations() {
        let data = tampa();
        let mut previous = 0;
        for miles in [0.0, 30.0, 69.0, 100.0, 150.0, 200.0, 500.0] {
            let count = total(&aggregate(&data, miles, RESOLUTION, 0).unwrap());
            assert!(count >= previous, "{miles} mi lost observations");
            previous = count;
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let result = aggregate(&set(Vec::new()), 500.0, RESOLUTION, 1).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn missing_resolution_column_is_unsupported() {
        let err = aggregate(&tampa(), 500.0, 11, 1).unwrap_err();
        match err {
            AggregateError::UnsupportedResolution {
                resolution,
                available,
            } => {
                assert_eq!(resolution, 11);
                assert_eq!(available, vec![RESOLUTION]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rows_without_a_cell_are_skipped() {
        let cells = cells();
        let data = set(vec![obs(0.1, "A1", &cells[0]), Observation::new(0.1, "A2")]);
        let result = aggregate(&data, 500.0, RESOLUTION, 1).unwrap();
        assert_eq!(total(&result), 1);
    }

    #[test]
    fn malformed_cells_fail_only_when_they_survive() {
        let data = set(vec![obs(0.1, "A1", "bogus"), obs(10.0, "A1", "bogus")]);
        assert!(matches!(
            aggregate(&data, 500.0, RESOLUTION, 1),
            Err(AggregateError::Grid(GridError::InvalidCellId { .. }))
        ));
        assert!(aggregate(&data, 500.0, RESOLUTION, 3).unwrap().is_empty());
    }

    #[test]
    fn aggregator_reads_the_injected_snapshot() {
        let aggregator = SpatialAggregator::new(Arc::new(tampa()));
        let request = AggregationRequest {
            distance_miles: 500.0,
            resolution: RESOLUTION,
            significance: 2,
        };
        assert_eq!(aggregator.aggregate(&request).unwrap().len(), 2);
        assert_eq!(aggregator.dataset().resolutions(), &BTreeSet::from([RESOLUTION]));
    }
}
