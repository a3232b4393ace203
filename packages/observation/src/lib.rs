#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! ADS-B observation dataset loading and the shared dataset handle.
//!
//! The dataset is read once at startup into an immutable
//! [`ObservationSet`] and handed to consumers through a [`DatasetHandle`].
//! Consumers take an `Arc` snapshot per request; [`DatasetHandle::reload`]
//! swaps in a freshly read snapshot without disturbing requests that still
//! hold the old one.

pub mod load;

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use adsb_hex_grid::GridError;
use adsb_hex_observation_models::ObservationSet;
use thiserror::Error;

pub use load::{header_for, load_csv, read_csv};

/// Errors that can occur while loading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The dataset file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV is malformed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the header.
    #[error("Missing column: {column}")]
    MissingColumn {
        /// Name of the missing column.
        column: String,
    },

    /// A field could not be parsed.
    #[error("Invalid value {value:?} for column {column} on line {line}")]
    Parse {
        /// 1-based line number (the header is line 1).
        line: usize,
        /// Column name.
        column: String,
        /// The raw field.
        value: String,
    },

    /// A cell id could not be derived from a position.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// The handle was built from an in-memory set and has no file to
    /// reload from.
    #[error("Dataset has no source file to reload from")]
    NotReloadable,
}

/// Where a dataset is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSource {
    /// Path to the CSV file.
    pub path: PathBuf,
    /// Resolutions to derive from `lat`/`lon` when not exported.
    pub derive_resolutions: Vec<u8>,
}

impl DatasetSource {
    /// Creates a source with no derived resolutions.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            derive_resolutions: Vec::new(),
        }
    }

    /// Sets the resolutions to derive at load time.
    #[must_use]
    pub fn with_derived_resolutions(mut self, resolutions: Vec<u8>) -> Self {
        self.derive_resolutions = resolutions;
        self
    }

    /// Reads the dataset.
    ///
    /// # Errors
    ///
    /// See [`load_csv`].
    pub fn read(&self) -> Result<ObservationSet, DatasetError> {
        load_csv(&self.path, &self.derive_resolutions)
    }
}

/// Shared read-only dataset with an explicit load/reload lifecycle.
///
/// * [`DatasetHandle::load`] reads the source once.
/// * [`DatasetHandle::snapshot`] returns the current set; the snapshot stays
///   valid for as long as the caller holds it.
/// * [`DatasetHandle::reload`] re-reads the source and replaces the current
///   set. On failure the previous set stays in place.
#[derive(Debug)]
pub struct DatasetHandle {
    source: Option<DatasetSource>,
    current: RwLock<Arc<ObservationSet>>,
}

impl DatasetHandle {
    /// Loads the dataset from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the source cannot be read.
    pub fn load(source: DatasetSource) -> Result<Self, DatasetError> {
        let set = source.read()?;
        Ok(Self {
            source: Some(source),
            current: RwLock::new(Arc::new(set)),
        })
    }

    /// Wraps an in-memory set. Such a handle cannot be reloaded.
    #[must_use]
    pub fn from_set(set: ObservationSet) -> Self {
        Self {
            source: None,
            current: RwLock::new(Arc::new(set)),
        }
    }

    /// The source this handle reloads from, if any.
    #[must_use]
    pub const fn source(&self) -> Option<&DatasetSource> {
        self.source.as_ref()
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ObservationSet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-reads the source and swaps in the new set.
    ///
    /// # Errors
    ///
    /// * [`DatasetError::NotReloadable`] for handles built with
    ///   [`DatasetHandle::from_set`]
    /// * any error from reading the source; the current set is kept
    pub fn reload(&self) -> Result<Arc<ObservationSet>, DatasetError> {
        let source = self.source.as_ref().ok_or(DatasetError::NotReloadable)?;
        let set = Arc::new(source.read()?);

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = set.clone();
        log::info!("Reloaded dataset: {} observations", set.len());

        Ok(set)
    }
}
