//! CSV dataset loading.
//!
//! The dataset is a CSV export with a `distance` column, a `category`
//! column, one `H3_{res}_cell` column per precomputed resolution and
//! optionally raw `lat`/`lon` columns. Resolutions missing from the export
//! can be derived from the raw position at load time.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use adsb_hex_observation_models::{
    CATEGORY_COLUMN, DISTANCE_COLUMN, LAT_COLUMN, LON_COLUMN, Observation, ObservationSet,
    cell_column, parse_cell_column,
};
use csv::StringRecord;

use crate::DatasetError;

/// Column positions resolved from the CSV header.
struct Columns {
    distance: usize,
    category: usize,
    lat: Option<usize>,
    lon: Option<usize>,
    cells: Vec<(u8, usize)>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, DatasetError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let distance = find(DISTANCE_COLUMN).ok_or_else(|| DatasetError::MissingColumn {
            column: DISTANCE_COLUMN.to_string(),
        })?;
        let category = find(CATEGORY_COLUMN).ok_or_else(|| DatasetError::MissingColumn {
            column: CATEGORY_COLUMN.to_string(),
        })?;

        let cells = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| parse_cell_column(name.trim()).map(|res| (res, idx)))
            .collect();

        Ok(Self {
            distance,
            category,
            lat: find(LAT_COLUMN),
            lon: find(LON_COLUMN),
            cells,
        })
    }
}

/// Reads a dataset from a CSV file.
///
/// # Errors
///
/// See [`read_csv`]; additionally [`DatasetError::Io`] if the file cannot
/// be opened.
pub fn load_csv(path: &Path, derive_resolutions: &[u8]) -> Result<ObservationSet, DatasetError> {
    log::info!("Loading observations from {}", path.display());
    let file = std::fs::File::open(path)?;
    let set = read_csv(file, derive_resolutions)?;
    log::info!(
        "Loaded {} observations with cell resolutions {:?}",
        set.len(),
        set.resolutions()
    );
    Ok(set)
}

/// Reads a dataset from CSV.
///
/// `derive_resolutions` lists resolutions to compute from `lat`/`lon` when
/// the CSV has no cell column for them; resolutions already present are
/// left as exported.
///
/// # Errors
///
/// * [`DatasetError::MissingColumn`] if `distance` or `category` is absent,
///   or a derivation is requested without `lat`/`lon` columns
/// * [`DatasetError::Parse`] if a numeric field does not parse
/// * [`DatasetError::Grid`] if a position cannot be indexed
/// * [`DatasetError::Csv`] on malformed CSV
pub fn read_csv<R: Read>(
    reader: R,
    derive_resolutions: &[u8],
) -> Result<ObservationSet, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut resolutions: BTreeSet<u8> = columns.cells.iter().map(|(res, _)| *res).collect();
    let derived: Vec<u8> = derive_resolutions
        .iter()
        .copied()
        .filter(|res| !resolutions.contains(res))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let position = if derived.is_empty() {
        None
    } else {
        match (columns.lat, columns.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            (None, _) => {
                return Err(DatasetError::MissingColumn {
                    column: LAT_COLUMN.to_string(),
                });
            }
            (_, None) => {
                return Err(DatasetError::MissingColumn {
                    column: LON_COLUMN.to_string(),
                });
            }
        }
    };
    if !derived.is_empty() {
        log::info!("Deriving cell columns for resolutions {derived:?} from lat/lon");
    }
    resolutions.extend(derived.iter().copied());

    let mut observations = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let line = idx + 2;

        let distance = parse_f64(&record, columns.distance, DISTANCE_COLUMN, line)?;
        let category = field(&record, columns.category).to_string();
        let lat = columns
            .lat
            .map(|i| parse_optional_f64(&record, i, LAT_COLUMN, line))
            .transpose()?
            .flatten();
        let lon = columns
            .lon
            .map(|i| parse_optional_f64(&record, i, LON_COLUMN, line))
            .transpose()?
            .flatten();

        let mut cells = BTreeMap::new();
        for &(res, col) in &columns.cells {
            let value = field(&record, col);
            if !value.is_empty() {
                cells.insert(res, value.to_string());
            }
        }

        if position.is_some() {
            if let (Some(lat), Some(lon)) = (lat, lon) {
                for &res in &derived {
                    cells.insert(res, adsb_hex_grid::cell_for_point(lat, lon, res)?);
                }
            } else {
                log::debug!("Line {line} has no position; skipping cell derivation");
            }
        }

        observations.push(Observation {
            distance,
            category,
            lat,
            lon,
            cells,
        });
    }

    Ok(ObservationSet::new(resolutions, observations))
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or_default().trim()
}

fn parse_f64(
    record: &StringRecord,
    idx: usize,
    column: &str,
    line: usize,
) -> Result<f64, DatasetError> {
    let value = field(record, idx);
    value.parse().map_err(|_| DatasetError::Parse {
        line,
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn parse_optional_f64(
    record: &StringRecord,
    idx: usize,
    column: &str,
    line: usize,
) -> Result<Option<f64>, DatasetError> {
    if field(record, idx).is_empty() {
        Ok(None)
    } else {
        parse_f64(record, idx, column, line).map(Some)
    }
}

/// Column header for a dataset with the given resolutions, in load order.
///
/// Used to write datasets in the format [`read_csv`] accepts.
#[must_use]
pub fn header_for(resolutions: &BTreeSet<u8>, with_position: bool) -> Vec<String> {
    let mut header = vec![DISTANCE_COLUMN.to_string(), CATEGORY_COLUMN.to_string()];
    if with_position {
        header.push(LAT_COLUMN.to_string());
        header.push(LON_COLUMN.to_string());
    }
    header.extend(resolutions.iter().map(|res| cell_column(*res)));
    header
}
