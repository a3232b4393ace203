#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the ADS-B hex map toolchain.
//!
//! * `serve` starts the API server, optionally prompting for its
//!   configuration.
//! * `aggregate` runs an H3 aggregation against a dataset file and writes
//!   the `GeoJSON` result to a file or stdout.
//! * `bbox` derives the imagery bounding box and raster size for a cell.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::PathBuf;

use adsb_hex_aggregate::geojson::{IdField, ValueField, write_feature_collection};
use adsb_hex_aggregate::{AggregationRequest, SpatialAggregator};
use adsb_hex_imagery::{DEFAULT_RESOLUTION, cell_to_bbox, dimensions_for_resolution};
use adsb_hex_observation::{DatasetHandle, DatasetSource};
use adsb_hex_server::{DEFAULT_DATASET_PATH, ServerConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "adsb_hex", about = "ADS-B hex map toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server (configured from the environment)
    Serve {
        /// Prompt for bind address, port and dataset before starting
        #[arg(long)]
        interactive: bool,
    },
    /// Aggregate a dataset onto H3 cells and write `GeoJSON`
    Aggregate {
        /// Observation CSV
        #[arg(long, default_value = DEFAULT_DATASET_PATH)]
        dataset: PathBuf,
        /// Resolutions to derive from lat/lon when the CSV lacks them
        #[arg(long, value_delimiter = ',')]
        derive: Vec<u8>,
        /// Keep observations within this many miles
        #[arg(long)]
        distance: f64,
        /// H3 resolution to aggregate at
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=15))]
        resolution: u8,
        /// Minimum observations per cell
        #[arg(long, default_value_t = 1)]
        significance: u64,
        /// Feature value: `count` or `category:<name>`
        #[arg(long, default_value_t = ValueField::Count)]
        value: ValueField,
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Derive the imagery bounding box and raster size for a cell
    Bbox {
        /// H3 cell id
        #[arg(long)]
        cell: String,
        /// Half-width of the box in degrees
        #[arg(long, allow_negative_numbers = true)]
        x_adjust: f64,
        /// Half-height of the box in degrees
        #[arg(long, allow_negative_numbers = true)]
        y_adjust: f64,
        /// Starting ground resolution in meters per pixel
        #[arg(long, default_value_t = DEFAULT_RESOLUTION)]
        resolution: f64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { interactive } => {
            if interactive {
                actix_web::rt::System::new().block_on(adsb_hex_server::interactive::run())?;
            } else {
                let config = ServerConfig::from_env()?;
                actix_web::rt::System::new().block_on(adsb_hex_server::run_server(config))?;
            }
        }
        Commands::Aggregate {
            dataset,
            derive,
            distance,
            resolution,
            significance,
            value,
            out,
        } => {
            let source = DatasetSource::new(dataset).with_derived_resolutions(derive);
            let request = AggregationRequest {
                distance_miles: distance,
                resolution,
                significance,
            };
            aggregate(source, &request, &value, out)?;
        }
        Commands::Bbox {
            cell,
            x_adjust,
            y_adjust,
            resolution,
        } => bbox(&cell, x_adjust, y_adjust, resolution)?,
    }

    Ok(())
}

fn aggregate(
    source: DatasetSource,
    request: &AggregationRequest,
    value: &ValueField,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let handle = DatasetHandle::load(source)?;
    let aggregates = SpatialAggregator::new(handle.snapshot()).aggregate(request)?;
    log::info!(
        "{} cells with at least {} observations",
        aggregates.len(),
        request.significance
    );

    match out {
        Some(path) => {
            let mut sink = BufWriter::new(File::create(&path)?);
            write_feature_collection(&aggregates, IdField::CellId, value, &mut sink)?;
            sink.flush()?;
            log::info!("GeoJSON written to {}", path.display());
        }
        None => {
            let mut sink = std::io::stdout().lock();
            write_feature_collection(&aggregates, IdField::CellId, value, &mut sink)?;
            writeln!(sink)?;
        }
    }

    Ok(())
}

fn bbox(
    cell: &str,
    x_adjust: f64,
    y_adjust: f64,
    resolution: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let bbox = cell_to_bbox(cell, x_adjust, y_adjust)?;
    let sized = dimensions_for_resolution(&bbox, resolution)?;

    println!("{}", bbox.describe());
    println!(
        "Image shape at {:?} m resolution: ({}, {}) pixels",
        resolution, sized.size.width, sized.size.height
    );
    if let Some(note) = sized.correction_note() {
        println!("{note}");
    }

    Ok(())
}
