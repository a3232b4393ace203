#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the ADS-B hex map.
//!
//! Serves the `/map` endpoint the map UI talks to: H3 aggregation of the
//! loaded observation dataset and imagery bounding boxes for a selected
//! cell. The dataset is loaded once at startup into a shared
//! [`DatasetHandle`] and can be reloaded through `/api/dataset/reload`
//! without restarting the server.

mod handlers;
pub mod interactive;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use adsb_hex_aggregate::AggregateError;
use adsb_hex_imagery::BboxError;
use adsb_hex_observation::{DatasetError, DatasetHandle, DatasetSource};
use adsb_hex_server_models::MapRequestError;
use thiserror::Error;

/// Environment variable holding the bind address.
pub const BIND_ADDR_ENV: &str = "BIND_ADDR";
/// Environment variable holding the port.
pub const PORT_ENV: &str = "PORT";
/// Environment variable holding the dataset path.
pub const DATASET_ENV: &str = "ADSB_DATASET";
/// Environment variable listing resolutions to derive at load time.
pub const DERIVE_RESOLUTIONS_ENV: &str = "ADSB_DERIVE_RESOLUTIONS";

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
/// Default port.
pub const DEFAULT_PORT: u16 = 5001;
/// Default dataset path.
pub const DEFAULT_DATASET_PATH: &str = "data/adsb_observations.csv";

/// Errors that can occur while configuring or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value {value:?} for {var}")]
    InvalidConfig {
        /// Variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The dataset could not be loaded.
    #[error("Failed to load dataset: {0}")]
    Dataset(#[from] DatasetError),

    /// The HTTP server failed to bind or run.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything that can go wrong serving a `/map` request.
///
/// Each variant renders as the message placed in the error payload.
#[derive(Debug, Error)]
pub enum MapError {
    /// The body is not JSON.
    #[error("Invalid JSON body: {0}")]
    Body(#[from] serde_json::Error),

    /// The body is JSON but not a recognized request.
    #[error(transparent)]
    Request(#[from] MapRequestError),

    /// Aggregation failed.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Bounding box derivation failed.
    #[error(transparent)]
    Bbox(#[from] BboxError),

    /// The worker thread running the request was lost.
    #[error("Request processing was interrupted: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl MapError {
    /// Whether the error was caused by the request rather than by the
    /// server or its data.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Body(_)
                | Self::Request(_)
                | Self::Bbox(
                    BboxError::AdjustmentOutOfRange { .. }
                        | BboxError::LatitudeOutOfRange { .. }
                        | BboxError::DegenerateBoundingBox(_)
                )
        )
    }
}

/// Shared application state.
pub struct AppState {
    /// The loaded observation dataset.
    pub dataset: Arc<DatasetHandle>,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: String,
    /// Port to listen on.
    pub port: u16,
    /// Where the dataset is loaded from.
    pub dataset: DatasetSource,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            port: DEFAULT_PORT,
            dataset: DatasetSource::new(DEFAULT_DATASET_PATH),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the environment, falling back to the
    /// defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidConfig`] if `PORT` or
    /// `ADSB_DERIVE_RESOLUTIONS` is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let bind_addr = lookup(BIND_ADDR_ENV).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let port = match lookup(PORT_ENV) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ServerError::InvalidConfig {
                    var: PORT_ENV,
                    value,
                })?,
            None => DEFAULT_PORT,
        };

        let path = lookup(DATASET_ENV).unwrap_or_else(|| DEFAULT_DATASET_PATH.to_string());
        let derive = match lookup(DERIVE_RESOLUTIONS_ENV) {
            Some(value) => {
                parse_resolutions(&value).ok_or(ServerError::InvalidConfig {
                    var: DERIVE_RESOLUTIONS_ENV,
                    value,
                })?
            }
            None => Vec::new(),
        };

        Ok(Self {
            bind_addr,
            port,
            dataset: DatasetSource::new(path).with_derived_resolutions(derive),
        })
    }
}

/// Parses a comma separated list of resolutions (`"6,7,8"`). Blank entries
/// are ignored.
#[must_use]
pub fn parse_resolutions(s: &str) -> Option<Vec<u8>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect()
}

/// Registers all routes. Shared by [`run_server`] and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/map", web::post().to(handlers::map)).service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/map", web::post().to(handlers::map))
            .route("/observations", web::get().to(handlers::observations))
            .route("/dataset/reload", web::post().to(handlers::reload)),
    );
}

/// Loads the dataset and starts the ADS-B hex map API server.
///
/// The caller is responsible for initialising logging and for providing
/// the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// * [`ServerError::Dataset`] if the dataset cannot be loaded
/// * [`ServerError::Io`] if the HTTP server fails to bind or encounters a
///   runtime error
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    log::info!("Loading dataset from {}...", config.dataset.path.display());
    let dataset = DatasetHandle::load(config.dataset)?;

    let state = web::Data::new(AppState {
        dataset: Arc::new(dataset),
    });

    let ServerConfig {
        bind_addr, port, ..
    } = config;

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ServerError> {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn unset_environment_uses_defaults() {
        assert_eq!(config(&[]).unwrap(), ServerConfig::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = config(&[
            (BIND_ADDR_ENV, "0.0.0.0"),
            (PORT_ENV, "8080"),
            (DATASET_ENV, "/srv/adsb.csv"),
            (DERIVE_RESOLUTIONS_ENV, "6, 7,8,"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.dataset.path.to_str(), Some("/srv/adsb.csv"));
        assert_eq!(config.dataset.derive_resolutions, vec![6, 7, 8]);
    }

    #[test]
    fn unparseable_values_are_reported() {
        assert!(matches!(
            config(&[(PORT_ENV, "http")]),
            Err(ServerError::InvalidConfig { var: PORT_ENV, .. })
        ));
        assert!(matches!(
            config(&[(DERIVE_RESOLUTIONS_ENV, "9,ten")]),
            Err(ServerError::InvalidConfig {
                var: DERIVE_RESOLUTIONS_ENV,
                ..
            })
        ));
    }

    #[test]
    fn resolution_lists_parse() {
        assert_eq!(parse_resolutions(""), Some(Vec::new()));
        assert_eq!(parse_resolutions("10"), Some(vec![10]));
        assert_eq!(parse_resolutions("300"), None);
    }

    #[test]
    fn invalid_boxes_are_rejections() {
        for error in [
            BboxError::LatitudeOutOfRange {
                min_y: -62.0,
                max_y: 118.0,
            },
            BboxError::DegenerateBoundingBox("0.000m x 0.000m at 1 m/px".to_string()),
        ] {
            assert!(MapError::Bbox(error).is_rejection());
        }
        assert!(!MapError::Bbox(BboxError::InvalidResolution { resolution: 0.0 }).is_rejection());
    }
}
