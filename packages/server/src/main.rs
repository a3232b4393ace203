#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Standalone entry point for the ADS-B hex map API server.
//!
//! Configuration is read from `BIND_ADDR`, `PORT`, `ADSB_DATASET` and
//! `ADSB_DERIVE_RESOLUTIONS`.

use adsb_hex_server::{ServerConfig, ServerError, run_server};

#[actix_web::main]
async fn main() -> Result<(), ServerError> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    run_server(ServerConfig::from_env()?).await
}
