//! Interactive mode for the server.
//!
//! Prompts for bind address, port and dataset before starting the server.
//! Defaults come from the environment, so pressing enter through every
//! prompt behaves like a plain start.

use dialoguer::{Confirm, Input};

use crate::{ServerConfig, ServerError, parse_resolutions};

/// Runs the server in interactive mode, prompting for configuration.
///
/// # Errors
///
/// * [`ServerError::InvalidConfig`] if the environment defaults cannot be
///   parsed
/// * any error from [`super::run_server`]
#[allow(clippy::future_not_send)]
pub async fn run() -> Result<(), ServerError> {
    let defaults = ServerConfig::from_env()?;

    println!("ADS-B Hex Map Server");
    println!();

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default(defaults.bind_addr.clone())
        .interact_text()
        .unwrap_or_else(|_| defaults.bind_addr.clone());

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(defaults.port)
        .interact_text()
        .unwrap_or(defaults.port);

    let dataset_path: String = Input::new()
        .with_prompt("Dataset CSV")
        .default(defaults.dataset.path.display().to_string())
        .interact_text()
        .unwrap_or_else(|_| defaults.dataset.path.display().to_string());

    let derive_default = defaults
        .dataset
        .derive_resolutions
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let derive: String = Input::new()
        .with_prompt("Resolutions to derive from lat/lon (comma separated, blank for none)")
        .default(derive_default.clone())
        .allow_empty(true)
        .validate_with(|input: &String| {
            parse_resolutions(input)
                .map(|_| ())
                .ok_or("expected a comma separated list of resolutions")
        })
        .interact_text()
        .unwrap_or(derive_default);

    let config = ServerConfig {
        bind_addr,
        port,
        dataset: adsb_hex_observation::DatasetSource::new(dataset_path)
            .with_derived_resolutions(parse_resolutions(&derive).unwrap_or_default()),
    };

    if !Confirm::new()
        .with_prompt(format!(
            "Start server on {}:{} with {}?",
            config.bind_addr,
            config.port,
            config.dataset.path.display()
        ))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server(config).await
}
