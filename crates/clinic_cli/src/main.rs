//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `clinic_core` linkage with a deterministic ping/version probe.
//! - Given a config path, open the configured database and print the
//!   panoramic board as JSON.

use clinic_core::{
    init_logging_from_config, open_db, ClinicConfig, PanoramicService, Principal, Role,
    SqliteStore,
};
use std::process::ExitCode;

const CLI_PRINCIPAL_ID: &str = "cli";

fn main() -> ExitCode {
    println!("clinic_core ping={}", clinic_core::ping());
    println!("clinic_core version={}", clinic_core::core_version());

    let Some(config_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match dump_panoramic(&config_path) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("clinic_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn dump_panoramic(config_path: &str) -> Result<String, String> {
    let config = ClinicConfig::load(config_path).map_err(|err| err.to_string())?;
    init_logging_from_config(&config).map_err(|err| err.to_string())?;

    let conn = open_db(&config.db_path).map_err(|err| err.to_string())?;
    let store = SqliteStore::try_new(&conn).map_err(|err| err.to_string())?;
    let principal = Principal::new(CLI_PRINCIPAL_ID, Role::Administrator);
    let view = PanoramicService::new(store)
        .panoramic(&principal)
        .map_err(|err| err.to_string())?;
    serde_json::to_string_pretty(&view).map_err(|err| err.to_string())
}
