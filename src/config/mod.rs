//! Configuration system
//!
//! One TOML file, four sections (`updates`, `telemetry`, `api`, `logging`),
//! held in a process-wide lock and read through `with_config`.

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{ApiConfig, Config, LoggingConfig, TelemetryConfig, UpdatesConfig};
pub use utils::{
    get_config_clone, load_config, load_config_from_path, parse_config,
    reload_config_from_path, save_config, validate_config, with_config, CONFIG_FILE_PATH,
};
