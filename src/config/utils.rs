use super::schemas::Config;
/// Configuration utilities - loading, reloading, and access helpers
///
/// - Loading configuration from disk (TOML) with defaults for missing keys
/// - Environment overrides for the three endpoints
/// - Hot-reloading at runtime
/// - Thread-safe access helpers
use once_cell::sync::OnceCell;
use std::sync::RwLock;
use url::Url;

use crate::arguments::is_debug_config_enabled;
use crate::logger::{self, LogTag};

/// Global configuration instance
///
/// Uninitialized reads fall back to defaults, so library users that never
/// call `load_config` still get the stock endpoints.
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/flowwire.toml";

/// Environment variables that override endpoint settings
pub const ENV_UPDATES_URL: &str = "FLOWWIRE_UPDATES_URL";
pub const ENV_TELEMETRY_URL: &str = "FLOWWIRE_TELEMETRY_URL";
pub const ENV_API_URL: &str = "FLOWWIRE_API_URL";

/// Load configuration from the default path
pub fn load_config() -> Result<(), String> {
    load_config_from_path(CONFIG_FILE_PATH)
}

/// Load configuration from a specific file path and initialize CONFIG
///
/// A missing file is not an error: defaults are used.
pub fn load_config_from_path(path: &str) -> Result<(), String> {
    let config = read_config_file(path)?;

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| "Config already initialized".to_string())?;

    Ok(())
}

/// Reload configuration from a specific file path
pub fn reload_config_from_path(path: &str) -> Result<(), String> {
    let new_config = read_config_file(path)?;

    let config_lock = CONFIG.get_or_init(|| RwLock::new(Config::default()));
    let mut config = config_lock
        .write()
        .map_err(|e| format!("Failed to acquire config write lock: {}", e))?;
    *config = new_config;

    logger::info(LogTag::Config, &format!("Configuration reloaded from {}", path));
    Ok(())
}

fn read_config_file(path: &str) -> Result<Config, String> {
    let mut config = if std::path::Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;
        parse_config(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path, e))?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path),
        );
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;

    if is_debug_config_enabled() {
        logger::debug(LogTag::Config, &format!("Effective configuration: {:?}", config));
    }

    Ok(config)
}

/// Parse a TOML document; absent keys take their defaults
pub fn parse_config(contents: &str) -> Result<Config, String> {
    toml::from_str::<Config>(contents).map_err(|e| e.to_string())
}

/// Apply endpoint overrides from a variable lookup (normally the process env)
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_UPDATES_URL).filter(|v| !v.is_empty()) {
        config.updates.url = url;
    }
    if let Some(url) = lookup(ENV_TELEMETRY_URL).filter(|v| !v.is_empty()) {
        config.telemetry.url = url;
    }
    if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
        config.api.base_url = url;
    }
}

/// Reject values the channels cannot work with
pub fn validate_config(config: &Config) -> Result<(), String> {
    validate_url(&config.updates.url, &["ws", "wss"], "updates.url")?;
    validate_url(&config.telemetry.url, &["ws", "wss"], "telemetry.url")?;
    validate_url(&config.api.base_url, &["http", "https"], "api.base_url")?;

    if config.telemetry.max_buffered_events == 0 {
        return Err("telemetry.max_buffered_events must be at least 1".to_string());
    }
    if config.telemetry.reconnect_delay_ms == 0 {
        return Err("telemetry.reconnect_delay_ms must be greater than 0".to_string());
    }
    if config.updates.reconnect_base_delay_ms == 0 {
        return Err("updates.reconnect_base_delay_ms must be greater than 0".to_string());
    }
    if config.telemetry.poll_interval_ms == 0 {
        return Err("telemetry.poll_interval_ms must be greater than 0".to_string());
    }

    Ok(())
}

fn validate_url(value: &str, schemes: &[&str], field: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("{}: invalid URL '{}': {}", field, value, e))?;
    if !schemes.contains(&url.scheme()) {
        return Err(format!(
            "{}: unsupported scheme '{}' (expected one of {:?})",
            field,
            url.scheme(),
            schemes
        ));
    }
    Ok(())
}

/// Execute a function with read access to the configuration
///
/// ```ignore
/// let url = with_config(|cfg| cfg.telemetry.url.clone());
/// ```
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let config_lock = CONFIG.get_or_init(|| RwLock::new(Config::default()));
    match config_lock.read() {
        Ok(config) => f(&config),
        // a writer panicked mid-reload; the data itself is still a whole Config
        Err(poisoned) => f(&poisoned.into_inner()),
    }
}

/// Get a clone of the entire configuration (for use across await points)
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

/// Save the current configuration to disk
pub fn save_config(path: Option<&str>) -> Result<(), String> {
    let path = path.unwrap_or(CONFIG_FILE_PATH);

    let config_str = with_config(|cfg| {
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))
    })?;

    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
    }

    std::fs::write(path, config_str)
        .map_err(|e| format!("Failed to write config file '{}': {}", path, e))?;

    Ok(())
}
