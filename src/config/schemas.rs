/// Configuration schemas - every section defined once with its defaults
///
/// Defaults mirror the values the dashboard ships with: update endpoint on
/// 8080 with five linear retries, telemetry endpoint on 8082 with a fixed
/// 3 s retry, and a 50-entry debug buffer.
use crate::config_struct;

// ============================================================================
// UPDATE CHANNEL
// ============================================================================

config_struct! {
    /// General live-update channel (flow/device state notifications)
    pub struct UpdatesConfig {
        /// WebSocket endpoint
        url: String = "ws://localhost:8080".to_string(),

        /// Attempt n waits base × n milliseconds
        reconnect_base_delay_ms: u64 = 2000,

        /// Automatic attempts before giving up until the next explicit connect
        max_reconnect_attempts: u32 = 5,
    }
}

// ============================================================================
// TELEMETRY CHANNEL
// ============================================================================

config_struct! {
    /// Debug/health telemetry channel
    pub struct TelemetryConfig {
        /// WebSocket endpoint
        url: String = "ws://localhost:8082".to_string(),

        /// Fixed delay before every reconnect attempt
        reconnect_delay_ms: u64 = 3000,

        /// Debug event buffer cap (newest first)
        max_buffered_events: usize = 50,

        /// HTTP polling feed interval
        poll_interval_ms: u64 = 2000,

        /// How far back each poll asks for events
        poll_window_ms: u64 = 60_000,
    }
}

// ============================================================================
// REST COLLABORATOR
// ============================================================================

config_struct! {
    /// REST API used for devices, flows, secrets and auth
    pub struct ApiConfig {
        base_url: String = "http://localhost:3000/api".to_string(),
        timeout_secs: u64 = 15,
    }
}

// ============================================================================
// LOGGING
// ============================================================================

config_struct! {
    pub struct LoggingConfig {
        /// error | warning | info | debug | verbose
        level: String = "info".to_string(),

        /// Tags with debug output enabled, same keys as --debug-<tag>
        debug_tags: Vec<String> = Vec::new(),

        /// Plain-text log file (empty = console only)
        file: String = String::new(),

        colors: bool = true,
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration structure containing all sections
    pub struct Config {
        updates: UpdatesConfig = UpdatesConfig::default(),
        telemetry: TelemetryConfig = TelemetryConfig::default(),
        api: ApiConfig = ApiConfig::default(),
        logging: LoggingConfig = LoggingConfig::default(),
    }
}
