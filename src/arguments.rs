/// Centralized argument handling for flowwire
///
/// Debug flags are read straight from the process arguments so that library
/// code (logger, channels) can check them without threading a parsed CLI
/// struct through every constructor. The binary still parses its
/// subcommands with clap; these helpers only look for the flags.
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
/// Tests and embedding applications may override it with `set_cmd_args`.
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

/// Connection and resilient channel internals
pub fn is_debug_channel_enabled() -> bool {
    has_arg("--debug-channel")
}

/// General update channel dispatch
pub fn is_debug_updates_enabled() -> bool {
    has_arg("--debug-updates")
}

/// Debug/health telemetry channel and polling feed
pub fn is_debug_telemetry_enabled() -> bool {
    has_arg("--debug-telemetry")
}

/// REST collaborator requests
pub fn is_debug_api_enabled() -> bool {
    has_arg("--debug-api")
}

/// Configuration loading
pub fn is_debug_config_enabled() -> bool {
    has_arg("--debug-config")
}

pub fn is_debug_system_enabled() -> bool {
    has_arg("--debug-system")
}

/// Gets a list of all enabled debug modes
pub fn get_enabled_debug_modes() -> Vec<&'static str> {
    let checks: [(&'static str, fn() -> bool); 6] = [
        ("channel", is_debug_channel_enabled),
        ("updates", is_debug_updates_enabled),
        ("telemetry", is_debug_telemetry_enabled),
        ("api", is_debug_api_enabled),
        ("config", is_debug_config_enabled),
        ("system", is_debug_system_enabled),
    ];

    checks
        .iter()
        .filter(|(_, enabled)| enabled())
        .map(|(name, _)| *name)
        .collect()
}
