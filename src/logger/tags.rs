/// Log tags identify the subsystem a line comes from.
///
/// The debug key of a tag is what `--debug-<key>` matches against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    Channel,
    Updates,
    Telemetry,
    Api,
    Config,
    System,
    Test,
    Other(String),
}

impl LogTag {
    /// Key used by `--debug-<key>` flags and the `logging.debug_tags` setting
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::Channel => "channel".to_string(),
            LogTag::Updates => "updates".to_string(),
            LogTag::Telemetry => "telemetry".to_string(),
            LogTag::Api => "api".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::System => "system".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(name) => name.to_lowercase(),
        }
    }

    /// Uppercase label without ANSI codes (file output)
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::Channel => "CHANNEL".to_string(),
            LogTag::Updates => "UPDATES".to_string(),
            LogTag::Telemetry => "TELEMETRY".to_string(),
            LogTag::Api => "API".to_string(),
            LogTag::Config => "CONFIG".to_string(),
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Test => "TEST".to_string(),
            LogTag::Other(name) => name.to_uppercase(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
