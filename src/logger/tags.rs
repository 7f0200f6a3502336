/// Log tags identify the subsystem a log line comes from
///
/// Each tag maps to a `--debug-<key>` command-line flag.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Relay,
    Upstream,
    Hub,
    Webserver,
    Test,
    Other(String),
}

impl LogTag {
    /// Key used by --debug-<key> / --verbose-<key> flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Relay => "relay".to_string(),
            LogTag::Upstream => "upstream".to_string(),
            LogTag::Hub => "hub".to_string(),
            LogTag::Webserver => "webserver".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    /// Uncolored label for file output
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::Other(s) => s.to_uppercase(),
            other => other.to_debug_key().to_uppercase(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
