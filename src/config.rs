use std::path::PathBuf;
use std::str::FromStr;

use log::LevelFilter;

pub const LOG_LEVEL_VAR: &str = "FILE_BRIDGE_LOG";
pub const LOG_FILE_VAR: &str = "FILE_BRIDGE_LOG_FILE";
pub const FOLLOW_LINKS_VAR: &str = "FILE_BRIDGE_FOLLOW_LINKS";

/// Runtime settings, read from the environment at startup
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub log_level: LevelFilter,
    /// Extra log destination; stderr is always written
    pub log_file: Option<PathBuf>,
    /// Follow symbolic links while listing directories
    pub follow_links: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Info,
            log_file: None,
            follow_links: false,
        }
    }
}

impl BridgeConfig {
    /// Read the process environment, returning the config and any warnings
    pub fn from_env() -> (Self, Vec<String>) {
        Self::from_lookup_with_warnings(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to the defaults; the problems are
    /// returned as warnings because the logger is not up yet at this point.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let (config, _) = Self::from_lookup_with_warnings(lookup);
        config
    }

    pub fn from_lookup_with_warnings<F>(lookup: F) -> (Self, Vec<String>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut warnings = Vec::new();

        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            match LevelFilter::from_str(level.trim()) {
                Ok(parsed) => config.log_level = parsed,
                Err(_) => warnings.push(format!(
                    "Ignoring invalid {}={:?}, using {}",
                    LOG_LEVEL_VAR, level, config.log_level
                )),
            }
        }

        config.log_file = lookup(LOG_FILE_VAR)
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        if let Some(flag) = lookup(FOLLOW_LINKS_VAR) {
            match parse_flag(&flag) {
                Some(value) => config.follow_links = value,
                None => warnings.push(format!(
                    "Ignoring invalid {}={:?}, expected true/false",
                    FOLLOW_LINKS_VAR, flag
                )),
            }
        }

        (config, warnings)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
