use anyhow::{Context, Result};

use crate::config::BridgeConfig;

/// Install the global logger.
///
/// stdout carries the MCP protocol, so records go to stderr and, when
/// configured, to an append-only log file.
pub fn init_logging(config: &BridgeConfig) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{} {}] {}",
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(config.log_level)
        .chain(std::io::stderr());

    if let Some(path) = &config.log_file {
        let file = fern::log_file(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        dispatch = dispatch.chain(file);
    }

    dispatch
        .apply()
        .context("A global logger was already installed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn test_records_reach_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.log");
        let config = BridgeConfig {
            log_level: LevelFilter::Debug,
            log_file: Some(path.clone()),
            follow_links: false,
        };

        init_logging(&config).unwrap();
        log::debug!("listing fixture directory");
        log::logger().flush();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[DEBUG file_bridge_mcp::logging::tests] listing fixture directory"), "{}", written);

        // a second install is refused
        assert!(init_logging(&config).is_err());
    }
}
