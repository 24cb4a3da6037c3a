use anyhow::Result;
use tokio::runtime::Runtime;

use file_bridge_mcp::config::BridgeConfig;
use file_bridge_mcp::logging::init_logging;
use file_bridge_mcp::mcp_handler;

fn main() -> Result<()> {
    let (config, warnings) = BridgeConfig::from_env();
    init_logging(&config)?;
    for warning in warnings {
        log::warn!("{}", warning);
    }

    // Create a Tokio runtime for async operations
    let rt = Runtime::new()?;

    // Run the RMCP server in the Tokio runtime
    rt.block_on(async { mcp_handler::start_server(config).await })?;

    Ok(())
}
