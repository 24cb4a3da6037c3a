/// File Bridge MCP - a Model Context Protocol server that reads Word and Excel files
/// into structured JSON

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod excel_reader;
pub mod file_listing;
pub mod formats;
pub mod logging;
pub mod mcp_handler;
pub mod ooxml;
pub mod word_reader;
pub mod xlsx_parts;

#[cfg(test)]
mod test_fixtures;

/// Re-export the server for direct usage
pub use mcp_handler::{FileBridge, start_server};

/// Re-export the dispatcher surface
pub use dispatcher::{ToolDispatcher, ToolName, ToolRequest, ToolResponse};

pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult, ErrorKind};

/// Re-export the extractors
pub use excel_reader::{ExcelReadOptions, ExcelWorkbookContent, read_excel_file};
pub use file_listing::{FileEntry, FileListing, list_supported_files};
pub use word_reader::{WordDocumentContent, WordReadOptions, read_word_document};
