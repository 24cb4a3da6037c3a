//! Tool routing: argument validation, extractor dispatch and the result envelope.

use std::path::Path;

use rmcp::schemars::{self, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult, ErrorKind};
use crate::excel_reader::{ExcelReadOptions, read_excel_file};
use crate::file_listing::list_supported_files;
use crate::formats::{DocumentKind, SUPPORTED_FORMATS, formats_as_json, validate_file_path};
use crate::word_reader::{WordReadOptions, read_word_document};

/// The fixed set of tools the bridge exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    ReadDocument,
    ReadWordDocument,
    ReadExcelFile,
    ListSupportedFiles,
    GetSupportedFormats,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::ReadDocument,
        ToolName::ReadWordDocument,
        ToolName::ReadExcelFile,
        ToolName::ListSupportedFiles,
        ToolName::GetSupportedFormats,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ReadDocument => "read_document",
            ToolName::ReadWordDocument => "read_word_document",
            ToolName::ReadExcelFile => "read_excel_file",
            ToolName::ListSupportedFiles => "list_supported_files",
            ToolName::GetSupportedFormats => "get_supported_formats",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::ReadDocument => {
                "Read a Word (.docx) or Excel (.xlsx, .xls, .xlsm) file, choosing the reader from the file extension"
            }
            ToolName::ReadWordDocument => {
                "Read a Word document (.docx) into paragraphs, tables and document properties"
            }
            ToolName::ReadExcelFile => {
                "Read an Excel workbook (.xlsx, .xls, .xlsm) into cells, formulas, formatting and data validation rules"
            }
            ToolName::ListSupportedFiles => "Recursively list the supported documents in a directory",
            ToolName::GetSupportedFormats => "List the file formats this server can read",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_directory() -> String {
    ".".to_string()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadDocumentArgs {
    /// Path to the .docx, .xlsx, .xls or .xlsm file
    pub file_path: String,
    /// Include paragraph and cell formatting (Word default: false, Excel default: true)
    #[serde(default)]
    pub include_formatting: Option<bool>,
    /// Include Excel formulas (default: true)
    #[serde(default)]
    pub include_formulas: Option<bool>,
    /// Include Excel data validation rules (default: true)
    #[serde(default)]
    pub include_validation: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadWordDocumentArgs {
    /// Path to the .docx file
    pub file_path: String,
    /// Include paragraph styles and run formatting
    #[serde(default)]
    pub include_formatting: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadExcelFileArgs {
    /// Path to the .xlsx, .xls or .xlsm file
    pub file_path: String,
    /// Include cell formatting
    #[serde(default = "default_true")]
    pub include_formatting: bool,
    /// Include cell formulas
    #[serde(default = "default_true")]
    pub include_formulas: bool,
    /// Include data validation rules
    #[serde(default = "default_true")]
    pub include_validation: bool,
}

impl From<&ReadExcelFileArgs> for ExcelReadOptions {
    fn from(args: &ReadExcelFileArgs) -> Self {
        Self {
            include_formatting: args.include_formatting,
            include_formulas: args.include_formulas,
            include_validation: args.include_validation,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListSupportedFilesArgs {
    /// Directory to search (default: current directory)
    #[serde(default = "default_directory")]
    pub directory_path: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetSupportedFormatsArgs {}

/// A tool invocation: the tool name and its JSON arguments
#[derive(Debug, Clone, Default)]
pub struct ToolRequest {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolRequest {
    pub fn new(name: impl Into<String>, arguments: Option<Map<String, Value>>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.unwrap_or_default(),
        }
    }
}

/// Result envelope returned for every tool call.
///
/// Exactly one of `content` and `error` is set, matching `success`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub file_path: Option<String>,
    pub content: Option<Value>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ToolResponse {
    pub fn success(file_path: Option<String>, content: Value) -> Self {
        Self {
            success: true,
            file_path,
            content: Some(content),
            error: None,
            error_kind: None,
        }
    }

    pub fn failure(file_path: Option<String>, error: &BridgeError) -> Self {
        Self {
            success: false,
            file_path,
            content: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
        }
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| serialization_failure(&e.to_string()))
    }
}

/// Envelope emitted when a response itself cannot be serialized
fn serialization_failure(message: &str) -> String {
    json!({
        "success": false,
        "file_path": null,
        "content": null,
        "error": format!("Failed to serialize response: {}", message),
        "error_kind": ErrorKind::FormatError,
    })
    .to_string()
}

fn parse_arguments<T: DeserializeOwned>(arguments: &Map<String, Value>) -> BridgeResult<T> {
    serde_json::from_value(Value::Object(arguments.clone())).map_err(|e| BridgeError::Argument(e.to_string()))
}

fn require_path<'a>(name: &str, value: &'a str) -> BridgeResult<&'a str> {
    if value.trim().is_empty() {
        return Err(BridgeError::Argument(format!("{} must not be empty", name)));
    }
    Ok(value)
}

fn to_content<T: Serialize>(content: &T) -> BridgeResult<Value> {
    serde_json::to_value(content).map_err(|e| BridgeError::Format(format!("Failed to serialize result: {}", e)))
}

/// Routes tool requests to the extractors and wraps every outcome in a [`ToolResponse`]
#[derive(Debug, Clone, Default)]
pub struct ToolDispatcher {
    config: BridgeConfig,
}

impl ToolDispatcher {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Run one tool call. Never panics on bad input; all failures become envelopes.
    pub fn dispatch(&self, request: &ToolRequest) -> ToolResponse {
        let path_hint = ["file_path", "directory_path"]
            .iter()
            .find_map(|key| request.arguments.get(*key))
            .and_then(Value::as_str)
            .map(str::to_string);

        match self.run(request) {
            Ok((file_path, content)) => {
                log::info!("{} succeeded for {}", request.name, file_path.as_deref().unwrap_or("-"));
                ToolResponse::success(file_path, content)
            }
            Err(e) => {
                log::warn!("{} failed: {}", request.name, e);
                ToolResponse::failure(path_hint, &e)
            }
        }
    }

    fn run(&self, request: &ToolRequest) -> BridgeResult<(Option<String>, Value)> {
        let tool = ToolName::parse(&request.name).ok_or_else(|| BridgeError::UnknownTool(request.name.clone()))?;
        log::debug!("Dispatching {} with {} argument(s)", tool.as_str(), request.arguments.len());

        match tool {
            ToolName::ReadDocument => {
                let args: ReadDocumentArgs = parse_arguments(&request.arguments)?;
                let file_path = require_path("file_path", &args.file_path)?;
                let format = validate_file_path(file_path, None)?;
                let content = match format.kind {
                    DocumentKind::Word => {
                        let options = WordReadOptions {
                            include_formatting: args.include_formatting.unwrap_or(false),
                        };
                        to_content(&read_word_document(Path::new(file_path), options)?)?
                    }
                    DocumentKind::Excel => {
                        let defaults = ExcelReadOptions::default();
                        let options = ExcelReadOptions {
                            include_formatting: args.include_formatting.unwrap_or(defaults.include_formatting),
                            include_formulas: args.include_formulas.unwrap_or(defaults.include_formulas),
                            include_validation: args.include_validation.unwrap_or(defaults.include_validation),
                        };
                        to_content(&read_excel_file(Path::new(file_path), options)?)?
                    }
                };
                Ok((Some(file_path.to_string()), content))
            }
            ToolName::ReadWordDocument => {
                let args: ReadWordDocumentArgs = parse_arguments(&request.arguments)?;
                let file_path = require_path("file_path", &args.file_path)?;
                validate_file_path(file_path, Some(DocumentKind::Word))?;
                let options = WordReadOptions {
                    include_formatting: args.include_formatting,
                };
                let content = to_content(&read_word_document(Path::new(file_path), options)?)?;
                Ok((Some(file_path.to_string()), content))
            }
            ToolName::ReadExcelFile => {
                let args: ReadExcelFileArgs = parse_arguments(&request.arguments)?;
                let file_path = require_path("file_path", &args.file_path)?;
                validate_file_path(file_path, Some(DocumentKind::Excel))?;
                let content = to_content(&read_excel_file(Path::new(file_path), (&args).into())?)?;
                Ok((Some(file_path.to_string()), content))
            }
            ToolName::ListSupportedFiles => {
                let args: ListSupportedFilesArgs = parse_arguments(&request.arguments)?;
                let directory = require_path("directory_path", &args.directory_path)?;
                let listing = list_supported_files(directory, self.config.follow_links)?;
                Ok((Some(directory.to_string()), to_content(&listing)?))
            }
            // Arguments are accepted and ignored
            ToolName::GetSupportedFormats => Ok((
                None,
                json!({
                    "supported_formats": formats_as_json(),
                    "total_formats": SUPPORTED_FORMATS.len(),
                }),
            )),
        }
    }
}
