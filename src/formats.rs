use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{BridgeError, BridgeResult};

/// Document families the bridge can extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Word,
    Excel,
}

/// A supported file extension and how it is described to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedFormat {
    pub extension: &'static str,
    pub description: &'static str,
    pub kind: DocumentKind,
}

pub const SUPPORTED_FORMATS: &[SupportedFormat] = &[
    SupportedFormat {
        extension: ".docx",
        description: "Microsoft Word Document",
        kind: DocumentKind::Word,
    },
    SupportedFormat {
        extension: ".xlsx",
        description: "Microsoft Excel Workbook",
        kind: DocumentKind::Excel,
    },
    SupportedFormat {
        extension: ".xls",
        description: "Microsoft Excel Workbook (Legacy)",
        kind: DocumentKind::Excel,
    },
    SupportedFormat {
        extension: ".xlsm",
        description: "Microsoft Excel Macro-Enabled Workbook",
        kind: DocumentKind::Excel,
    },
];

/// Lower-cased extension of `path` with its leading dot, e.g. `".docx"`
pub fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

pub fn lookup_format(path: &Path) -> Option<&'static SupportedFormat> {
    let extension = dotted_extension(path)?;
    SUPPORTED_FORMATS
        .iter()
        .find(|format| format.extension == extension)
}

pub fn supported_extensions() -> Vec<&'static str> {
    SUPPORTED_FORMATS.iter().map(|f| f.extension).collect()
}

pub fn extensions_for(kind: DocumentKind) -> Vec<&'static str> {
    SUPPORTED_FORMATS
        .iter()
        .filter(|f| f.kind == kind)
        .map(|f| f.extension)
        .collect()
}

/// The `{extension: description}` map returned by `get_supported_formats`
pub fn formats_as_json() -> Map<String, Value> {
    SUPPORTED_FORMATS
        .iter()
        .map(|f| (f.extension.to_string(), Value::String(f.description.to_string())))
        .collect()
}

/// Check that a file exists and has one of the extensions of `kind`.
///
/// Missing paths are reported before extension problems so that every read
/// tool answers a nonexistent path with `NotFound`.
pub fn validate_file_path(file_path: &str, kind: Option<DocumentKind>) -> BridgeResult<&'static SupportedFormat> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(BridgeError::NotFound(file_path.to_string()));
    }
    if !path.is_file() {
        return Err(BridgeError::Argument(format!("Path is not a file: {}", file_path)));
    }

    let extension = dotted_extension(path);
    let format = lookup_format(path).filter(|f| kind.is_none_or(|k| f.kind == k));

    match (format, kind) {
        (Some(format), _) => Ok(format),
        (None, Some(DocumentKind::Word)) => match extension.as_deref() {
            Some(".doc") => Err(BridgeError::Format(
                "Legacy .doc files are not supported; save the document as .docx".to_string(),
            )),
            other => Err(BridgeError::Format(format!(
                "File must be a .docx file, got: {}",
                other.unwrap_or("(no extension)")
            ))),
        },
        (None, Some(DocumentKind::Excel)) => Err(BridgeError::Format(format!(
            "Unsupported Excel format: {}. Supported: {}",
            extension.as_deref().unwrap_or("(no extension)"),
            extensions_for(DocumentKind::Excel).join(", ")
        ))),
        (None, None) => Err(BridgeError::Format(format!(
            "Unsupported file format: {}. Supported formats: {}",
            extension.as_deref().unwrap_or("(no extension)"),
            supported_extensions().join(", ")
        ))),
    }
}
