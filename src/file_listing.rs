use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{BridgeError, BridgeResult};
use crate::formats::{lookup_format, supported_extensions};

/// A supported document found under the listed directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub format: &'static str,
    pub format_description: &'static str,
    pub size: u64,
    /// RFC 3339, UTC
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileListing {
    pub directory: String,
    pub supported_files: Vec<FileEntry>,
    pub count: usize,
    /// Extensions the listing filters on, e.g. `".docx"`
    pub supported_formats: Vec<&'static str>,
}

/// Recursively list the supported documents below `directory`, sorted by path.
///
/// Unreadable subdirectories are skipped; only the root itself must be accessible.
pub fn list_supported_files(directory: &str, follow_links: bool) -> BridgeResult<FileListing> {
    let root = Path::new(directory);
    if !root.exists() {
        return Err(BridgeError::NotFound(directory.to_string()));
    }
    if !root.is_dir() {
        return Err(BridgeError::Argument(format!("Path is not a directory: {}", directory)));
    }
    std::fs::read_dir(root).map_err(|e| BridgeError::io(root, e))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(follow_links) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skipping unreadable entry under {}: {}", directory, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(format) = lookup_format(entry.path()) else {
            continue;
        };
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                log::debug!("No metadata for {}: {}", entry.path().display(), e);
                continue;
            }
        };

        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path().display().to_string(),
            format: format.extension,
            format_description: format.description,
            size: metadata.len(),
            modified: metadata
                .modified()
                .ok()
                .map(|time| DateTime::<Utc>::from(time).to_rfc3339()),
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(FileListing {
        directory: directory.to_string(),
        count: files.len(),
        supported_files: files,
        supported_formats: supported_extensions(),
    })
}
