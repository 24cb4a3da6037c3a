//! Word (.docx) extraction on top of `docx-rs`.
//!
//! Property values docx-rs keeps private (run flags, cell merges, style
//! names) are read from its serde form, the same JSON it exposes to wasm.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use docx_rs::{
    DocumentChild, Docx, InsertChild, Paragraph, ParagraphChild, Run, RunChild, StructuredDataTag,
    StructuredDataTagChild, Table, TableCell, TableCellContent, TableChild, TableRowChild,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::ooxml::{CoreProperties, OoxmlPackage};

pub const WORD_FILE_TYPE: &str = "Microsoft Word Document (.docx)";
const DEFAULT_STYLE: &str = "Normal";

/// Options for Word extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct WordReadOptions {
    pub include_formatting: bool,
}

/// A run of text sharing the same character formatting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInfo {
    pub text: String,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParagraphFormatting {
    pub style: String,
    pub alignment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParagraphData {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatting: Option<ParagraphFormatting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<RunInfo>,
}

/// Position of a body block, pointing into `paragraphs` or `tables`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockRef {
    Paragraph { index: usize },
    Table { index: usize },
}

/// Structured content of a .docx file
#[derive(Debug, Clone, Serialize)]
pub struct WordDocumentContent {
    pub file_type: &'static str,
    pub paragraphs: Vec<ParagraphData>,
    /// table → rows → cell texts
    pub tables: Vec<Vec<Vec<String>>>,
    pub document_order: Vec<BlockRef>,
    pub properties: CoreProperties,
    pub total_paragraphs: usize,
    pub total_tables: usize,
    pub formatting_included: bool,
}

/// String value of a serialized property, bare or wrapped as `{"val": ..}`
fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map.get("val").or_else(|| map.get("name")).and_then(json_text),
        _ => None,
    }
}

fn json_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Object(map) => map.get("val").and_then(json_flag),
        _ => None,
    }
}

fn json_count(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::Object(map) => map.get("val").and_then(json_count),
        _ => None,
    }
}

fn serialized<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

/// Style id → display name
#[derive(Debug, Default)]
struct StyleNames {
    names: HashMap<String, String>,
}

impl StyleNames {
    fn from_docx(docx: &Docx) -> Self {
        let styles = serialized(&docx.styles);
        let names = styles["styles"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|style| {
                let id = style["styleId"].as_str()?;
                let name = json_text(&style["name"]).unwrap_or_else(|| id.to_string());
                Some((id.to_string(), name))
            })
            .collect();
        Self { names }
    }

    /// Paragraphs without a style use the `Normal` paragraph style
    fn resolve(&self, style_id: Option<&str>) -> String {
        let id = style_id.unwrap_or(DEFAULT_STYLE);
        self.names.get(id).cloned().unwrap_or_else(|| id.to_string())
    }
}

/// Read a .docx file into paragraphs and tables in document order.
///
/// The path is expected to have been validated; open and container failures
/// are still reported as errors rather than assumed away.
pub fn read_word_document(path: &Path, options: WordReadOptions) -> BridgeResult<WordDocumentContent> {
    let mut file = File::open(path).map_err(|e| BridgeError::io(path, e))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer).map_err(|e| BridgeError::io(path, e))?;

    let docx = docx_rs::read_docx(&buffer)
        .map_err(|e| BridgeError::Format(format!("Failed to parse DOCX {}: {}", path.display(), e)))?;

    let styles = if options.include_formatting {
        StyleNames::from_docx(&docx)
    } else {
        StyleNames::default()
    };

    // Core properties are informational; a broken part does not fail the read.
    let properties = OoxmlPackage::open(path)
        .and_then(|mut package| package.core_properties())
        .unwrap_or_else(|e| {
            log::debug!("No usable core properties in {}: {:#}", path.display(), e);
            CoreProperties::default()
        });

    let mut walker = BodyWalker {
        options,
        styles: &styles,
        paragraphs: Vec::new(),
        tables: Vec::new(),
        order: Vec::new(),
    };
    walker.walk(&docx.document.children);

    log::debug!(
        "Extracted {} paragraphs and {} tables from {}",
        walker.paragraphs.len(),
        walker.tables.len(),
        path.display()
    );

    Ok(WordDocumentContent {
        file_type: WORD_FILE_TYPE,
        total_paragraphs: walker.paragraphs.len(),
        total_tables: walker.tables.len(),
        paragraphs: walker.paragraphs,
        tables: walker.tables,
        document_order: walker.order,
        properties,
        formatting_included: options.include_formatting,
    })
}

struct BodyWalker<'s> {
    options: WordReadOptions,
    styles: &'s StyleNames,
    paragraphs: Vec<ParagraphData>,
    tables: Vec<Vec<Vec<String>>>,
    order: Vec<BlockRef>,
}

impl BodyWalker<'_> {
    fn walk(&mut self, children: &[DocumentChild]) {
        for child in children {
            match child {
                DocumentChild::Paragraph(paragraph) => self.push_paragraph(paragraph),
                DocumentChild::Table(table) => self.push_table(table),
                DocumentChild::StructuredDataTag(tag) => self.walk_tag(tag),
                _ => {}
            }
        }
    }

    /// Content controls wrap ordinary body blocks
    fn walk_tag(&mut self, tag: &StructuredDataTag) {
        for child in &tag.children {
            match child {
                StructuredDataTagChild::Paragraph(paragraph) => self.push_paragraph(paragraph),
                StructuredDataTagChild::Table(table) => self.push_table(table),
                StructuredDataTagChild::StructuredDataTag(inner) => self.walk_tag(inner),
                _ => {}
            }
        }
    }

    fn push_paragraph(&mut self, paragraph: &Paragraph) {
        if let Some(data) = self.paragraph(paragraph) {
            self.order.push(BlockRef::Paragraph {
                index: self.paragraphs.len(),
            });
            self.paragraphs.push(data);
        }
    }

    fn push_table(&mut self, table: &Table) {
        self.order.push(BlockRef::Table {
            index: self.tables.len(),
        });
        self.tables.push(table_grid(table));
    }

    fn paragraph(&self, paragraph: &Paragraph) -> Option<ParagraphData> {
        let runs = paragraph_runs(paragraph);
        let text: String = runs.iter().map(|run| run_text(run)).collect();
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let (formatting, run_infos) = if self.options.include_formatting {
            let style_id = paragraph.property.style.as_ref().map(|style| style.val.as_str());
            let alignment = json_text(&serialized(&paragraph.property)["alignment"]);
            let formatting = ParagraphFormatting {
                style: self.styles.resolve(style_id),
                alignment,
            };
            let infos = runs.iter().filter_map(|run| run_info(run)).collect();
            (Some(formatting), infos)
        } else {
            (None, Vec::new())
        };

        Some(ParagraphData {
            text: text.to_string(),
            formatting,
            runs: run_infos,
        })
    }
}

/// Runs of a paragraph in reading order, including those nested in
/// hyperlinks, insertions and content controls; deleted text is skipped.
fn paragraph_runs(paragraph: &Paragraph) -> Vec<&Run> {
    let mut runs = Vec::new();
    collect_runs(&paragraph.children, &mut runs);
    runs
}

fn collect_runs<'a>(children: &'a [ParagraphChild], runs: &mut Vec<&'a Run>) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => runs.push(run),
            ParagraphChild::Insert(insert) => {
                for child in &insert.children {
                    if let InsertChild::Run(run) = child {
                        runs.push(run);
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_runs(&link.children, runs),
            ParagraphChild::StructuredDataTag(tag) => collect_tag_runs(tag, runs),
            _ => {}
        }
    }
}

fn collect_tag_runs<'a>(tag: &'a StructuredDataTag, runs: &mut Vec<&'a Run>) {
    for child in &tag.children {
        match child {
            StructuredDataTagChild::Run(run) => runs.push(run),
            StructuredDataTagChild::StructuredDataTag(inner) => collect_tag_runs(inner, runs),
            _ => {}
        }
    }
}

fn run_text(run: &Run) -> String {
    let mut text = String::new();
    for child in &run.children {
        match child {
            RunChild::Text(t) => text.push_str(&t.text),
            RunChild::Tab(_) => text.push('\t'),
            RunChild::Break(_) => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn run_info(run: &Run) -> Option<RunInfo> {
    let text = run_text(run);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let properties = serialized(&run.run_property);
    Some(RunInfo {
        text: text.to_string(),
        bold: json_flag(&properties["bold"]),
        italic: json_flag(&properties["italic"]),
        underline: json_text(&properties["underline"])
            .map(|val| !matches!(val.to_ascii_lowercase().as_str(), "none" | "0" | "false" | "off")),
    })
}

fn cell_text(cell: &TableCell) -> String {
    let mut paragraphs = Vec::new();
    collect_cell_paragraphs(&cell.children, &mut paragraphs);
    paragraphs
        .iter()
        .map(|p| paragraph_runs(p).iter().map(|run| run_text(run)).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn collect_cell_paragraphs<'a>(children: &'a [TableCellContent], paragraphs: &mut Vec<&'a Paragraph>) {
    for child in children {
        match child {
            TableCellContent::Paragraph(paragraph) => paragraphs.push(paragraph),
            TableCellContent::StructuredDataTag(tag) => collect_tag_paragraphs(tag, paragraphs),
            _ => {}
        }
    }
}

fn collect_tag_paragraphs<'a>(tag: &'a StructuredDataTag, paragraphs: &mut Vec<&'a Paragraph>) {
    for child in &tag.children {
        match child {
            StructuredDataTagChild::Paragraph(paragraph) => paragraphs.push(paragraph),
            StructuredDataTagChild::StructuredDataTag(inner) => collect_tag_paragraphs(inner, paragraphs),
            _ => {}
        }
    }
}

/// Lay a table out on its column grid.
///
/// A cell spanning n grid columns contributes its text n times, and a
/// vertically merged continuation cell repeats the text of the cell above,
/// so every row of a rectangular table has the same length.
fn table_grid(table: &Table) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    for row in &table.rows {
        let TableChild::TableRow(row) = row;
        let mut grid_row: Vec<String> = Vec::new();
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell;
            let properties = serialized(&cell.property);
            let span = json_count(&properties["gridSpan"]).unwrap_or(1).max(1);
            let continues_merge = json_text(&properties["verticalMerge"]).is_some_and(|merge| merge == "continue");

            let column = grid_row.len();
            let text = if continues_merge {
                rows.last()
                    .and_then(|above| above.get(column))
                    .cloned()
                    .unwrap_or_default()
            } else {
                cell_text(cell)
            };
            grid_row.extend(std::iter::repeat_n(text, span));
        }
        rows.push(grid_row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{self, paragraph, table};

    fn read(body: &str, include_formatting: bool) -> WordDocumentContent {
        let file = test_fixtures::docx(body);
        read_word_document(file.path(), WordReadOptions { include_formatting }).unwrap()
    }

    #[test]
    fn test_reads_paragraphs_in_order() {
        let body = format!("{}{}{}", paragraph("First"), paragraph("   "), paragraph("  Second  "));
        let content = read(&body, false);
        assert_eq!(content.total_paragraphs, 2);
        assert_eq!(content.paragraphs[0].text, "First");
        assert_eq!(content.paragraphs[1].text, "Second");
        assert!(content.paragraphs[0].formatting.is_none());
        assert!(content.paragraphs[0].runs.is_empty());
        assert!(!content.formatting_included);
        assert_eq!(content.properties.creator.as_deref(), Some("Test Author"));
    }

    #[test]
    fn test_document_order_interleaves_tables() {
        let body = format!(
            "{}{}{}",
            paragraph("Intro"),
            table(&[&["a", "b"]]),
            paragraph("Outro")
        );
        let content = read(&body, false);
        assert_eq!(
            content.document_order,
            vec![
                BlockRef::Paragraph { index: 0 },
                BlockRef::Table { index: 0 },
                BlockRef::Paragraph { index: 1 },
            ]
        );
        // table text does not leak into body paragraphs
        assert_eq!(content.total_paragraphs, 2);
    }

    #[test]
    fn test_table_shape_is_preserved() {
        let body = table(&[&["h1", "h2", "h3"], &["1", "", "3"], &["4", "5", "6"], &["7", "8", "9"]]);
        let content = read(&body, false);
        assert_eq!(content.total_tables, 1);
        let grid = &content.tables[0];
        assert_eq!(grid.len(), 4);
        assert!(grid.iter().all(|row| row.len() == 3));
        assert_eq!(grid[1], vec!["1", "", "3"]);
    }

    #[test]
    fn test_merged_cells_fill_the_grid() {
        let body = r#"<w:tbl>
            <w:tr>
              <w:tc><w:tcPr><w:gridSpan w:val="2"/></w:tcPr><w:p><w:r><w:t>wide</w:t></w:r></w:p></w:tc>
              <w:tc><w:tcPr><w:vMerge w:val="restart"/></w:tcPr><w:p><w:r><w:t>tall</w:t></w:r></w:p></w:tc>
            </w:tr>
            <w:tr>
              <w:tc><w:p><w:r><w:t>x</w:t></w:r></w:p></w:tc>
              <w:tc><w:p><w:r><w:t>y</w:t></w:r></w:p></w:tc>
              <w:tc><w:tcPr><w:vMerge/></w:tcPr><w:p/></w:tc>
            </w:tr>
          </w:tbl>"#;
        let content = read(body, false);
        let grid = &content.tables[0];
        assert_eq!(grid[0], vec!["wide", "wide", "tall"]);
        assert_eq!(grid[1], vec!["x", "y", "tall"]);
    }

    #[test]
    fn test_rows_inside_content_controls_are_kept() {
        let body = r#"<w:tbl><w:tblPr/>
            <w:tr><w:tc><w:p><w:r><w:t>first</w:t></w:r></w:p></w:tc></w:tr>
            <w:sdt><w:sdtPr/><w:sdtContent>
              <w:tr><w:tc><w:p><w:r><w:t>second</w:t></w:r></w:p></w:tc></w:tr>
            </w:sdtContent></w:sdt>
          </w:tbl>"#;
        let content = read(body, false);
        assert_eq!(content.tables[0], vec![vec!["first"], vec!["second"]]);
    }

    #[test]
    fn test_cell_paragraphs_join_with_newline() {
        let body = r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>line one</w:t></w:r></w:p><w:p><w:r><w:t>line two</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;
        let content = read(body, false);
        assert_eq!(content.tables[0][0][0], "line one\nline two");
    }

    #[test]
    fn test_formatting_flags_and_styles() {
        let body = r#"<w:p>
            <w:pPr><w:pStyle w:val="Heading1"/><w:jc w:val="center"/></w:pPr>
            <w:r><w:rPr><w:b/><w:i w:val="0"/></w:rPr><w:t>Bold</w:t></w:r>
            <w:r><w:t xml:space="preserve"> </w:t></w:r>
            <w:r><w:rPr><w:u w:val="single"/></w:rPr><w:t>under</w:t></w:r>
          </w:p>
          <w:p><w:r><w:t>Plain</w:t></w:r></w:p>"#;
        let content = read(body, true);
        assert!(content.formatting_included);

        let heading = &content.paragraphs[0];
        assert_eq!(heading.text, "Bold under");
        let formatting = heading.formatting.as_ref().unwrap();
        assert_eq!(formatting.style, "heading 1");
        assert_eq!(formatting.alignment.as_deref(), Some("center"));
        assert_eq!(heading.runs.len(), 2);
        assert_eq!(heading.runs[0].bold, Some(true));
        assert_eq!(heading.runs[0].italic, Some(false));
        assert_eq!(heading.runs[0].underline, None);
        assert_eq!(heading.runs[1].underline, Some(true));

        let plain = &content.paragraphs[1];
        assert_eq!(plain.formatting.as_ref().unwrap().style, "Normal");
        assert_eq!(plain.formatting.as_ref().unwrap().alignment, None);
    }

    #[test]
    fn test_hyperlinks_tabs_and_deletions() {
        let body = r#"<w:p>
            <w:r><w:t>See</w:t><w:tab/></w:r>
            <w:hyperlink r:id="rId9"><w:r><w:t>link</w:t></w:r></w:hyperlink>
            <w:del><w:r><w:delText>gone</w:delText></w:r></w:del>
            <w:ins><w:r><w:t>!</w:t></w:r></w:ins>
          </w:p>"#;
        let content = read(body, false);
        assert_eq!(content.paragraphs[0].text, "See\tlink!");
    }

    #[test]
    fn test_moved_text_is_kept() {
        let body = r#"<w:p><w:r><w:t xml:space="preserve">a </w:t></w:r><w:moveTo w:id="1" w:author="A"><w:r><w:t>moved</w:t></w:r></w:moveTo></w:p>"#;
        let content = read(body, false);
        assert_eq!(content.paragraphs[0].text, "a moved");
    }

    #[test]
    fn test_content_controls_are_unwrapped() {
        let body = format!("<w:sdt><w:sdtContent>{}</w:sdtContent></w:sdt>", paragraph("Inside"));
        let content = read(&body, false);
        assert_eq!(content.paragraphs[0].text, "Inside");
    }

    #[test]
    fn test_escaped_text() {
        let content = read(&paragraph("R&amp;D &lt;draft&gt;"), false);
        assert_eq!(content.paragraphs[0].text, "R&D <draft>");
    }

    #[test]
    fn test_invalid_container_is_format_error() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::with_suffix(".docx").unwrap();
        file.write_all(b"This is not a valid DOCX file").unwrap();
        let err = read_word_document(file.path(), WordReadOptions::default()).unwrap_err();
        assert!(matches!(err, BridgeError::Format(_)));
    }

    #[test]
    fn test_missing_document_part_is_format_error() {
        let file = test_fixtures::package(".docx", &[("hello.txt", "hi".to_string())]);
        let err = read_word_document(file.path(), WordReadOptions::default()).unwrap_err();
        assert!(matches!(err, BridgeError::Format(ref m) if m.starts_with("Failed to parse DOCX")));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = read_word_document(Path::new("nonexistent_file.docx"), WordReadOptions::default()).unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(ref p) if p == "nonexistent_file.docx"));
    }
}
