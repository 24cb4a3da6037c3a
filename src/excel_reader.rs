use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use calamine::{Data, Range, Reader, SheetType, SheetVisible, open_workbook_auto};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::{BridgeError, BridgeResult};
use crate::formats::dotted_extension;
use crate::xlsx_parts::{CellFormatting, DataValidation, SheetDetails, XlsxParts, cell_reference};

pub const EXCEL_FILE_TYPE: &str = "Microsoft Excel Workbook";

const XLS_FORMATTING_NOTE: &str = "Cell formatting is only available for .xlsx and .xlsm files";
const XLS_VALIDATION_NOTE: &str = "Data validation is only available for .xlsx and .xlsm files";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcelReadOptions {
    pub include_formatting: bool,
    pub include_formulas: bool,
    pub include_validation: bool,
}

impl Default for ExcelReadOptions {
    fn default() -> Self {
        Self {
            include_formatting: true,
            include_formulas: true,
            include_validation: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellData {
    pub reference: String,
    /// 1-based
    pub row: u32,
    /// 1-based
    pub column: u32,
    pub value: Value,
    pub data_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaData {
    pub formula: String,
    pub calculated_value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dimensions {
    pub max_row: u32,
    pub max_column: u32,
    pub used_range: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorksheetData {
    pub name: String,
    pub visibility: &'static str,
    pub dimensions: Dimensions,
    pub cells: Vec<CellData>,
    pub total_cells: usize,
    pub formulas: BTreeMap<String, FormulaData>,
    pub formatting: BTreeMap<String, CellFormatting>,
    pub data_validation: BTreeMap<String, DataValidation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkbookInfo {
    pub total_sheets: usize,
    pub sheet_names: Vec<String>,
    pub creator: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub defined_names: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExcelWorkbookContent {
    pub file_type: &'static str,
    pub workbook_info: WorkbookInfo,
    pub worksheets: Vec<WorksheetData>,
}

/// JSON value and type tag of a cell; `None` for cells that hold nothing
fn cell_value(data: &Data) -> Option<(Value, &'static str)> {
    let converted = match data {
        Data::Empty => return None,
        Data::String(s) if s.trim().is_empty() => return None,
        Data::String(s) => (Value::String(s.clone()), "str"),
        Data::Int(i) => (Value::from(*i), "int"),
        // NaN and infinities have no JSON form
        Data::Float(f) => (Number::from_f64(*f).map_or(Value::Null, Value::Number), "float"),
        Data::Bool(b) => (Value::Bool(*b), "bool"),
        Data::DateTime(dt) if dt.is_duration() => (
            Number::from_f64(dt.as_f64()).map_or(Value::Null, Value::Number),
            "duration",
        ),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => (
                Value::String(datetime.format("%Y-%m-%dT%H:%M:%S").to_string()),
                "datetime",
            ),
            None => (
                Number::from_f64(dt.as_f64()).map_or(Value::Null, Value::Number),
                "datetime",
            ),
        },
        Data::DateTimeIso(s) => (Value::String(s.clone()), "datetime"),
        Data::DurationIso(s) => (Value::String(s.clone()), "duration"),
        Data::Error(e) => (Value::String(e.to_string()), "error"),
    };
    Some(converted)
}

fn visibility_name(visible: &SheetVisible) -> &'static str {
    match visible {
        SheetVisible::Visible => "visible",
        SheetVisible::Hidden => "hidden",
        SheetVisible::VeryHidden => "veryHidden",
    }
}

fn dimensions(range: &Range<Data>) -> Dimensions {
    match (range.start(), range.end()) {
        (Some(start), Some(end)) if !range.is_empty() => Dimensions {
            max_row: end.0 + 1,
            max_column: end.1 + 1,
            used_range: Some(format!(
                "{}:{}",
                cell_reference(start.0, start.1),
                cell_reference(end.0, end.1)
            )),
        },
        _ => Dimensions::default(),
    }
}

/// Absolute 0-based position of a cell yielded by `Range::used_cells`
fn absolute(range_start: (u32, u32), row: usize, column: usize) -> (u32, u32) {
    (range_start.0 + row as u32, range_start.1 + column as u32)
}

fn collect_cells(range: &Range<Data>) -> Vec<CellData> {
    let Some(start) = range.start() else {
        return Vec::new();
    };
    range
        .used_cells()
        .filter_map(|(row, column, data)| {
            let (value, data_type) = cell_value(data)?;
            let (row, column) = absolute(start, row, column);
            Some(CellData {
                reference: cell_reference(row, column),
                row: row + 1,
                column: column + 1,
                value,
                data_type,
            })
        })
        .collect()
}

fn collect_formulas(formulas: &Range<String>, values: &Range<Data>) -> BTreeMap<String, FormulaData> {
    let Some(start) = formulas.start() else {
        return BTreeMap::new();
    };
    formulas
        .used_cells()
        .filter(|(_, _, formula)| !formula.is_empty())
        .map(|(row, column, formula)| {
            let position = absolute(start, row, column);
            let calculated_value = values
                .get_value(position)
                .and_then(cell_value)
                .map_or(Value::Null, |(value, _)| value);
            let formula = if formula.starts_with('=') {
                formula.clone()
            } else {
                format!("={}", formula)
            };
            (
                cell_reference(position.0, position.1),
                FormulaData {
                    formula,
                    calculated_value,
                },
            )
        })
        .collect()
}

fn collect_formatting(cells: &[CellData], details: &SheetDetails, parts: &XlsxParts) -> BTreeMap<String, CellFormatting> {
    cells
        .iter()
        .map(|cell| {
            let style = details
                .cell_styles
                .get(&(cell.row - 1, cell.column - 1))
                .copied()
                .unwrap_or(0);
            (cell.reference.clone(), parts.cell_formatting(style))
        })
        .collect()
}

/// Read every worksheet of a workbook into cells, formulas, formatting and validation rules.
///
/// `.xls` workbooks are read through calamine only; formatting and validation
/// come back empty with a note on each sheet.
pub fn read_excel_file(path: &Path, options: ExcelReadOptions) -> BridgeResult<ExcelWorkbookContent> {
    // Surface permission problems as I/O errors before calamine reports them as format errors
    drop(File::open(path).map_err(|e| BridgeError::io(path, e))?);

    let mut workbook = open_workbook_auto(path).map_err(|e| {
        BridgeError::Format(format!("Failed to open Excel file {}: {}", path.display(), e))
    })?;

    let is_ooxml = matches!(dotted_extension(path).as_deref(), Some(".xlsx" | ".xlsm"));
    let mut parts = if is_ooxml {
        match XlsxParts::open(path) {
            Ok(parts) => Some(parts),
            Err(e) => {
                log::warn!("Workbook details unavailable for {}: {:#}", path.display(), e);
                None
            }
        }
    } else {
        None
    };

    let sheet_names = workbook.sheet_names();
    let sheets = workbook.sheets_metadata().to_vec();
    let defined_names = workbook
        .defined_names()
        .iter()
        .map(|(name, formula)| (name.clone(), formula.clone()))
        .collect();

    let mut worksheets = Vec::with_capacity(sheets.len());
    for sheet in &sheets {
        if !matches!(sheet.typ, SheetType::WorkSheet) {
            log::debug!("Skipping non-worksheet sheet {:?} ({:?})", sheet.name, sheet.typ);
            continue;
        }

        let range = workbook.worksheet_range(&sheet.name).map_err(|e| {
            BridgeError::Format(format!("Failed to read sheet '{}': {}", sheet.name, e))
        })?;
        let cells = collect_cells(&range);
        let mut notes = Vec::new();

        let formulas = if options.include_formulas {
            match workbook.worksheet_formula(&sheet.name) {
                Ok(formula_range) => collect_formulas(&formula_range, &range),
                Err(e) => {
                    log::warn!("Formulas unavailable for sheet {:?}: {}", sheet.name, e);
                    notes.push(format!("Formulas could not be read: {}", e));
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        let wants_details = options.include_formatting || options.include_validation;
        let details = match parts.as_mut() {
            Some(parts) if wants_details => match parts.sheet_details(&sheet.name) {
                Ok(details) => Some(details),
                Err(e) => {
                    log::warn!("Sheet details unavailable for {:?}: {:#}", sheet.name, e);
                    None
                }
            },
            _ => None,
        };

        let mut formatting = BTreeMap::new();
        let mut data_validation = BTreeMap::new();
        match (&details, parts.as_ref()) {
            (Some(details), Some(parts)) => {
                if options.include_formatting {
                    formatting = collect_formatting(&cells, details, parts);
                }
                if options.include_validation {
                    data_validation = details.validations.clone();
                }
            }
            _ if !is_ooxml => {
                if options.include_formatting {
                    notes.push(XLS_FORMATTING_NOTE.to_string());
                }
                if options.include_validation {
                    notes.push(XLS_VALIDATION_NOTE.to_string());
                }
            }
            _ => {}
        }

        worksheets.push(WorksheetData {
            name: sheet.name.clone(),
            visibility: visibility_name(&sheet.visible),
            dimensions: dimensions(&range),
            total_cells: cells.len(),
            cells,
            formulas,
            formatting,
            data_validation,
            notes,
        });
    }

    let properties = parts.map(|p| p.properties).unwrap_or_default();
    log::debug!(
        "Read {} worksheet(s) from {}",
        worksheets.len(),
        path.display()
    );

    Ok(ExcelWorkbookContent {
        file_type: EXCEL_FILE_TYPE,
        workbook_info: WorkbookInfo {
            total_sheets: sheet_names.len(),
            sheet_names,
            creator: properties.creator,
            created: properties.created,
            modified: properties.modified,
            defined_names,
        },
        worksheets,
    })
}
