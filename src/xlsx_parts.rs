//! Spreadsheet details calamine does not expose: cell styles and data
//! validation rules, read straight from the .xlsx/.xlsm package.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;

use crate::ooxml::{CoreProperties, OoxmlPackage, XmlElement, general_ref_text, on_off};

const WORKSHEET_REL: &str = "/worksheet";
const STYLES_REL: &str = "/styles";

/// Spreadsheet column letters for a 0-based column index (0 → "A", 26 → "AA")
pub fn column_letters(column: u32) -> String {
    let mut n = column as u64 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1-style reference for a 0-based (row, column) position
pub fn cell_reference(row: u32, column: u32) -> String {
    format!("{}{}", column_letters(column), row + 1)
}

/// Parse an A1-style reference (`$` anchors allowed) into a 0-based position
pub fn parse_cell_reference(reference: &str) -> Option<(u32, u32)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let column = letters
        .chars()
        .try_fold(0u64, |acc, c| {
            let value = (c.to_ascii_uppercase() as u8 - b'A') as u64 + 1;
            acc.checked_mul(26)?.checked_add(value)
        })?
        .checked_sub(1)?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, u32::try_from(column).ok()?))
}

fn builtin_number_format(id: u32) -> Option<&'static str> {
    Some(match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

/// `rgb`, `theme`, `indexed` or `auto` color of a color element
fn color_value(element: Option<&XmlElement>) -> Option<String> {
    let element = element?;
    if let Some(rgb) = element.attr("rgb") {
        return Some(rgb.to_string());
    }
    if let Some(theme) = element.attr("theme") {
        return Some(format!("theme:{}", theme));
    }
    if let Some(indexed) = element.attr("indexed") {
        return Some(format!("indexed:{}", indexed));
    }
    element.attr("auto").map(|_| "auto".to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FontStyle {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    pub underline: Option<String>,
    pub color: Option<String>,
}

impl FontStyle {
    fn from_xml(font: &XmlElement) -> Self {
        let underline = font.child("u").and_then(|u| match u.attr("val") {
            None => Some("single".to_string()),
            Some("none") => None,
            Some(val) => Some(val.to_string()),
        });
        Self {
            name: font.child("name").and_then(|n| n.attr("val")).map(str::to_string),
            size: font
                .child("sz")
                .and_then(|s| s.attr("val"))
                .and_then(|v| v.parse().ok()),
            bold: on_off(font.child("b")).unwrap_or(false),
            italic: on_off(font.child("i")).unwrap_or(false),
            underline,
            color: color_value(font.child("color")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillStyle {
    pub pattern_type: Option<String>,
    pub fg_color: Option<String>,
    pub bg_color: Option<String>,
}

impl FillStyle {
    fn from_xml(fill: &XmlElement) -> Self {
        match fill.child("patternFill") {
            Some(pattern) => Self {
                pattern_type: pattern.attr("patternType").map(str::to_string),
                fg_color: color_value(pattern.child("fgColor")),
                bg_color: color_value(pattern.child("bgColor")),
            },
            None if fill.child("gradientFill").is_some() => Self {
                pattern_type: Some("gradient".to_string()),
                ..Self::default()
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BorderSide {
    pub style: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BorderStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<BorderSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<BorderSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<BorderSide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<BorderSide>,
}

impl BorderStyle {
    fn from_xml(border: &XmlElement) -> Self {
        let side = |name: &str| {
            let element = border.child(name)?;
            Some(BorderSide {
                style: element.attr("style")?.to_string(),
                color: color_value(element.child("color")),
            })
        };
        Self {
            top: side("top"),
            bottom: side("bottom"),
            // Strict OOXML uses start/end in place of left/right
            left: side("left").or_else(|| side("start")),
            right: side("right").or_else(|| side("end")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignmentStyle {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: Option<bool>,
    pub text_rotation: Option<i32>,
}

impl AlignmentStyle {
    fn from_xml(alignment: &XmlElement) -> Self {
        Self {
            horizontal: alignment.attr("horizontal").map(str::to_string),
            vertical: alignment.attr("vertical").map(str::to_string),
            wrap_text: alignment.attr("wrapText").map(|v| v == "1" || v == "true"),
            text_rotation: alignment.attr("textRotation").and_then(|v| v.parse().ok()),
        }
    }
}

/// Fully resolved formatting of one cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellFormatting {
    pub font: FontStyle,
    pub fill: FillStyle,
    pub border: BorderStyle,
    pub alignment: AlignmentStyle,
    pub number_format: String,
}

#[derive(Debug, Clone, Default)]
struct CellXf {
    num_fmt_id: u32,
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    alignment: AlignmentStyle,
}

fn list_items<'a>(root: &'a XmlElement, container: &str, item: &'a str) -> Vec<&'a XmlElement> {
    root.child(container)
        .map(|c| c.children_named(item).collect())
        .unwrap_or_default()
}

/// Parsed `xl/styles.xml`
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    number_formats: HashMap<u32, String>,
    fonts: Vec<FontStyle>,
    fills: Vec<FillStyle>,
    borders: Vec<BorderStyle>,
    cell_xfs: Vec<CellXf>,
}

impl StyleSheet {
    pub fn from_xml(root: &XmlElement) -> Self {
        let list = |container: &str, item: &'static str| list_items(root, container, item);
        let index = |xf: &XmlElement, name: &str| -> usize {
            xf.attr(name).and_then(|v| v.parse().ok()).unwrap_or(0)
        };

        Self {
            number_formats: list("numFmts", "numFmt")
                .into_iter()
                .filter_map(|fmt| {
                    let id = fmt.attr("numFmtId")?.parse().ok()?;
                    Some((id, fmt.attr("formatCode")?.to_string()))
                })
                .collect(),
            fonts: list("fonts", "font").into_iter().map(FontStyle::from_xml).collect(),
            fills: list("fills", "fill").into_iter().map(FillStyle::from_xml).collect(),
            borders: list("borders", "border").into_iter().map(BorderStyle::from_xml).collect(),
            cell_xfs: list("cellXfs", "xf")
                .into_iter()
                .map(|xf| CellXf {
                    num_fmt_id: xf.attr("numFmtId").and_then(|v| v.parse().ok()).unwrap_or(0),
                    font_id: index(xf, "fontId"),
                    fill_id: index(xf, "fillId"),
                    border_id: index(xf, "borderId"),
                    alignment: xf
                        .child("alignment")
                        .map(AlignmentStyle::from_xml)
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }

    pub fn number_format(&self, id: u32) -> String {
        self.number_formats
            .get(&id)
            .cloned()
            .or_else(|| builtin_number_format(id).map(str::to_string))
            .unwrap_or_else(|| "General".to_string())
    }

    /// Formatting for a cell style index (the `s` attribute of a cell)
    pub fn cell_formatting(&self, xf_index: usize) -> CellFormatting {
        let xf = self.cell_xfs.get(xf_index).cloned().unwrap_or_default();
        CellFormatting {
            font: self.fonts.get(xf.font_id).cloned().unwrap_or_default(),
            fill: self.fills.get(xf.fill_id).cloned().unwrap_or_default(),
            border: self.borders.get(xf.border_id).cloned().unwrap_or_default(),
            alignment: xf.alignment,
            number_format: self.number_format(xf.num_fmt_id),
        }
    }
}

/// One `<dataValidation>` rule
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataValidation {
    #[serde(rename = "type")]
    pub validation_type: String,
    pub operator: Option<String>,
    pub formula1: Option<String>,
    pub formula2: Option<String>,
    pub allow_blank: bool,
    pub show_error_message: bool,
    pub error_title: Option<String>,
    pub error_message: Option<String>,
    pub show_input_message: bool,
    pub input_title: Option<String>,
    pub input_message: Option<String>,
}

impl DataValidation {
    fn from_attributes(element: &XmlElement) -> Self {
        let flag = |name: &str| matches!(element.attr(name), Some("1" | "true"));
        let text = |name: &str| element.attr(name).map(str::to_string);
        Self {
            validation_type: element.attr("type").unwrap_or("none").to_string(),
            operator: text("operator"),
            allow_blank: flag("allowBlank"),
            show_error_message: flag("showErrorMessage"),
            error_title: text("errorTitle"),
            error_message: text("error"),
            show_input_message: flag("showInputMessage"),
            input_title: text("promptTitle"),
            input_message: text("prompt"),
            ..Self::default()
        }
    }
}

/// Per-sheet details scanned from a worksheet part
#[derive(Debug, Default)]
pub struct SheetDetails {
    /// 0-based (row, column) → cell style index
    pub cell_styles: HashMap<(u32, u32), usize>,
    /// sqref → rule
    pub validations: BTreeMap<String, DataValidation>,
}

#[derive(Clone, Copy)]
enum FormulaSlot {
    First,
    Second,
}

/// Stream a worksheet part, collecting cell style indices and validations.
///
/// Worksheets can be large, so this walks events instead of building a tree.
pub fn scan_sheet_xml(xml: &str) -> Result<SheetDetails> {
    let mut reader = Reader::from_str(xml);
    let mut details = SheetDetails::default();
    let mut buf = Vec::new();

    let mut current_row: Option<u32> = None;
    let mut next_column: u32 = 0;
    let mut pending: Option<(String, DataValidation)> = None;
    let mut formula_slot: Option<FormulaSlot> = None;
    let mut formula_text = String::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| anyhow!("Malformed worksheet XML at byte {}: {}", reader.buffer_position(), e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"row" => {
                        let element = XmlElement::from_start(e);
                        let row = element
                            .attr("r")
                            .and_then(|r| r.parse::<u32>().ok())
                            .and_then(|r| r.checked_sub(1))
                            .unwrap_or_else(|| current_row.map_or(0, |r| r + 1));
                        current_row = Some(row);
                        next_column = 0;
                    }
                    b"c" => {
                        let element = XmlElement::from_start(e);
                        let position = element
                            .attr("r")
                            .and_then(parse_cell_reference)
                            .unwrap_or((current_row.unwrap_or(0), next_column));
                        next_column = position.1 + 1;
                        if let Some(style) = element.attr("s").and_then(|s| s.parse::<usize>().ok()) {
                            details.cell_styles.insert(position, style);
                        }
                    }
                    b"dataValidation" => {
                        let element = XmlElement::from_start(e);
                        let sqref = element.attr("sqref").unwrap_or_default().to_string();
                        let rule = DataValidation::from_attributes(&element);
                        if is_empty {
                            details.validations.insert(sqref, rule);
                        } else {
                            pending = Some((sqref, rule));
                        }
                    }
                    b"formula1" if pending.is_some() && !is_empty => {
                        formula_slot = Some(FormulaSlot::First);
                        formula_text.clear();
                    }
                    b"formula2" if pending.is_some() && !is_empty => {
                        formula_slot = Some(FormulaSlot::Second);
                        formula_text.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) if formula_slot.is_some() => {
                formula_text.push_str(&e.xml_content()?);
            }
            Event::GeneralRef(ref e) if formula_slot.is_some() => {
                formula_text.push_str(&general_ref_text(e)?);
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"formula1" | b"formula2" => {
                    if let (Some(slot), Some((_, rule))) = (formula_slot.take(), pending.as_mut()) {
                        let value = Some(formula_text.trim().to_string());
                        match slot {
                            FormulaSlot::First => rule.formula1 = value,
                            FormulaSlot::Second => rule.formula2 = value,
                        }
                    }
                }
                b"dataValidation" => {
                    if let Some((sqref, rule)) = pending.take() {
                        details.validations.insert(sqref, rule);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(details)
}

/// The parts of an .xlsx/.xlsm package the extractor needs beyond calamine
pub struct XlsxParts {
    package: OoxmlPackage,
    /// sheet name → worksheet part
    sheet_parts: HashMap<String, String>,
    styles: StyleSheet,
    pub properties: CoreProperties,
}

impl XlsxParts {
    pub fn open(path: &Path) -> Result<Self> {
        let mut package = OoxmlPackage::open(path)?;
        let workbook_part = package.main_part("xl/workbook.xml")?;
        let workbook = package
            .read_xml(&workbook_part)?
            .ok_or_else(|| anyhow!("Workbook part {} is missing", workbook_part))?;
        let relationships = package.relationships(&workbook_part)?;

        let targets: HashMap<&str, &str> = relationships
            .iter()
            .filter(|rel| !rel.external && rel.rel_type.ends_with(WORKSHEET_REL))
            .map(|rel| (rel.id.as_str(), rel.target.as_str()))
            .collect();

        let mut sheet_parts = HashMap::new();
        if let Some(sheets) = workbook.child("sheets") {
            for sheet in sheets.children_named("sheet") {
                let (Some(name), Some(id)) = (sheet.attr("name"), sheet.attr("id")) else {
                    continue;
                };
                if let Some(target) = targets.get(id) {
                    sheet_parts.insert(name.to_string(), target.to_string());
                }
            }
        }

        let styles_part = relationships
            .iter()
            .find(|rel| !rel.external && rel.rel_type.ends_with(STYLES_REL))
            .map(|rel| rel.target.clone());
        let styles = match styles_part {
            Some(part) => package
                .read_xml(&part)?
                .map(|root| StyleSheet::from_xml(&root))
                .unwrap_or_default(),
            None => StyleSheet::default(),
        };

        let properties = package.core_properties().unwrap_or_else(|e| {
            log::debug!("No usable core properties in {}: {:#}", path.display(), e);
            CoreProperties::default()
        });

        Ok(Self {
            package,
            sheet_parts,
            styles,
            properties,
        })
    }

    pub fn sheet_part(&self, sheet_name: &str) -> Option<&str> {
        self.sheet_parts.get(sheet_name).map(String::as_str)
    }

    pub fn sheet_details(&mut self, sheet_name: &str) -> Result<SheetDetails> {
        let Some(part) = self.sheet_parts.get(sheet_name).cloned() else {
            bail!("No worksheet part for sheet {:?}", sheet_name);
        };
        let xml = self
            .package
            .read_part(&part)?
            .ok_or_else(|| anyhow!("Worksheet part {} is missing", part))?;
        scan_sheet_xml(&xml).with_context(|| format!("Failed to scan worksheet {:?}", sheet_name))
    }

    pub fn cell_formatting(&self, xf_index: usize) -> CellFormatting {
        self.styles.cell_formatting(xf_index)
    }
}
