//! Minimal .docx / .xlsx packages generated on the fly for tests.

use std::io::Write;

use tempfile::NamedTempFile;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const S_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const CORE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>Fixture</dc:title><dc:creator>Test Author</dc:creator><cp:lastModifiedBy>Reviewer</cp:lastModifiedBy><dcterms:created xsi:type="dcterms:W3CDTF">2024-03-01T10:00:00Z</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">2024-03-02T11:30:00Z</dcterms:modified></cp:coreProperties>"#;

pub const DOCX_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style></w:styles>"#;

/// Write `parts` into a zip archive stored in a temp file ending in `suffix`
pub fn package(suffix: &str, parts: &[(&str, String)]) -> NamedTempFile {
    let file = NamedTempFile::with_suffix(suffix).unwrap();
    let mut zip = ZipWriter::new(file.reopen().unwrap());
    let options = SimpleFileOptions::default();
    for (name, content) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    file
}

fn package_rels(main_part: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="{main_part}"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#
    )
}

pub fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

/// A table whose rows are given as lists of cell texts
pub fn table(rows: &[&[&str]]) -> String {
    let mut xml = String::from("<w:tbl><w:tblPr/>");
    for row in rows {
        xml.push_str("<w:tr>");
        for cell in *row {
            xml.push_str(&format!("<w:tc>{}</w:tc>", paragraph(cell)));
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

/// A .docx whose body holds `body_xml`
pub fn docx(body_xml: &str) -> NamedTempFile {
    docx_with_suffix(body_xml, ".docx")
}

pub fn docx_with_suffix(body_xml: &str, suffix: &str) -> NamedTempFile {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:body>{body_xml}<w:sectPr/></w:body></w:document>"#
    );
    let document_rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/></Relationships>"#
    );
    package(
        suffix,
        &[
            ("[Content_Types].xml", content_types()),
            ("_rels/.rels", package_rels("word/document.xml")),
            ("word/document.xml", document),
            ("word/_rels/document.xml.rels", document_rels),
            ("word/styles.xml", DOCX_STYLES.to_string()),
            ("docProps/core.xml", CORE_XML.to_string()),
        ],
    )
}

fn content_types() -> String {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_string()
}

/// One worksheet of an .xlsx fixture
pub struct SheetSpec<'a> {
    pub name: &'a str,
    /// Inner XML of `<sheetData>`
    pub sheet_data: &'a str,
    /// XML placed after `<sheetData>` (e.g. `<dataValidations>`)
    pub trailer: &'a str,
}

pub const XLSX_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="0.000"/></numFmts><fonts count="2"><font><sz val="11"/><color theme="1"/><name val="Calibri"/></font><font><b/><i/><u/><sz val="14"/><color rgb="FFFF0000"/><name val="Arial"/></font></fonts><fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/><bgColor indexed="64"/></patternFill></fill></fills><borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left style="thin"><color rgb="FF000000"/></left><right/><top/><bottom style="double"><color auto="1"/></bottom><diagonal/></border></borders><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/><xf numFmtId="164" fontId="1" fillId="2" borderId="1" applyFont="1"><alignment horizontal="center" vertical="top" wrapText="1" textRotation="45"/></xf><xf numFmtId="14" fontId="0" fillId="0" borderId="0"/></cellXfs></styleSheet>"#;

/// An .xlsx (or .xlsm, by suffix) with the given sheets and the fixture stylesheet
pub fn xlsx(suffix: &str, sheets: &[SheetSpec<'_>]) -> NamedTempFile {
    let mut workbook_sheets = String::new();
    let mut workbook_rels = String::new();
    let mut parts = vec![
        ("[Content_Types].xml".to_string(), content_types()),
        ("_rels/.rels".to_string(), package_rels("xl/workbook.xml")),
        ("docProps/core.xml".to_string(), CORE_XML.to_string()),
        ("xl/styles.xml".to_string(), XLSX_STYLES.to_string()),
    ];

    for (index, sheet) in sheets.iter().enumerate() {
        let n = index + 1;
        workbook_sheets.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            sheet.name
        ));
        // Sheet parts deliberately numbered in reverse to make name-based guessing fail
        let part_number = sheets.len() - index;
        workbook_rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{part_number}.xml"/>"#
        ));
        parts.push((
            format!("xl/worksheets/sheet{part_number}.xml"),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{S_NS}" xmlns:r="{R_NS}"><sheetData>{}</sheetData>{}</worksheet>"#,
                sheet.sheet_data, sheet.trailer
            ),
        ));
    }
    let styles_id = sheets.len() + 1;
    workbook_rels.push_str(&format!(
        r#"<Relationship Id="rId{styles_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
    ));

    parts.push((
        "xl/workbook.xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{S_NS}" xmlns:r="{R_NS}"><sheets>{workbook_sheets}</sheets><definedNames><definedName name="Totals">'{}'!$A$1:$B$2</definedName></definedNames></workbook>"#,
            sheets.first().map(|s| s.name).unwrap_or("Sheet1")
        ),
    ));
    parts.push((
        "xl/_rels/workbook.xml.rels".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}">{workbook_rels}</Relationships>"#
        ),
    ));

    let borrowed: Vec<(&str, String)> = parts
        .iter()
        .map(|(name, content)| (name.as_str(), content.clone()))
        .collect();
    package(suffix, &borrowed)
}
