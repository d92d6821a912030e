//! XLSX parser for mail merge data sources
//!
//! Reads the first worksheet of an OOXML workbook straight from the package
//! so that row presence and the number format of every cell are kept.

use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use store::docx::Relationships;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{MailMergeError, Result};
use crate::number_format;
use crate::sheet::{column_index, Cell, CellValue, Sheet, SheetRow, Workbook};

/// Relationship types used to find workbook parts
mod relationship_types {
    pub const OFFICE_DOCUMENT: &[&str] = &[
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument",
        "http://purl.oclc.org/ooxml/officeDocument/relationships/officeDocument",
    ];
    pub const SHARED_STRINGS: &[&str] = &[
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings",
        "http://purl.oclc.org/ooxml/officeDocument/relationships/sharedStrings",
    ];
    pub const STYLES: &[&str] = &[
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles",
        "http://purl.oclc.org/ooxml/officeDocument/relationships/styles",
    ];
}

const ROOT_RELS: &str = "_rels/.rels";
const DEFAULT_WORKBOOK: &str = "xl/workbook.xml";

/// Days between the 1900 and 1904 date systems
const DATE_1904_OFFSET: f64 = 1462.0;

/// XLSX parser producing a single-sheet workbook
#[derive(Debug, Default)]
pub struct XlsxParser;

impl XlsxParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse an XLSX file
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Workbook> {
        let file = File::open(path.as_ref())?;
        self.parse_reader(BufReader::new(file))
    }

    /// Parse XLSX from bytes
    pub fn parse_bytes(&self, data: &[u8]) -> Result<Workbook> {
        self.parse_reader(Cursor::new(data))
    }

    fn parse_reader<R: Read + Seek>(&self, reader: R) -> Result<Workbook> {
        let mut archive = ZipArchive::new(reader).map_err(xlsx_error)?;

        let workbook_path = read_part(&mut archive, ROOT_RELS)?
            .map(|xml| Relationships::parse(&xml).map_err(xlsx_error))
            .transpose()?
            .and_then(|rels| find_target(&rels, "", relationship_types::OFFICE_DOCUMENT))
            .unwrap_or_else(|| DEFAULT_WORKBOOK.to_string());

        let workbook_xml = read_part(&mut archive, &workbook_path)?.ok_or_else(|| {
            MailMergeError::Xlsx(format!("Missing workbook part: {}", workbook_path))
        })?;
        let info = parse_workbook_info(&workbook_xml)?;

        let Some((sheet_name, sheet_rel_id)) = info.first_sheet else {
            return Ok(Workbook::new());
        };

        let base_dir = part_dir(&workbook_path);
        let rels = match read_part(&mut archive, &rels_path(&workbook_path))? {
            Some(xml) => Relationships::parse(&xml).map_err(xlsx_error)?,
            None => Relationships::default(),
        };

        let sheet_path = rels
            .get(&sheet_rel_id)
            .map(|rel| resolve_target(base_dir, &rel.target))
            .ok_or_else(|| {
                MailMergeError::Xlsx(format!("No target for sheet '{}' ({})", sheet_name, sheet_rel_id))
            })?;

        let shared_strings_path = find_target(&rels, base_dir, relationship_types::SHARED_STRINGS)
            .unwrap_or_else(|| resolve_target(base_dir, "sharedStrings.xml"));
        let shared_strings = match read_part(&mut archive, &shared_strings_path)? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };

        let styles_path = find_target(&rels, base_dir, relationship_types::STYLES)
            .unwrap_or_else(|| resolve_target(base_dir, "styles.xml"));
        let styles = match read_part(&mut archive, &styles_path)? {
            Some(xml) => CellStyles::parse(&xml)?,
            None => CellStyles::default(),
        };

        let sheet_xml = read_part(&mut archive, &sheet_path)?.ok_or_else(|| {
            MailMergeError::Xlsx(format!("Missing worksheet part: {}", sheet_path))
        })?;

        let context = SheetContext {
            shared_strings: &shared_strings,
            styles: &styles,
            date1904: info.date1904,
        };
        let sheet = parse_sheet(sheet_name, &sheet_xml, &context)?;

        tracing::debug!(
            sheet = %sheet.name,
            rows = sheet.row_count(),
            path = %sheet_path,
            "Parsed XLSX worksheet"
        );
        Ok(Workbook::new().with_sheet(sheet))
    }
}

fn xlsx_error(err: impl Display) -> MailMergeError {
    MailMergeError::Xlsx(err.to_string())
}

/// Read a package part as text; a missing part is `None`
fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(xlsx_error(e)),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn find_target(rels: &Relationships, base_dir: &str, types: &[&str]) -> Option<String> {
    types
        .iter()
        .find_map(|t| rels.get_by_type(t))
        .map(|rel| resolve_target(base_dir, &rel.target))
}

/// Directory of a part name, without the trailing slash
fn part_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Name of the relationships part belonging to `path`
fn rels_path(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", path),
    }
}

/// Resolve a relationship target against the directory of its source part
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Value of the attribute with the given local name
fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(xlsx_error)?;
        if attr.key.local_name().as_ref() == name {
            return Ok(Some(attr.unescape_value().map_err(xlsx_error)?.into_owned()));
        }
    }
    Ok(None)
}

struct WorkbookInfo {
    date1904: bool,
    /// Name and relationship id of the first sheet
    first_sheet: Option<(String, String)>,
}

fn parse_workbook_info(xml: &str) -> Result<WorkbookInfo> {
    let mut reader = Reader::from_str(xml);
    let mut info = WorkbookInfo {
        date1904: false,
        first_sheet: None,
    };

    loop {
        match reader.read_event().map_err(xlsx_error)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"workbookPr" => {
                    info.date1904 = matches!(
                        attribute(&e, b"date1904")?.as_deref(),
                        Some("1") | Some("true")
                    );
                }
                b"sheet" if info.first_sheet.is_none() => {
                    let name = attribute(&e, b"name")?.unwrap_or_default();
                    let id = attribute(&e, b"id")?.ok_or_else(|| {
                        MailMergeError::Xlsx(format!("Sheet '{}' has no relationship id", name))
                    })?;
                    info.first_sheet = Some((name, id));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(info)
}

/// Shared string table; rich text runs are concatenated, phonetic runs dropped
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event().map_err(xlsx_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" => in_text = phonetic_depth == 0,
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape().map_err(xlsx_error)?);
                }
            }
            Event::CData(c) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

/// Number formats of the cell styles (`cellXfs`)
#[derive(Debug, Default)]
struct CellStyles {
    custom_formats: HashMap<u32, String>,
    /// `numFmtId` of each cell style, by style index
    cell_formats: Vec<u32>,
}

impl CellStyles {
    fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut styles = Self::default();
        let mut in_cell_xfs = false;

        loop {
            match reader.read_event().map_err(xlsx_error)? {
                Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"numFmt" => {
                        let id = attribute(&e, b"numFmtId")?.and_then(|v| v.parse().ok());
                        let code = attribute(&e, b"formatCode")?;
                        if let (Some(id), Some(code)) = (id, code) {
                            styles.custom_formats.insert(id, code);
                        }
                    }
                    b"xf" if in_cell_xfs => {
                        let id = attribute(&e, b"numFmtId")?
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                        styles.cell_formats.push(id);
                    }
                    _ => {}
                },
                Event::End(e) => {
                    if e.local_name().as_ref() == b"cellXfs" {
                        in_cell_xfs = false;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(styles)
    }

    /// Format code of a style index
    fn format_code(&self, style: usize) -> Option<String> {
        let id = *self.cell_formats.get(style)?;
        self.custom_formats
            .get(&id)
            .cloned()
            .or_else(|| number_format::builtin_format(id).map(str::to_string))
    }
}

struct SheetContext<'a> {
    shared_strings: &'a [String],
    styles: &'a CellStyles,
    date1904: bool,
}

/// A cell being read from the worksheet
#[derive(Default)]
struct PendingCell {
    column: usize,
    cell_type: Option<String>,
    style: Option<usize>,
    value: Option<String>,
    inline_text: Option<String>,
}

/// Split a cell reference such as `B12` into zero-based row and column
fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    let column = column_index(letters.trim_start_matches('$'))?;
    let row: usize = digits.parse().ok()?;
    Some((row.checked_sub(1)?, column))
}

fn parse_sheet(name: String, xml: &str, context: &SheetContext<'_>) -> Result<Sheet> {
    let mut reader = Reader::from_str(xml);
    let mut sheet = Sheet::new(name);

    let mut current_row: Option<(usize, SheetRow)> = None;
    let mut next_row = 0usize;
    let mut next_column = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        let event = reader.read_event().map_err(xlsx_error)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                let index = match attribute(e, b"r")? {
                    Some(r) => r
                        .parse::<usize>()
                        .ok()
                        .and_then(|r| r.checked_sub(1))
                        .ok_or_else(|| MailMergeError::Xlsx(format!("Invalid row number: {}", r)))?,
                    None => next_row,
                };
                next_row = index + 1;
                next_column = 0;
                if matches!(event, Event::Empty(_)) {
                    sheet.insert_row(index, SheetRow::new());
                } else {
                    current_row = Some((index, SheetRow::new()));
                }
            }
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                let column = match attribute(e, b"r")? {
                    Some(r) => parse_cell_ref(&r)
                        .map(|(_, column)| column)
                        .ok_or_else(|| MailMergeError::Xlsx(format!("Invalid cell reference: {}", r)))?,
                    None => next_column,
                };
                next_column = column + 1;
                let pending = PendingCell {
                    column,
                    cell_type: attribute(e, b"t")?,
                    style: attribute(e, b"s")?.and_then(|s| s.parse().ok()),
                    ..Default::default()
                };
                if matches!(event, Event::Empty(_)) {
                    finish_cell(pending, &mut current_row, context)?;
                } else {
                    cell = Some(pending);
                }
            }
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"v" => in_value = cell.is_some(),
                b"rPh" => phonetic_depth += 1,
                b"t" => {
                    in_inline_text = phonetic_depth == 0 && cell.is_some();
                    if let Some(c) = cell.as_mut() {
                        c.inline_text.get_or_insert_with(String::new);
                    }
                }
                _ => {}
            },
            Event::Text(ref t) if in_value || in_inline_text => {
                let text = t.unescape().map_err(xlsx_error)?;
                if let Some(c) = cell.as_mut() {
                    let target = if in_value {
                        c.value.get_or_insert_with(String::new)
                    } else {
                        c.inline_text.get_or_insert_with(String::new)
                    };
                    target.push_str(&text);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" => {
                    in_value = false;
                    if let Some(c) = cell.as_mut() {
                        c.value.get_or_insert_with(String::new);
                    }
                }
                b"t" => in_inline_text = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"c" => {
                    if let Some(pending) = cell.take() {
                        finish_cell(pending, &mut current_row, context)?;
                    }
                }
                b"row" => {
                    if let Some((index, row)) = current_row.take() {
                        sheet.insert_row(index, row);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(sheet)
}

fn finish_cell(
    pending: PendingCell,
    current_row: &mut Option<(usize, SheetRow)>,
    context: &SheetContext<'_>,
) -> Result<()> {
    let column = pending.column;
    let cell = build_cell(pending, context)?;
    if let Some((_, row)) = current_row.as_mut() {
        row.set_cell(column, cell);
    }
    Ok(())
}

fn build_cell(pending: PendingCell, context: &SheetContext<'_>) -> Result<Cell> {
    let format = pending
        .style
        .and_then(|s| context.styles.format_code(s));

    if pending.cell_type.as_deref() == Some("inlineStr") {
        return Ok(match pending.inline_text {
            Some(text) => Cell::text(text),
            None => Cell::new(CellValue::Blank),
        });
    }

    let Some(raw) = pending.value else {
        return Ok(Cell::new(CellValue::Blank));
    };

    let value = match pending.cell_type.as_deref() {
        Some("s") => {
            let text = raw
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| context.shared_strings.get(i))
                .ok_or_else(|| MailMergeError::Xlsx(format!("Invalid shared string index: {}", raw)))?;
            CellValue::Text(text.clone())
        }
        Some("str") => CellValue::Text(raw),
        Some("b") => CellValue::Boolean(matches!(raw.trim(), "1" | "true")),
        Some("e") => CellValue::Error(raw),
        Some("d") => match iso_to_serial(raw.trim()) {
            Some(serial) => CellValue::Number(serial),
            None => CellValue::Text(raw),
        },
        _ => match raw.trim().parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::Text(raw),
        },
    };

    let value = match value {
        CellValue::Number(n)
            if context.date1904
                && pending.cell_type.as_deref() != Some("d")
                && format.as_deref().is_some_and(number_format::is_date_format) =>
        {
            CellValue::Number(n + DATE_1904_OFFSET)
        }
        other => other,
    };

    Ok(Cell { value, format })
}

/// Serial number in the 1900 date system for an ISO 8601 date or date-time
fn iso_to_serial(value: &str) -> Option<f64> {
    let datetime = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let mut days = (datetime.date() - epoch).num_days();
    // Serial 60 is the nonexistent 1900-02-29
    if days <= 60 {
        days -= 1;
    }
    let seconds = datetime.time().num_seconds_from_midnight() as f64
        + datetime.time().nanosecond() as f64 / 1e9;
    Some(days as f64 + seconds / 86_400.0)
}
