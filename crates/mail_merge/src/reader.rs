//! Header-aligned records from a tabular data source

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::csv_parser::{detect_delimiter, CsvConfig, CsvParser};
use crate::error::{MailMergeError, Result};
use crate::sheet::{column_letter, Workbook};
use crate::workbook_parser::WorkbookParser;
use crate::xlsx_parser::XlsxParser;

/// One data row, positionally aligned to the headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub values: Vec<Option<String>>,
}

impl Record {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Value of the column at `index`; `None` for an empty cell
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Headers and records read from one data source
///
/// A `None` header marks a column that never takes part in substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularData {
    pub headers: Vec<Option<String>>,
    pub records: Vec<Record>,
}

impl TabularData {
    pub fn new(headers: Vec<Option<String>>, records: Vec<Record>) -> Self {
        Self { headers, records }
    }

    /// Get the number of records
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }
}

/// Reads the first sheet of a data source into header-aligned records
#[derive(Debug, Clone, Default)]
pub struct TabularDataReader;

impl TabularDataReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a data file, choosing the decoder by extension
    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<TabularData> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let workbook = match extension.as_str() {
            "xlsx" | "xlsm" => XlsxParser::new().parse_file(path)?,
            "xls" | "xlsb" | "ods" => WorkbookParser::new().parse_file(path)?,
            "csv" | "tsv" | "txt" => {
                let content = std::fs::read_to_string(path)?;
                let config = if extension == "tsv" {
                    CsvConfig::tab()
                } else {
                    CsvConfig::default().with_delimiter(detect_delimiter(&content))
                };
                debug!(delimiter = ?config.delimiter, "Reading delimited data");
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("data")
                    .to_string();
                CsvParser::with_config(config).parse_string(&content, name)?
            }
            _ => {
                return Err(MailMergeError::UnsupportedFormat(format!(
                    "{} (expected xlsx, xlsm, xls, xlsb, ods, csv, tsv or txt)",
                    path.display()
                )))
            }
        };

        self.read(&workbook)
    }

    /// Extract headers from row 0 and records from every later present row
    pub fn read(&self, workbook: &Workbook) -> Result<TabularData> {
        let sheet = workbook
            .first_sheet()
            .ok_or_else(|| MailMergeError::DataFormat("data source has no sheet".to_string()))?;

        let header_row = sheet.row(0).ok_or_else(|| {
            MailMergeError::DataFormat(format!("sheet '{}' has no header row", sheet.name))
        })?;
        let (Some(first), Some(last)) = (header_row.first_column(), header_row.last_column()) else {
            return Err(MailMergeError::DataFormat(format!(
                "header row of sheet '{}' is empty",
                sheet.name
            )));
        };

        let mut headers = Vec::with_capacity(last - first + 1);
        for column in first..=last {
            let header = header_row
                .cell(column)
                .map(|cell| cell.display_text())
                .filter(|text| !text.is_empty());
            if let Some(header) = &header {
                info!("Had header {} for column {}", header, column_letter(column));
            }
            headers.push(header);
        }

        let mut records = Vec::new();
        if let Some(last_row) = sheet.last_row_index() {
            for index in 1..=last_row {
                let Some(row) = sheet.row(index) else {
                    continue;
                };
                let values = (first..=last)
                    .map(|column| row.cell(column).map(|cell| cell.display_text()))
                    .collect();
                records.push(Record::new(values));
            }
        }

        info!("Read {} records", records.len());
        Ok(TabularData::new(headers, records))
    }
}
