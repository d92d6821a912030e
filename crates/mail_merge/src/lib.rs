//! Mail Merge
//!
//! This crate renders a template once per record of a tabular data source
//! and concatenates the renderings into a single output document.
//!
//! # Features
//!
//! - Data from XLSX (with cell number formats), XLS/XLSB/ODS and
//!   delimited text (comma, semicolon, tab, pipe)
//! - `${field}` placeholders matched against the header row
//! - DOCX templates: the body is rendered per record and composed inside a
//!   single body element
//! - RTF templates: the body sections are copied and substituted run by
//!   run, keeping every run's formatting
//!
//! # Example
//!
//! ```rust
//! use mail_merge::{CsvParser, TabularDataReader};
//!
//! let workbook = CsvParser::new()
//!     .parse_string("name,age\nAlice,30\nBob,25", "contacts")
//!     .unwrap();
//! let data = TabularDataReader::new().read(&workbook).unwrap();
//!
//! assert_eq!(data.record_count(), 2);
//! assert_eq!(data.records[1].get(0), Some("Bob"));
//! ```

mod csv_parser;
mod error;
mod workbook_parser;
mod xlsx_parser;
pub mod composer;
pub mod merge_engine;
pub mod merge_field;
pub mod number_format;
pub mod reader;
pub mod run_replacer;
pub mod sheet;
pub mod template;

use std::path::{Path, PathBuf};

use tracing::info;

// Re-export main types
pub use composer::{validate_fragment, BodyFragment, DocumentBodyComposer};
pub use csv_parser::{detect_delimiter, CsvConfig, CsvParser};
pub use error::{MailMergeError, Result};
pub use merge_engine::{MergeDocument, MergeEngine, MergeOptions, MergeProgress, MergeReport, ResolutionWarning};
pub use merge_field::{placeholder_token, NullValuePolicy};
pub use reader::{Record, TabularData, TabularDataReader};
pub use run_replacer::RunLevelReplacer;
pub use sheet::{Cell, CellValue, Sheet, SheetRow, Workbook};
pub use template::{FlatRunDocument, TemplateKind, TreeDocument};
pub use workbook_parser::WorkbookParser;
pub use xlsx_parser::XlsxParser;

/// One merge of a template with a data file into an output file
#[derive(Debug, Clone)]
pub struct MergeJob {
    template: PathBuf,
    data: PathBuf,
    output: PathBuf,
    kind: TemplateKind,
}

impl MergeJob {
    /// Check the inputs and the template type before anything is read
    pub fn new(
        template: impl Into<PathBuf>,
        data: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Result<Self> {
        let template = template.into();
        let data = data.into();
        check_input("Template", &template)?;
        check_input("Data", &data)?;
        let kind = TemplateKind::from_path(&template)?;
        Ok(Self {
            template,
            data,
            output: output.into(),
            kind,
        })
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    /// Run the merge. The output file is written only once the whole
    /// document has been composed.
    pub fn run(&self, options: &MergeOptions) -> Result<MergeReport> {
        info!(
            "Merging data from {} into {}",
            self.data.display(),
            self.template.display()
        );
        let data = TabularDataReader::new().read_path(&self.data)?;
        let engine = MergeEngine::new(options.clone());

        let (report, bytes) = match self.kind {
            TemplateKind::Tree => merge_into(&engine, TreeDocument::open(&self.template)?, &data)?,
            TemplateKind::FlatRun => {
                merge_into(&engine, FlatRunDocument::open(&self.template)?, &data)?
            }
        };

        info!("Writing overall result to {}", self.output.display());
        store::write_atomic(&self.output, &bytes)?;
        Ok(report)
    }
}

fn merge_into<D: MergeDocument>(
    engine: &MergeEngine,
    mut document: D,
    data: &TabularData,
) -> Result<(MergeReport, Vec<u8>)> {
    let report = engine.merge(&mut document, data)?;
    let bytes = document.serialize()?;
    Ok((report, bytes))
}

fn check_input(kind: &str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else if path.exists() {
        Err(MailMergeError::Usage(format!(
            "{} is not a regular file: {}",
            kind,
            path.display()
        )))
    } else {
        Err(MailMergeError::Usage(format!(
            "{} file not found: {}",
            kind,
            path.display()
        )))
    }
}

/// Merge `data` into `template` and write the result to `output`
pub fn merge_files(
    template: impl Into<PathBuf>,
    data: impl Into<PathBuf>,
    output: impl Into<PathBuf>,
    options: &MergeOptions,
) -> Result<MergeReport> {
    MergeJob::new(template, data, output)?.run(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_template_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data.csv");
        std::fs::write(&data, "name\nAlice\n").unwrap();

        let err = MergeJob::new(dir.path().join("missing.docx"), &data, dir.path().join("out.docx"))
            .unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("missing.docx"));
    }

    #[test]
    fn test_directory_input_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("letter.rtf");
        std::fs::write(&template, "{\\rtf1 \\pard x\\par}").unwrap();

        let err = MergeJob::new(&template, dir.path(), dir.path().join("out.rtf")).unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn test_unsupported_template_is_usage_error() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("letter.txt");
        let data = dir.path().join("data.csv");
        std::fs::write(&template, "Hello ${name}").unwrap();
        std::fs::write(&data, "name\nAlice\n").unwrap();

        assert!(MergeJob::new(&template, &data, dir.path().join("out.txt"))
            .unwrap_err()
            .is_usage());
    }

    #[test]
    fn test_data_error_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("letter.rtf");
        let data = dir.path().join("data.csv");
        let output = dir.path().join("out.rtf");
        std::fs::write(&template, "{\\rtf1 \\pard Hello $\\{name\\}\\par}").unwrap();
        std::fs::write(&data, "").unwrap();

        let err = merge_files(&template, &data, &output, &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, MailMergeError::DataFormat(_)));
        assert!(!output.exists());
    }
}
