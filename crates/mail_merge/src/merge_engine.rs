//! Mail Merge Execution Engine
//!
//! Iterates records, substitutes each record's values into a fresh copy of
//! the template region, reports unresolved placeholders and drives the
//! document's composition.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::merge_field::{record_substitutions, NullValuePolicy};
use crate::reader::TabularData;

/// A template that can render its content once per record
///
/// The region is the part of the template rendered per record. The engine
/// clones it, substitutes into the clone and hands the rendering back to
/// the document to compose.
pub trait MergeDocument {
    type Region: Clone;

    /// A fresh copy of the template region
    fn clone_template_region(&self) -> Self::Region;

    /// Replace every occurrence of `token` in the region; returns the number
    /// of replacements made
    fn substitute_placeholder(&self, region: &mut Self::Region, token: &str, value: &str) -> usize;

    /// Placeholders left in a rendered region
    fn unresolved_placeholders(&self, region: &Self::Region) -> Vec<String>;

    /// Add a rendered region to the output. The first rendering replaces the
    /// template content.
    fn append_rendering(&mut self, region: Self::Region, is_first: bool) -> Result<()>;

    /// Empty the template region, used when there are no records
    fn clear_template_region(&mut self) -> Result<()>;

    /// Serialize the composed document
    fn serialize(self) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOptions {
    pub null_values: NullValuePolicy,
    /// Maximum number of records to merge; 0 merges all
    pub max_records: usize,
}

impl Default for MergeOptions {
    fn default() -> Self { Self { null_values: NullValuePolicy::Empty, max_records: 0 } }
}

impl MergeOptions {
    pub fn new() -> Self { Self::default() }
    pub fn with_null_values(mut self, policy: NullValuePolicy) -> Self { self.null_values = policy; self }
    pub fn with_max_records(mut self, max: usize) -> Self { self.max_records = max; self }
}

/// Placeholders left in one record's rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionWarning {
    /// Zero-based index of the record
    pub record_index: usize,
    pub placeholders: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeReport {
    pub total_records: usize,
    pub records_merged: usize,
    pub warnings: Vec<ResolutionWarning>,
    pub summary: String,
}

impl MergeReport {
    pub fn new(total_records: usize) -> Self { Self { total_records, ..Default::default() } }
    pub fn has_warnings(&self) -> bool { !self.warnings.is_empty() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeProgress { pub current_record: usize, pub total_records: usize, pub percent: f64 }

impl MergeProgress {
    pub fn at(current: usize, total: usize) -> Self {
        let percent = if total > 0 { (current as f64 / total as f64) * 100.0 } else { 0.0 };
        Self { current_record: current, total_records: total, percent }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    options: MergeOptions,
}

impl MergeEngine {
    pub fn new(options: MergeOptions) -> Self { Self { options } }

    pub fn options(&self) -> &MergeOptions { &self.options }

    /// Render every record into `document` in record order
    pub fn merge<D: MergeDocument>(&self, document: &mut D, data: &TabularData) -> Result<MergeReport> {
        self.merge_with_progress(document, data, |_| {})
    }

    pub fn merge_with_progress<D, F>(&self, document: &mut D, data: &TabularData, mut on_progress: F) -> Result<MergeReport>
    where
        D: MergeDocument,
        F: FnMut(MergeProgress),
    {
        let total = match self.options.max_records {
            0 => data.record_count(),
            max => max.min(data.record_count()),
        };
        let mut report = MergeReport::new(data.record_count());

        if total == 0 {
            info!("No records to merge, emitting an empty body");
            document.clear_template_region()?;
        }

        for (index, record) in data.records.iter().take(total).enumerate() {
            let mut region = document.clone_template_region();
            let mut replaced = 0;
            for sub in record_substitutions(&data.headers, record, self.options.null_values) {
                replaced += document.substitute_placeholder(&mut region, &sub.token, &sub.value);
            }
            debug!(record = index + 1, replaced, "Rendered record");

            let placeholders = document.unresolved_placeholders(&region);
            if !placeholders.is_empty() {
                warn!(
                    "Record {} left unresolved placeholders: {}",
                    index + 1,
                    placeholders.join(", ")
                );
                report.warnings.push(ResolutionWarning { record_index: index, placeholders });
            }

            document.append_rendering(region, index == 0)?;
            report.records_merged += 1;
            on_progress(MergeProgress::at(index + 1, total));
        }

        report.summary = format!(
            "Processed {} of {} records ({} with unresolved placeholders)",
            report.records_merged,
            report.total_records,
            report.warnings.len()
        );
        info!("{}", report.summary);
        if let Ok(json) = serde_json::to_string(&report) {
            debug!(report = %json, "Merge report");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge_field::{find_unresolved, render_text, Substitution};
    use crate::reader::Record;

    /// Plain-text document: every rendering is one line of output
    #[derive(Default)]
    struct TextDocument { template: String, output: Vec<String>, cleared: bool }

    impl MergeDocument for TextDocument {
        type Region = String;
        fn clone_template_region(&self) -> String { self.template.clone() }
        fn substitute_placeholder(&self, region: &mut String, token: &str, value: &str) -> usize {
            let count = region.matches(token).count();
            *region = render_text(region, &[Substitution { token: token.into(), value: value.into() }]);
            count
        }
        fn unresolved_placeholders(&self, region: &String) -> Vec<String> { find_unresolved(region) }
        fn append_rendering(&mut self, region: String, is_first: bool) -> Result<()> {
            assert_eq!(is_first, self.output.is_empty());
            self.output.push(region);
            Ok(())
        }
        fn clear_template_region(&mut self) -> Result<()> { self.cleared = true; Ok(()) }
        fn serialize(self) -> Result<Vec<u8>> { Ok(self.output.concat().into_bytes()) }
    }

    fn text_doc(template: &str) -> TextDocument { TextDocument { template: template.into(), ..Default::default() } }

    fn data(headers: &[Option<&str>], rows: &[&[Option<&str>]]) -> TabularData {
        TabularData::new(
            headers.iter().map(|h| h.map(str::to_string)).collect(),
            rows.iter().map(|r| Record::new(r.iter().map(|v| v.map(str::to_string)).collect())).collect(),
        )
    }

    #[test] fn test_merge_all_records() {
        let mut doc = text_doc("Hello ${name}, you are ${age}\n");
        let d = data(&[Some("name"), Some("age")], &[&[Some("Alice"), Some("30")], &[Some("Bob"), Some("25")]]);
        let report = MergeEngine::default().merge(&mut doc, &d).unwrap();
        assert_eq!(report.records_merged, 2); assert!(!report.has_warnings());
        assert_eq!(doc.serialize().unwrap(), b"Hello Alice, you are 30\nHello Bob, you are 25\n");
    }

    #[test] fn test_unresolved_placeholders_warn() {
        let mut doc = text_doc("${name} ${age} ${nothing}");
        let d = data(&[Some("name"), None, Some("age")], &[&[Some("Alice"), Some("ignored"), Some("30")]]);
        let report = MergeEngine::default().merge(&mut doc, &d).unwrap();
        assert_eq!(report.warnings, vec![ResolutionWarning { record_index: 0, placeholders: vec!["${nothing}".into()] }]);
        assert_eq!(doc.output, vec!["Alice 30 ${nothing}"]);
    }

    #[test] fn test_keep_placeholder_policy() {
        let mut doc = text_doc("${name}:${city}");
        let d = data(&[Some("name"), Some("city")], &[&[Some("Alice"), None]]);
        let engine = MergeEngine::new(MergeOptions::new().with_null_values(NullValuePolicy::KeepPlaceholder));
        let report = engine.merge(&mut doc, &d).unwrap();
        assert_eq!(doc.output, vec!["Alice:${city}"]); assert_eq!(report.warnings.len(), 1);
    }

    #[test] fn test_no_records_clears_template() {
        let mut doc = text_doc("${name}");
        let report = MergeEngine::default().merge(&mut doc, &data(&[Some("name")], &[])).unwrap();
        assert_eq!(report.records_merged, 0); assert!(doc.cleared); assert!(doc.output.is_empty());
    }

    #[test] fn test_max_records() {
        let mut doc = text_doc("${n}");
        let d = data(&[Some("n")], &[&[Some("1")], &[Some("2")], &[Some("3")]]);
        let report = MergeEngine::new(MergeOptions::new().with_max_records(2)).merge(&mut doc, &d).unwrap();
        assert_eq!(report.records_merged, 2); assert_eq!(report.total_records, 3);
        assert_eq!(report.summary, "Processed 2 of 3 records (0 with unresolved placeholders)");
    }

    #[test] fn test_merge_with_progress() {
        let mut doc = text_doc("${n}");
        let d = data(&[Some("n")], &[&[Some("1")], &[Some("2")]]);
        let mut updates = Vec::new();
        MergeEngine::default().merge_with_progress(&mut doc, &d, |p| updates.push(p)).unwrap();
        assert_eq!(updates.len(), 2); assert!((updates[1].percent - 100.0).abs() < f64::EPSILON);
    }

    #[test] fn test_merge_options_defaults() {
        let opts = MergeOptions::default();
        assert_eq!(opts.null_values, NullValuePolicy::Empty); assert_eq!(opts.max_records, 0);
    }
}
