//! In-place text replacement across the runs of a flat document

use doc_model::Section;

/// Replaces text run by run, leaving each run's formatting untouched
///
/// A token split across two runs is not matched.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunLevelReplacer;

impl RunLevelReplacer {
    /// Replace `token` with `value` in every run of `sections`; returns the
    /// number of replacements
    pub fn replace_all(sections: &mut [Section], token: &str, value: &str) -> usize {
        if token.is_empty() {
            return 0;
        }
        sections
            .iter_mut()
            .flat_map(|section| section.runs_mut())
            .map(|run| run.replace_text(token, value))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{Paragraph, Run};

    fn sections() -> Vec<Section> {
        vec![
            Section::with_paragraphs(
                vec![Paragraph::with_runs(
                    vec![
                        Run::with_formatting("\\pard ", "Dear "),
                        Run::with_formatting("{\\b ", "${name}"),
                        Run::with_formatting("}", ", ${name}!"),
                    ],
                    "\\par",
                )],
                "\\sect",
            ),
            Section::with_paragraphs(
                vec![Paragraph::with_runs(vec![Run::new("Age ${age}")], "\\par")],
                "",
            ),
        ]
    }

    #[test]
    fn test_replace_keeps_formatting() {
        let mut sections = sections();
        assert_eq!(RunLevelReplacer::replace_all(&mut sections, "${name}", "Alice"), 2);

        let runs = sections[0].paragraphs()[0].runs();
        assert_eq!(runs[1].formatting, "{\\b ");
        assert_eq!(runs[1].text, "Alice");
        assert_eq!(runs[2].text, ", Alice!");
    }

    #[test]
    fn test_replace_across_sections() {
        let mut sections = sections();
        assert_eq!(RunLevelReplacer::replace_all(&mut sections, "${age}", "30"), 1);
        assert_eq!(sections[1].paragraphs()[0].text(), "Age 30");
    }

    #[test]
    fn test_split_token_is_not_matched() {
        let mut sections = vec![Section::with_paragraphs(
            vec![Paragraph::with_runs(vec![Run::new("${na"), Run::new("me}")], "")],
            "",
        )];
        assert_eq!(RunLevelReplacer::replace_all(&mut sections, "${name}", "Alice"), 0);
        assert_eq!(sections[0].paragraphs()[0].text(), "${name}");
    }

    #[test]
    fn test_empty_token() {
        let mut sections = sections();
        assert_eq!(RunLevelReplacer::replace_all(&mut sections, "", "x"), 0);
    }
}
