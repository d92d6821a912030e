//! Placeholder tokens and per-record substitution

use serde::{Deserialize, Serialize};

use crate::reader::Record;

/// Opening marker of a placeholder
pub const PLACEHOLDER_OPEN: &str = "${";
/// Closing marker of a placeholder
pub const PLACEHOLDER_CLOSE: &str = "}";

/// What an empty cell substitutes to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullValuePolicy {
    /// Replace the placeholder with the empty string
    #[default]
    Empty,
    /// Leave the placeholder in place so it is reported as unresolved
    KeepPlaceholder,
}

/// The placeholder token for a header: `name` becomes `${name}`
pub fn placeholder_token(name: &str) -> String {
    format!("{}{}{}", PLACEHOLDER_OPEN, name, PLACEHOLDER_CLOSE)
}

/// One token to replace and the text that replaces it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub token: String,
    pub value: String,
}

/// Substitutions for one record, in column order
///
/// Columns without a header are skipped. An empty cell yields the empty
/// string, or no substitution at all under [`NullValuePolicy::KeepPlaceholder`].
pub fn record_substitutions(
    headers: &[Option<String>],
    record: &Record,
    policy: NullValuePolicy,
) -> Vec<Substitution> {
    headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| {
            let header = header.as_deref()?;
            let value = match (record.get(index), policy) {
                (Some(value), _) => value.to_string(),
                (None, NullValuePolicy::Empty) => String::new(),
                (None, NullValuePolicy::KeepPlaceholder) => return None,
            };
            Some(Substitution { token: placeholder_token(header), value })
        })
        .collect()
}

/// Apply substitutions one after another; a later one sees the output of
/// the earlier ones
pub fn render_text(text: &str, substitutions: &[Substitution]) -> String {
    substitutions.iter().fold(text.to_string(), |acc, sub| {
        if acc.contains(&sub.token) { acc.replace(&sub.token, &sub.value) } else { acc }
    })
}

/// Placeholders still present in `text`, in order of first appearance
///
/// An opening marker without a closing one is reported up to the end of the
/// text.
pub fn find_unresolved(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
        let candidate = &rest[start..];
        let end = candidate
            .find(PLACEHOLDER_CLOSE)
            .map(|i| i + PLACEHOLDER_CLOSE.len())
            .unwrap_or(candidate.len());
        let token = &candidate[..end];
        if !found.iter().any(|t| t == token) {
            found.push(token.to_string());
        }
        rest = &candidate[end.max(PLACEHOLDER_OPEN.len())..];
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn headers(names: &[Option<&str>]) -> Vec<Option<String>> {
        names.iter().map(|n| n.map(str::to_string)).collect()
    }

    fn record(values: &[Option<&str>]) -> Record {
        Record::new(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    #[test]
    fn test_placeholder_token() {
        assert_eq!(placeholder_token("name"), "${name}");
        assert_eq!(placeholder_token("first name"), "${first name}");
    }

    #[test]
    fn test_render_record() {
        let subs = record_substitutions(
            &headers(&[Some("name"), Some("age")]),
            &record(&[Some("Alice"), Some("30")]),
            NullValuePolicy::Empty,
        );
        assert_eq!(render_text("Hello ${name}, you are ${age}", &subs), "Hello Alice, you are 30");
    }

    #[test]
    fn test_every_occurrence_is_replaced() {
        let subs = record_substitutions(&headers(&[Some("n")]), &record(&[Some("x")]), NullValuePolicy::Empty);
        assert_eq!(render_text("${n}-${n}-${n}", &subs), "x-x-x");
    }

    #[test]
    fn test_tombstone_column_is_skipped() {
        let subs = record_substitutions(
            &headers(&[Some("name"), None, Some("age")]),
            &record(&[Some("Alice"), Some("ignored"), Some("30")]),
            NullValuePolicy::Empty,
        );
        assert_eq!(subs.len(), 2);
        let text = render_text("${name} ${age} ${nothing}", &subs);
        assert_eq!(text, "Alice 30 ${nothing}");
        assert_eq!(find_unresolved(&text), vec!["${nothing}"]);
    }

    #[test]
    fn test_null_value_policies() {
        let h = headers(&[Some("name"), Some("city")]);
        let r = record(&[Some("Alice"), None]);

        let subs = record_substitutions(&h, &r, NullValuePolicy::Empty);
        assert_eq!(render_text("${name} from ${city}", &subs), "Alice from ");

        let subs = record_substitutions(&h, &r, NullValuePolicy::KeepPlaceholder);
        assert_eq!(render_text("${name} from ${city}", &subs), "Alice from ${city}");
    }

    #[test]
    fn test_values_are_rescanned_by_later_columns() {
        let subs = record_substitutions(
            &headers(&[Some("a"), Some("b")]),
            &record(&[Some("${b}"), Some("B")]),
            NullValuePolicy::Empty,
        );
        assert_eq!(render_text("${a}", &subs), "B");
    }

    #[test]
    fn test_find_unresolved() {
        assert!(find_unresolved("no placeholders").is_empty());
        assert_eq!(find_unresolved("${a} ${b} ${a}"), vec!["${a}", "${b}"]);
        assert_eq!(find_unresolved("cost: ${oops"), vec!["${oops"]);
        assert_eq!(find_unresolved("${"), vec!["${"]);
    }

    proptest! {
        #[test]
        fn prop_text_without_placeholders_is_unchanged(
            text in "[^$]*",
            name in "[a-z]{1,8}",
            value in ".*",
        ) {
            let subs = vec![Substitution { token: placeholder_token(&name), value }];
            prop_assert_eq!(render_text(&text, &subs), text);
        }

        #[test]
        fn prop_tombstone_column_never_substituted(
            name in "[a-z]{1,8}",
            value in "[A-Z]{1,8}",
        ) {
            let subs = record_substitutions(
                &[None],
                &Record::new(vec![Some(value)]),
                NullValuePolicy::Empty,
            );
            let text = placeholder_token(&name);
            prop_assert_eq!(render_text(&text, &subs), text);
        }
    }
}
