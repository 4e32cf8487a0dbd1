//! Column resolution across naming conventions.
//!
//! Source exports name the same field differently: localized UI labels
//! (`"Name 1"`, `"Straße"`) in one system, technical field codes (`NAME1`, `STRAS`) in
//! another. A logical field is therefore declared as an ordered alias list and resolved
//! to the first alias that carries a value.

use crate::models::{is_blank, Row};

/// Resolve a logical field to its trimmed value.
///
/// Returns the value of the first alias that exists in the row (case-insensitive) and
/// is non-empty after trimming. Returns `""` when no alias carries a value.
pub fn resolve<'r, S: AsRef<str>>(row: &'r Row, aliases: &[S]) -> &'r str {
    resolve_opt(row, aliases).unwrap_or("")
}

/// Like [`resolve`], but `None` instead of `""` when nothing matched.
pub fn resolve_opt<'r, S: AsRef<str>>(row: &'r Row, aliases: &[S]) -> Option<&'r str> {
    aliases
        .iter()
        .filter_map(|alias| row.get(alias.as_ref()))
        .find(|value| !is_blank(value))
        .map(str::trim)
}

/// First candidate that is present and non-blank.
pub fn first_nonempty<'a, I>(candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|v| !is_blank(v))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> Row {
        cells.iter().copied().collect()
    }

    #[test]
    fn test_alias_order_does_not_matter_when_one_is_populated() {
        let r = row(&[("Name 1", "Müller Logistik"), ("Ort", "Köln")]);

        assert_eq!(resolve(&r, &["Name 1", "NAME1"]), "Müller Logistik");
        assert_eq!(resolve(&r, &["NAME1", "Name 1"]), "Müller Logistik");
    }

    #[test]
    fn test_empty_alias_falls_through() {
        let r = row(&[("NAME1", "   "), ("Name 1", "ACME")]);
        assert_eq!(resolve(&r, &["NAME1", "Name 1"]), "ACME");

        let r = row(&[("NAME1", "nan"), ("Name 1", "ACME")]);
        assert_eq!(resolve(&r, &["NAME1", "Name 1"]), "ACME");
    }

    #[test]
    fn test_first_populated_alias_wins() {
        let r = row(&[("Kreditor", "100001"), ("LIFNR", "100002")]);
        assert_eq!(resolve(&r, &["Kreditor", "LIFNR"]), "100001");
        assert_eq!(resolve(&r, &["LIFNR", "Kreditor"]), "100002");
    }

    #[test]
    fn test_case_insensitive_match_preserves_value_case() {
        let r = row(&[("stras", "  Hauptstraße 5 ")]);
        assert_eq!(resolve(&r, &["STRAS"]), "Hauptstraße 5");
    }

    #[test]
    fn test_leading_zeros_are_kept() {
        let r = row(&[("LIFNR", "0000100001")]);
        assert_eq!(resolve(&r, &["LIFNR"]), "0000100001");
    }

    #[test]
    fn test_absent_is_empty_string() {
        let r = row(&[("other", "x")]);
        assert_eq!(resolve(&r, &["LIFNR", "Kreditor"]), "");
        assert_eq!(resolve_opt(&r, &["LIFNR"]), None);
        let none: &[&str] = &[];
        assert_eq!(resolve(&r, none), "");
    }

    #[test]
    fn test_first_nonempty() {
        assert_eq!(first_nonempty([None, Some(""), Some(" EUR ")]), Some("EUR"));
        assert_eq!(first_nonempty([None, Some("  ")]), None);
    }
}
