use regex::Regex;
use uctenka_core::{FieldKind, FieldResult, TokenStream};

use crate::extract::FieldLocator;
use crate::locale::{compile, LocaleError, LocaleTables};

/// Returns the first token whose text matches any date pattern.
///
/// Patterns are tried in priority order against each token's raw text; the
/// matched substring is reported as-is, without calendar validation. Dates
/// split across two tokens are not reassembled.
pub struct DateLocator {
    patterns: Vec<Regex>,
}

impl DateLocator {
    pub fn new(tables: &LocaleTables) -> Result<Self, LocaleError> {
        let patterns = tables
            .date_patterns
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    fn first_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.patterns
            .iter()
            .find_map(|re| re.find(text))
            .map(|m| m.as_str())
    }
}

impl FieldLocator for DateLocator {
    fn kind(&self) -> FieldKind {
        FieldKind::Date
    }

    fn locate(&self, tokens: &TokenStream) -> FieldResult {
        tokens
            .iter()
            .find_map(|t| self.first_match(&t.text).map(|m| FieldResult::found(t.polygon, m)))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uctenka_core::{Quad, RecognizedToken};

    fn stream(texts: &[&str]) -> TokenStream {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let x = i as i32 * 50;
                RecognizedToken::new(Quad::from([(x, 0), (x + 40, 0), (x + 40, 12), (x, 12)]), *t, 0.8)
            })
            .collect()
    }

    fn locate(texts: &[&str]) -> FieldResult {
        DateLocator::new(&LocaleTables::default()).unwrap().locate(&stream(texts))
    }

    #[test]
    fn dotted_day_first() {
        assert_eq!(locate(&["Datum: 5.3.2024 14:02"]).value(), Some("5.3.2024"));
        assert_eq!(locate(&["12.11.24"]).value(), Some("12.11.24"));
    }

    #[test]
    fn dotted_with_spaces() {
        assert_eq!(locate(&["Vystaveno 1. 2. 2024"]).value(), Some("1. 2. 2024"));
    }

    #[test]
    fn dash_and_slash_day_first() {
        assert_eq!(locate(&["15-03-2024"]).value(), Some("15-03-2024"));
        assert_eq!(locate(&["15/3/24"]).value(), Some("15/3/24"));
    }

    #[test]
    fn iso_year_first() {
        assert_eq!(locate(&["2024-03-15 10:00"]).value(), Some("2024-03-15"));
        assert_eq!(locate(&["2024.3.5"]).value(), Some("2024.3.5"));
    }

    #[test]
    fn space_separated_triple() {
        assert_eq!(locate(&["15 03 2024"]).value(), Some("15 03 2024"));
    }

    #[test]
    fn first_matching_token_wins_and_reports_its_region() {
        let tokens = stream(&["BILLA", "Datum", "01.02.2024", "02.02.2024"]);
        let r = DateLocator::new(&LocaleTables::default()).unwrap().locate(&tokens);
        assert_eq!(r.value(), Some("01.02.2024"));
        assert_eq!(r.region, Some(tokens.tokens()[2].polygon));
    }

    #[test]
    fn no_calendar_validation() {
        assert_eq!(locate(&["45.13.2024"]).value(), Some("45.13.2024"));
    }

    #[test]
    fn prices_and_plain_numbers_are_not_dates() {
        let r = locate(&["Celkem", "1.234.567,89", "1 200 Kč", "149.90", "2024"]);
        assert_eq!(r, FieldResult::none());
    }

    #[test]
    fn split_date_is_not_merged() {
        assert_eq!(locate(&["15.03.", "2024"]), FieldResult::none());
    }

    #[test]
    fn empty_stream_yields_nothing() {
        assert_eq!(locate(&[]), FieldResult::none());
    }

    #[test]
    fn invalid_custom_pattern_fails_construction() {
        let tables = LocaleTables { date_patterns: vec![r"(\d".into()], ..LocaleTables::default() };
        assert!(DateLocator::new(&tables).is_err());
    }
}
