use regex::Regex;
use tracing::debug;
use uctenka_core::{FieldKind, FieldResult, NormalizedAmount, TokenStream};

use crate::extract::FieldLocator;
use crate::locale::{compile, phrase_alternation, LocaleError, LocaleTables};

/// Finds the amount to pay by anchoring on a "total" label.
///
/// The first anchor (in stream order) that yields a normalizable amount wins.
/// Subtotal and grand-total labels are not told apart.
pub struct PriceLocator {
    /// `None` when the anchor table is empty.
    anchors: Option<Anchors>,
}

struct Anchors {
    bare: Regex,
    with_amount: Regex,
}

impl PriceLocator {
    pub fn new(tables: &LocaleTables) -> Result<Self, LocaleError> {
        let alternation = phrase_alternation(&tables.total_anchors);
        if alternation.is_empty() {
            return Ok(Self { anchors: None });
        }

        let bare = compile(&format!("(?i)(?:{alternation})"))?;
        // Label and value merged into one fragment: "Celkem: 149,90 Kč".
        let with_amount = compile(&format!(
            r"(?i)(?:{alternation})[^\p{{L}}\d]*(?:(?:kč|kc|czk|eur)[^\p{{L}}\d]*)?(\d[\d .,]*\d|\d)"
        ))?;
        Ok(Self { anchors: Some(Anchors { bare, with_amount }) })
    }
}

impl FieldLocator for PriceLocator {
    fn kind(&self) -> FieldKind {
        FieldKind::Price
    }

    fn locate(&self, tokens: &TokenStream) -> FieldResult {
        let Some(anchors) = &self.anchors else {
            return FieldResult::none();
        };
        for (i, token) in tokens.iter().enumerate() {
            if let Some(caps) = anchors.with_amount.captures(&token.text) {
                match NormalizedAmount::normalize(&caps[1]) {
                    Ok(amount) => return FieldResult::found(token.polygon, amount.to_string()),
                    Err(e) => debug!(index = i, text = %token.text, "inline total not numeric: {e}"),
                }
                continue;
            }

            if !anchors.bare.is_match(&token.text) {
                continue;
            }
            let Some(next) = tokens.get(i + 1) else {
                debug!(index = i, "total anchor is the last token");
                continue;
            };
            if !next.text.chars().any(|c| c.is_ascii_digit()) {
                continue;
            }
            match NormalizedAmount::normalize(&next.text) {
                Ok(amount) => return FieldResult::found(next.polygon, amount.to_string()),
                Err(e) => debug!(index = i + 1, text = %next.text, "total value not numeric: {e}"),
            }
        }
        FieldResult::none()
    }
}
