use regex::Regex;
use tracing::debug;
use uctenka_core::{FieldKind, FieldResult, TokenStream};

use crate::extract::FieldLocator;
use crate::locale::{compile, phrase_alternation, LocaleError, LocaleTables};

/// Separator allowed between the letters of a fuzzed legal suffix.
const SUFFIX_GAP: &str = r"[\s.,_'\-]*";

/// Separator between the letters of a suffix of at most
/// [`SHORT_SUFFIX_LEN`] letters. "a.s." must not match the word "as", nor
/// "k.s." the unit "ks".
const SHORT_SUFFIX_GAP: &str = r"[\s.,_'\-]+";
const SHORT_SUFFIX_LEN: usize = 2;

/// Minimum non-punctuation characters a supplier-label token must carry,
/// beyond the label itself, to be taken as the vendor name on its own.
const LABEL_REMAINDER_MIN: usize = 2;

/// Four-tier vendor cascade. Each tier scans the whole stream before the
/// next one is tried:
///
/// 1. known brand names,
/// 2. OCR-tolerant legal-entity suffix ("s.r.o." read as "5R0"),
/// 3. "dodavatel" / "prodávající" labels,
/// 4. the token just before a registration / tax number.
pub struct VendorLocator {
    long_brands: Vec<(String, String)>,
    short_brands: Option<Regex>,
    short_brand_names: Vec<String>,
    legal_suffix: Option<Regex>,
    supplier_labels: Vec<String>,
    tax_marker: Option<Regex>,
}

impl VendorLocator {
    pub fn new(tables: &LocaleTables) -> Result<Self, LocaleError> {
        let (long, short): (Vec<&String>, Vec<&String>) = tables
            .brands
            .iter()
            .filter(|b| !b.trim().is_empty())
            .partition(|b| b.chars().count() > 3);

        let long_brands = long.into_iter().map(|b| (b.to_lowercase(), b.clone())).collect();
        let short_brand_names: Vec<String> = short.into_iter().cloned().collect();
        let short_brands = if short_brand_names.is_empty() {
            None
        } else {
            Some(compile(&format!(r"(?i)\b(?:{})\b", phrase_alternation(&short_brand_names)))?)
        };

        Ok(Self {
            long_brands,
            short_brands,
            short_brand_names,
            legal_suffix: legal_suffix_pattern(&tables.legal_suffixes, &tables.confusables)?,
            supplier_labels: tables.supplier_labels.iter().map(|l| l.to_lowercase()).collect(),
            tax_marker: tax_marker_pattern(&tables.tax_id_labels, &tables.vat_country_codes)?,
        })
    }

    fn by_brand(&self, tokens: &TokenStream) -> Option<FieldResult> {
        let long_hit = tokens.iter().find_map(|t| {
            let lowered = t.text.to_lowercase();
            self.long_brands
                .iter()
                .find(|(needle, _)| lowered.contains(needle.as_str()))
                .map(|(_, name)| FieldResult::found(t.polygon, name.as_str()))
        });
        if long_hit.is_some() {
            return long_hit;
        }

        let re = self.short_brands.as_ref()?;
        tokens.iter().find_map(|t| {
            let m = re.find(&t.text)?;
            let lowered = m.as_str().to_lowercase();
            let name = self
                .short_brand_names
                .iter()
                .find(|b| b.to_lowercase() == lowered)
                .map_or(m.as_str(), String::as_str);
            Some(FieldResult::found(t.polygon, name))
        })
    }

    fn by_legal_suffix(&self, tokens: &TokenStream) -> Option<FieldResult> {
        let re = self.legal_suffix.as_ref()?;
        for (i, token) in tokens.iter().enumerate() {
            let Some(suffix) = re.captures(&token.text).and_then(|c| c.get(1)) else {
                continue;
            };
            let name = token.text[..suffix.start()]
                .trim()
                .trim_end_matches([',', '-'])
                .trim_end();
            if !name.is_empty() {
                return Some(FieldResult::found(token.polygon, name));
            }
            // Suffix opens its token: the name was read as the previous fragment.
            if let Some(prev) = i.checked_sub(1).and_then(|p| tokens.get(p)) {
                return Some(FieldResult::found(prev.polygon, prev.text.as_str()));
            }
            debug!(index = i, "legal suffix in first token with nothing before it");
        }
        None
    }

    fn by_supplier_label(&self, tokens: &TokenStream) -> Option<FieldResult> {
        for (i, token) in tokens.iter().enumerate() {
            let lowered = token.text.to_lowercase();
            let Some(label) = self.supplier_labels.iter().find(|l| lowered.contains(l.as_str()))
            else {
                continue;
            };
            let remainder = lowered
                .replacen(label.as_str(), "", 1)
                .chars()
                .filter(|c| c.is_alphanumeric())
                .count();
            if remainder >= LABEL_REMAINDER_MIN {
                return Some(FieldResult::found(token.polygon, token.text.as_str()));
            }
            if let Some(next) = tokens.get(i + 1) {
                return Some(FieldResult::found(next.polygon, next.text.as_str()));
            }
        }
        None
    }

    fn by_tax_id(&self, tokens: &TokenStream) -> Option<FieldResult> {
        let re = self.tax_marker.as_ref()?;
        tokens.iter().enumerate().skip(1).find_map(|(i, t)| {
            if !re.is_match(&t.text) {
                return None;
            }
            let prev = tokens.get(i - 1)?;
            Some(FieldResult::found(prev.polygon, prev.text.as_str()))
        })
    }
}

impl FieldLocator for VendorLocator {
    fn kind(&self) -> FieldKind {
        FieldKind::Vendor
    }

    fn locate(&self, tokens: &TokenStream) -> FieldResult {
        let tiers: [(&str, fn(&Self, &TokenStream) -> Option<FieldResult>); 4] = [
            ("brand", Self::by_brand),
            ("legal_suffix", Self::by_legal_suffix),
            ("supplier_label", Self::by_supplier_label),
            ("tax_id", Self::by_tax_id),
        ];
        for (tier, find) in tiers {
            if let Some(result) = find(self, tokens) {
                debug!(tier, vendor = ?result.value, "vendor located");
                return result;
            }
        }
        FieldResult::none()
    }
}

/// Builds the OCR-tolerant suffix matcher: each letter becomes a class of
/// itself plus its confusable glyphs, with arbitrary punctuation or space
/// between letters. Group 1 is the suffix. It may not follow a letter
/// (a digit is fine: "TESC05R0") and must be followed by a
/// non-alphanumeric or the end of the text.
fn legal_suffix_pattern(
    suffixes: &[String],
    confusables: &std::collections::BTreeMap<String, String>,
) -> Result<Option<Regex>, LocaleError> {
    let mut fuzzed: Vec<(usize, String)> = suffixes
        .iter()
        .map(|s| s.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|letters| !letters.is_empty())
        .map(|letters| {
            let classes: Vec<String> = letters
                .chars()
                .map(|c| {
                    let mut buf = [0u8; 4];
                    let key: &str = c.encode_utf8(&mut buf);
                    match confusables.get(key) {
                        Some(alts) if !alts.is_empty() => {
                            let members: String =
                                std::iter::once(c).chain(alts.chars()).collect();
                            format!("[{}]", regex::escape(&members))
                        }
                        _ => regex::escape(key),
                    }
                })
                .collect();
            let len = letters.chars().count();
            let gap = if len <= SHORT_SUFFIX_LEN { SHORT_SUFFIX_GAP } else { SUFFIX_GAP };
            (len, classes.join(gap))
        })
        .collect();

    if fuzzed.is_empty() {
        return Ok(None);
    }
    fuzzed.sort_by_key(|(len, _)| std::cmp::Reverse(*len));
    let alternation = fuzzed.into_iter().map(|(_, p)| p).collect::<Vec<_>>().join("|");
    compile(&format!(r"(?i)(?:^|[^\p{{L}}])({alternation})(?:[^\p{{L}}\p{{N}}]|$)")).map(Some)
}

/// "IČ:", "DIČ:", "IČO:" style labels, or a VAT prefix followed by digits.
fn tax_marker_pattern(labels: &[String], country_codes: &[String]) -> Result<Option<Regex>, LocaleError> {
    let mut branches = Vec::new();
    let labels = phrase_alternation(labels);
    if !labels.is_empty() {
        branches.push(format!(r"(?:^|[^\p{{L}}])(?:{labels})\s*:"));
    }
    let codes = phrase_alternation(country_codes);
    if !codes.is_empty() {
        branches.push(format!(r"\b(?:{codes})\s?\d{{6,10}}\b"));
    }
    if branches.is_empty() {
        return Ok(None);
    }
    compile(&format!("(?i){}", branches.join("|"))).map(Some)
}
