use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocaleError {
    #[error("Failed to parse locale TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Language-specific data the locators match against.
///
/// Everything here is data: swapping the tables retargets extraction to
/// another market without touching the matching code. Keys missing from a
/// TOML override keep their built-in (Czech) values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleTables {
    /// Phrases that label the amount to pay. Matched case-insensitively,
    /// anywhere inside a token.
    pub total_anchors: Vec<String>,
    /// Date regexes, highest priority first.
    pub date_patterns: Vec<String>,
    /// Known store chains. Names longer than three characters match as
    /// substrings, shorter ones only as whole words.
    pub brands: Vec<String>,
    /// Company-form markers that trail a registered vendor name.
    pub legal_suffixes: Vec<String>,
    /// Glyphs OCR tends to confuse with a letter, keyed by that letter.
    pub confusables: BTreeMap<String, String>,
    /// Labels that introduce the selling party.
    pub supplier_labels: Vec<String>,
    /// Registration / tax-number labels (matched when followed by a colon).
    pub tax_id_labels: Vec<String>,
    /// VAT number prefixes (matched when followed by digits).
    pub vat_country_codes: Vec<String>,
}

impl Default for LocaleTables {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            total_anchors: strings(&[
                "celkem k úhradě",
                "celkem k uhrade",
                "celkem k platbě",
                "celkem k platbe",
                "k úhradě",
                "k uhrade",
                "k platbě",
                "k platbe",
                "celkem",
                "celkcm",
                "platbě",
                "platbe",
                "amount due",
                "total due",
                "grand total",
                "total",
                "tota1",
            ]),
            date_patterns: strings(&[
                r"\b\d{1,2}\.\s?\d{1,2}\.\s?\d{2,4}\b",
                r"\b\d{1,2}[-/]\d{1,2}[-/]\d{2,4}\b",
                r"\b\d{4}[-./]\d{1,2}[-./]\d{1,2}\b",
                r"\b\d{1,2}\s\d{1,2}\s\d{4}\b",
            ]),
            brands: strings(&[
                "albert",
                "billa",
                "lidl",
                "kaufland",
                "tesco",
                "penny",
                "globus",
                "makro",
                "žabka",
                "rossmann",
                "teta",
                "dr.max",
                "benu",
                "hornbach",
                "bauhaus",
                "ikea",
                "datart",
                "alza",
                "pepco",
                "benzina",
                "shell",
                "orlen",
                "coop",
                "tamda",
                "dm",
                "obi",
                "omv",
                "mol",
                "cba",
            ]),
            legal_suffixes: strings(&["s.r.o.", "a.s.", "spol.", "k.s.", "gmbh"]),
            confusables: [("o", "0"), ("i", "1l|"), ("l", "1i|"), ("s", "5"), ("z", "2"), ("b", "8")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            supplier_labels: strings(&["dodavatel", "prodávající", "prodavajici"]),
            tax_id_labels: strings(&["ičo", "ič", "dič", "ico", "ic", "dic"]),
            vat_country_codes: strings(&["cz"]),
        }
    }
}

impl LocaleTables {
    pub fn from_toml(toml_content: &str) -> Result<Self, LocaleError> {
        Ok(toml::from_str(toml_content)?)
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Regex, LocaleError> {
    Regex::new(pattern).map_err(|source| LocaleError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Case-insensitive alternation of literal phrases, longest first so that
/// "celkem k úhradě" wins over "celkem" at the same position. Inner spaces
/// match any run of whitespace.
pub(crate) fn phrase_alternation(phrases: &[String]) -> String {
    let mut sorted: Vec<&String> = phrases.iter().filter(|p| !p.trim().is_empty()).collect();
    sorted.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
    sorted
        .iter()
        .map(|p| {
            p.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|")
}
