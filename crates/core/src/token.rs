use serde::{Deserialize, Serialize};

use crate::geometry::Quad;

/// One text fragment returned by a recognition engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedToken {
    pub polygon: Quad,
    pub text: String,
    /// Engine confidence (0.0–1.0).
    pub confidence: f32,
}

impl RecognizedToken {
    pub fn new(polygon: Quad, text: impl Into<String>, confidence: f32) -> Self {
        Self { polygon, text: text.into(), confidence: confidence.clamp(0.0, 1.0) }
    }
}

/// Tokens for one image, in the engine's detection order.
///
/// That order is not reading order, but it is stable for a given input, and
/// every "next token" / "previous token" heuristic relies on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenStream(Vec<RecognizedToken>);

impl TokenStream {
    pub fn new(tokens: Vec<RecognizedToken>) -> Self {
        Self(tokens)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn tokens(&self) -> &[RecognizedToken] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&RecognizedToken> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecognizedToken> {
        self.0.iter()
    }

    /// Texts of every token joined by `separator`, in stream order.
    pub fn joined_text(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl From<Vec<RecognizedToken>> for TokenStream {
    fn from(tokens: Vec<RecognizedToken>) -> Self {
        Self(tokens)
    }
}

impl FromIterator<RecognizedToken> for TokenStream {
    fn from_iter<I: IntoIterator<Item = RecognizedToken>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a RecognizedToken;
    type IntoIter = std::slice::Iter<'a, RecognizedToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
