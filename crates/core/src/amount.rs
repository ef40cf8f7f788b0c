use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("no digits in amount text")]
    Empty,
    #[error("unparseable amount: '{0}'")]
    Invalid(String),
}

/// A non-negative decimal amount recovered from OCR text.
///
/// Normalization keeps only digits, commas and periods. A comma is read as
/// the decimal separator; when several periods remain, every period except
/// the last is a grouping separator and is dropped. Normalizing the
/// `Display` output of an amount yields the same amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedAmount(Decimal);

impl NormalizedAmount {
    pub fn normalize(text: &str) -> Result<Self, AmountError> {
        let kept: String = text
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .collect();
        if !kept.chars().any(|c| c.is_ascii_digit()) {
            return Err(AmountError::Empty);
        }

        let unified = kept.replace(',', ".");
        let collapsed = match unified.rfind('.') {
            Some(last) => {
                let (int_part, frac_part) = unified.split_at(last);
                format!("{}{}", int_part.replace('.', ""), frac_part)
            }
            None => unified,
        };

        // "12," and "12,-" leave a dangling separator; ",50" leaves a leading one.
        let trimmed = collapsed.trim_end_matches('.');
        let candidate = if trimmed.starts_with('.') {
            format!("0{trimmed}")
        } else {
            trimmed.to_string()
        };

        Decimal::from_str(&candidate)
            .map(NormalizedAmount)
            .map_err(|_| AmountError::Invalid(text.to_string()))
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        NormalizedAmount(decimal.abs())
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }
}

impl FromStr for NormalizedAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl fmt::Display for NormalizedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // At least two decimals; extra precision is never rounded away.
        if self.0.scale() < 2 {
            write!(f, "{:.2}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}
