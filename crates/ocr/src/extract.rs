use uctenka_core::{FieldKind, FieldResult, TokenStream};

use crate::date::DateLocator;
use crate::locale::{LocaleError, LocaleTables};
use crate::price::PriceLocator;
use crate::types::ExtractedReceipt;
use crate::vendor::VendorLocator;

/// A strategy that finds one field in a token stream.
pub trait FieldLocator: Send + Sync {
    fn kind(&self) -> FieldKind;
    fn locate(&self, tokens: &TokenStream) -> FieldResult;
}

/// The three locators compiled from one set of locale tables.
pub struct Extractor {
    price: PriceLocator,
    date: DateLocator,
    vendor: VendorLocator,
}

impl Extractor {
    pub fn new(tables: &LocaleTables) -> Result<Self, LocaleError> {
        Ok(Self {
            price: PriceLocator::new(tables)?,
            date: DateLocator::new(tables)?,
            vendor: VendorLocator::new(tables)?,
        })
    }

    /// Runs every locator over the same stream. Fields are independent: a
    /// miss on one never affects the others.
    pub fn extract(&self, tokens: &TokenStream) -> ExtractedReceipt {
        ExtractedReceipt {
            price: self.price.locate(tokens),
            date: self.date.locate(tokens),
            vendor: self.vendor.locate(tokens),
        }
    }

    pub fn locator(&self, kind: FieldKind) -> &dyn FieldLocator {
        match kind {
            FieldKind::Price => &self.price,
            FieldKind::Date => &self.date,
            FieldKind::Vendor => &self.vendor,
        }
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(&LocaleTables::default()).expect("built-in locale tables compile")
    }
}
