pub mod date;
pub mod deskew;
pub mod extract;
pub mod locale;
pub mod pipeline;
pub mod preprocess;
pub mod price;
pub mod recognizer;
pub mod types;
pub mod vendor;

pub use date::DateLocator;
pub use deskew::{deskew, deskew_or_keep, estimate_skew, DeskewConfig, DeskewError, DeskewOutcome};
pub use extract::{Extractor, FieldLocator};
pub use locale::{LocaleError, LocaleTables};
pub use pipeline::{PipelineConfig, PipelineError, ReceiptPipeline, ReceiptScan};
pub use preprocess::{decode_oriented, load_oriented, PreprocessError};
pub use price::PriceLocator;
pub use recognizer::{crop_and_recognize, MockRecognizer, OcrBackend, OcrError, TOKEN_SEPARATOR};
pub use types::{CellValue, ExtractedReceipt, ReceiptRow, SpreadsheetWriter};
pub use vendor::VendorLocator;
