use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uctenka_core::{FieldKind, FieldResult, NormalizedAmount, Quad, TokenStream};

use crate::deskew::{deskew_or_keep, DeskewConfig};
use crate::extract::Extractor;
use crate::locale::{LocaleError, LocaleTables};
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{crop_and_recognize, OcrBackend};
use crate::types::ExtractedReceipt;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image could not be decoded: {0}")]
    Decode(#[source] PreprocessError),
    #[error("Locale tables rejected: {0}")]
    Locale(#[from] LocaleError),
    #[error("Failed to parse pipeline config TOML: {0}")]
    Config(#[from] toml::de::Error),
}

impl From<PreprocessError> for PipelineError {
    fn from(e: PreprocessError) -> Self {
        match e {
            PreprocessError::Io(io) => PipelineError::Io(io),
            other => PipelineError::Decode(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Straighten the page before recognition.
    pub deskew: bool,
    pub deskew_config: DeskewConfig,
    pub locale: LocaleTables,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { deskew: true, deskew_config: DeskewConfig::default(), locale: LocaleTables::default() }
    }
}

impl PipelineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, PipelineError> {
        Ok(toml::from_str(toml_content)?)
    }
}

/// Everything one processing run learned about a receipt image.
#[derive(Debug, Clone)]
pub struct ReceiptScan {
    /// The image recognition ran on (upright, possibly deskewed). Corrected
    /// regions refer to its coordinates.
    pub image: DynamicImage,
    pub deskewed: bool,
    pub tokens: TokenStream,
    pub extracted: ExtractedReceipt,
    /// Absorbed failures, for display only.
    pub notices: Vec<String>,
}

/// Orchestrates: decode → orient → deskew → recognize → extract.
///
/// The recognizer is shared, not owned: one engine instance serves every
/// pipeline built from the same handle.
pub struct ReceiptPipeline<R: OcrBackend> {
    recognizer: Arc<R>,
    extractor: Extractor,
    config: PipelineConfig,
}

impl<R: OcrBackend> ReceiptPipeline<R> {
    pub fn new(recognizer: Arc<R>, config: PipelineConfig) -> Result<Self, LocaleError> {
        let extractor = Extractor::new(&config.locale)?;
        Ok(Self { recognizer, extractor, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a file on disk.
    pub fn process_file(&self, path: &Path) -> Result<ReceiptScan, PipelineError> {
        let image = preprocess::load_oriented(path)?;
        info!(path = %path.display(), "processing receipt");
        Ok(self.process_image(image))
    }

    /// Process raw bytes (from camera capture or file read).
    pub fn process_bytes(&self, data: &[u8]) -> Result<ReceiptScan, PipelineError> {
        let image = preprocess::decode_oriented(data)?;
        Ok(self.process_image(image))
    }

    /// Process an already decoded, upright image. Never fails: deskew and
    /// recognition failures are absorbed and listed in `notices`.
    pub fn process_image(&self, image: DynamicImage) -> ReceiptScan {
        let mut notices = Vec::new();

        let (image, deskewed) = if self.config.deskew {
            let (outcome, err) = deskew_or_keep(image, &self.config.deskew_config);
            if let Some(e) = err {
                notices.push(e.to_string());
            }
            (outcome.image, outcome.changed)
        } else {
            (image, false)
        };

        let tokens = match self.recognizer.recognize(&image) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("recognition failed, continuing with no text: {e}");
                notices.push(format!("Text recognition failed: {e}"));
                TokenStream::empty()
            }
        };

        let extracted = self.extractor.extract(&tokens);
        info!(
            tokens = tokens.len(),
            deskewed,
            price = extracted.price.is_found(),
            date = extracted.date.is_found(),
            vendor = extracted.vendor.is_found(),
            "receipt extracted"
        );

        ReceiptScan { image, deskewed, tokens, extracted, notices }
    }

    /// Process every path in order. A failing file is reported in its own
    /// slot and never stops the rest.
    pub fn process_files(
        &self,
        paths: &[PathBuf],
    ) -> Vec<(PathBuf, Result<ReceiptScan, PipelineError>)> {
        paths
            .iter()
            .map(|path| {
                let result = self.process_file(path);
                if let Err(e) = &result {
                    warn!(path = %path.display(), "skipping receipt: {e}");
                }
                (path.clone(), result)
            })
            .collect()
    }

    /// Recognizes the text inside a hand-corrected region. Engine failure
    /// reads as no text.
    pub fn reextract(&self, image: &DynamicImage, region: &Quad) -> String {
        crop_and_recognize(self.recognizer.as_ref(), image, region).unwrap_or_else(|e| {
            warn!(?region, "re-extraction failed: {e}");
            String::new()
        })
    }

    /// Replaces one field of `scan` with the text read from `region`.
    /// A price that does not normalize keeps its region but loses its value.
    pub fn correct_field(&self, scan: &mut ReceiptScan, kind: FieldKind, region: Quad) {
        let text = self.reextract(&scan.image, &region);
        let value = match kind {
            FieldKind::Price => NormalizedAmount::normalize(&text).ok().map(|a| a.to_string()),
            FieldKind::Date | FieldKind::Vendor => {
                Some(text.trim().to_string()).filter(|t| !t.is_empty())
            }
        };
        *scan.extracted.get_mut(kind) = match value {
            Some(v) => FieldResult::found(region, v),
            None => FieldResult::region_only(region),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::MockRecognizer;
    use image::{GrayImage, ImageBuffer, Luma};

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(40, 40, |_, _| Luma([200u8]));
        preprocess::encode_png(&DynamicImage::ImageLuma8(img)).unwrap()
    }

    fn pipeline(recognizer: MockRecognizer) -> ReceiptPipeline<MockRecognizer> {
        ReceiptPipeline::new(Arc::new(recognizer), PipelineConfig::default()).unwrap()
    }

    fn billa() -> MockRecognizer {
        MockRecognizer::from_texts(&["BILLA, spol. s r.o.", "Datum 14.02.2025", "CELKEM", "87,60 Kč"])
    }

    fn square(x0: i32, y0: i32, x1: i32, y1: i32) -> Quad {
        Quad::from([(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    #[test]
    fn process_bytes_extracts_all_fields() {
        let scan = pipeline(billa()).process_bytes(&tiny_png()).unwrap();
        assert_eq!(scan.extracted.price.value(), Some("87.60"));
        assert_eq!(scan.extracted.date.value(), Some("14.02.2025"));
        assert_eq!(scan.extracted.vendor.value(), Some("billa"));
        assert_eq!(scan.tokens.len(), 4);
        assert!(!scan.deskewed);
        assert!(scan.notices.is_empty());
    }

    #[test]
    fn process_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uctenka.png");
        std::fs::write(&path, tiny_png()).unwrap();
        let scan = pipeline(billa()).process_file(&path).unwrap();
        assert_eq!(scan.image.width(), 40);
        assert!(scan.extracted.price.is_found());
    }

    #[test]
    fn missing_file_is_input_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = pipeline(billa()).process_file(&dir.path().join("nope.jpg")).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn undecodable_bytes_fail_fast() {
        let recognizer = Arc::new(billa());
        let p = ReceiptPipeline::new(recognizer.clone(), PipelineConfig::default()).unwrap();
        assert!(matches!(p.process_bytes(b"not an image"), Err(PipelineError::Decode(_))));
        assert_eq!(recognizer.calls(), 0);
    }

    #[test]
    fn recognition_failure_reads_as_empty_stream() {
        let scan = pipeline(MockRecognizer::failing("engine crashed")).process_bytes(&tiny_png()).unwrap();
        assert!(scan.tokens.is_empty());
        assert_eq!(scan.extracted, ExtractedReceipt::default());
        assert_eq!(scan.notices.len(), 1);
        assert!(scan.notices[0].contains("engine crashed"));
    }

    #[test]
    fn deskew_can_be_disabled() {
        let config = PipelineConfig { deskew: false, ..PipelineConfig::default() };
        let p = ReceiptPipeline::new(Arc::new(billa()), config).unwrap();
        let scan = p.process_bytes(&tiny_png()).unwrap();
        assert!(!scan.deskewed);
        assert_eq!(scan.image.as_bytes(), &[200u8; 1600][..]);
    }

    #[test]
    fn batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.png");
        let bad = dir.path().join("b.png");
        std::fs::write(&good, tiny_png()).unwrap();
        std::fs::write(&bad, b"garbage").unwrap();
        let missing = dir.path().join("c.png");

        let results = pipeline(billa()).process_files(&[bad.clone(), missing, good.clone()]);
        assert_eq!(results.len(), 3);
        assert!(matches!(results[0].1, Err(PipelineError::Decode(_))));
        assert!(matches!(results[1].1, Err(PipelineError::Io(_))));
        assert_eq!(results[2].0, good);
        assert!(results[2].1.is_ok());
    }

    #[test]
    fn reextract_reads_region_text() {
        let p = pipeline(MockRecognizer::from_texts(&["1", "299,-"]));
        let scan = p.process_bytes(&tiny_png()).unwrap();
        assert_eq!(p.reextract(&scan.image, &square(0, 0, 30, 30)), "1 299,-");
    }

    #[test]
    fn reextract_degenerate_region_is_empty() {
        let recognizer = Arc::new(billa());
        let p = ReceiptPipeline::new(recognizer.clone(), PipelineConfig::default()).unwrap();
        let scan = p.process_bytes(&tiny_png()).unwrap();
        let before = recognizer.calls();
        assert_eq!(p.reextract(&scan.image, &square(38, 0, 60, 30)), "");
        assert_eq!(recognizer.calls(), before);
    }

    #[test]
    fn reextract_swallows_engine_failure() {
        let p = pipeline(MockRecognizer::failing("gone"));
        let image = preprocess::decode_oriented(&tiny_png()).unwrap();
        assert_eq!(p.reextract(&image, &square(0, 0, 30, 30)), "");
    }

    #[test]
    fn correct_field_normalizes_price() {
        let p = pipeline(MockRecognizer::from_texts(&["1 299,-"]));
        let mut scan = p.process_bytes(&tiny_png()).unwrap();
        let region = square(5, 5, 35, 35);
        p.correct_field(&mut scan, FieldKind::Price, region);
        assert_eq!(scan.extracted.price, FieldResult::found(region, "1299.00"));
    }

    #[test]
    fn correct_field_unparseable_price_keeps_region() {
        let p = pipeline(MockRecognizer::from_texts(&["zdarma"]));
        let mut scan = p.process_bytes(&tiny_png()).unwrap();
        let region = square(5, 5, 35, 35);
        p.correct_field(&mut scan, FieldKind::Price, region);
        assert_eq!(scan.extracted.price, FieldResult::region_only(region));

        p.correct_field(&mut scan, FieldKind::Vendor, region);
        assert_eq!(scan.extracted.vendor.value(), Some("zdarma"));
    }

    #[test]
    fn config_from_toml() {
        let cfg = PipelineConfig::from_toml(
            r#"
            deskew = false

            [deskew_config]
            vote_threshold = 80

            [locale]
            brands = ["spar"]
            "#,
        )
        .unwrap();
        assert!(!cfg.deskew);
        assert_eq!(cfg.deskew_config.vote_threshold, 80);
        assert_eq!(cfg.deskew_config.max_gap, 10);
        assert_eq!(cfg.locale.brands, vec!["spar"]);
        assert_eq!(cfg.locale.total_anchors, LocaleTables::default().total_anchors);
    }

    #[test]
    fn malformed_deskew_table_is_a_config_error() {
        let err = PipelineConfig::from_toml("[deskew_config]\nvote_threshold = \"many\"").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(!err.to_string().contains("locale"));
    }

    #[test]
    fn invalid_locale_pattern_rejected_at_construction() {
        let mut config = PipelineConfig::default();
        config.locale.date_patterns = vec!["[".into()];
        assert!(ReceiptPipeline::new(Arc::new(billa()), config).is_err());
    }
}
