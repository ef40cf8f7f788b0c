use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::debug;
use uctenka_core::{clamp_to_image, Point, Quad, RecognizedToken, TokenStream};

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available, build with the `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR backend.
///
/// Implementations take a decoded image and must not modify it. An image with
/// no text is `Ok` with an empty stream; `Err` is reserved for engine failure.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<TokenStream, OcrError>;
}

/// Separator placed between token texts by [`crop_and_recognize`].
pub const TOKEN_SEPARATOR: &str = " ";

/// Recognizes only the part of `image` inside `region` and returns the
/// token texts joined in stream order.
///
/// The region is clamped to the image first. A degenerate region yields an
/// empty string without calling the engine.
pub fn crop_and_recognize<R: OcrBackend + ?Sized>(
    backend: &R,
    image: &DynamicImage,
    region: &Quad,
) -> Result<String, OcrError> {
    let Some(rect) = clamp_to_image(region, image.width(), image.height()) else {
        debug!(?region, "crop region degenerate after clamping");
        return Ok(String::new());
    };
    let crop = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    let tokens = backend.recognize(&crop)?;
    Ok(tokens.joined_text(TOKEN_SEPARATOR))
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set token stream, or a pre-set failure, and counts calls.
/// Useful for exercising extraction without Tesseract installed.
pub struct MockRecognizer {
    tokens: TokenStream,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    pub fn new(tokens: impl Into<TokenStream>) -> Self {
        Self { tokens: tokens.into(), failure: None, calls: AtomicUsize::new(0) }
    }

    /// One token per text, stacked top to bottom in a single column.
    pub fn from_texts(texts: &[&str]) -> Self {
        let tokens: TokenStream = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let y = i as i32 * 30;
                RecognizedToken::new(
                    Quad::from([(10, y), (310, y), (310, y + 24), (10, y + 24)]),
                    *text,
                    0.9,
                )
            })
            .collect();
        Self::new(tokens)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self { tokens: TokenStream::empty(), failure: Some(message.into()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image: &DynamicImage) -> Result<TokenStream, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(OcrError::Engine(message.clone())),
            None => Ok(self.tokens.clone()),
        }
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

/// Word level in Tesseract's TSV output.
const TSV_WORD_LEVEL: &str = "5";

/// Converts Tesseract TSV output into tokens, one per recognized word, with
/// axis-aligned polygons and confidence scaled to 0..1.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
fn tokens_from_tsv(tsv: &str) -> TokenStream {
    tsv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 || cols[0] != TSV_WORD_LEVEL {
                return None;
            }
            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }
            let left: i32 = cols[6].parse().ok()?;
            let top: i32 = cols[7].parse().ok()?;
            let width: i32 = cols[8].parse().ok()?;
            let height: i32 = cols[9].parse().ok()?;
            let conf: f32 = cols[10].parse().ok()?;
            let polygon = Quad([
                Point::new(left, top),
                Point::new(left + width, top),
                Point::new(left + width, top + height),
                Point::new(left, top + height),
            ]);
            Some(RecognizedToken::new(polygon, text, conf / 100.0))
        })
        .collect()
}

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{tokens_from_tsv, OcrBackend, OcrError};
    use image::DynamicImage;
    use leptess::LepTess;
    use std::sync::Mutex;
    use uctenka_core::TokenStream;

    /// One loaded Tesseract engine. Traineddata is read once in `new`;
    /// calls are serialized on the engine lock.
    pub struct TesseractRecognizer {
        engine: Mutex<LepTess>,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<&str>, lang: &str) -> Result<Self, OcrError> {
            let engine = LepTess::new(data_path, lang).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(Self { engine: Mutex::new(engine) })
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image: &DynamicImage) -> Result<TokenStream, OcrError> {
            let png = crate::preprocess::encode_png(image)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let mut lt = self
                .engine
                .lock()
                .map_err(|_| OcrError::Engine("tesseract engine lock poisoned".into()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            let tsv = lt.get_tsv_text(0).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(tokens_from_tsv(&tsv))
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    }

    fn square(x0: i32, y0: i32, x1: i32, y1: i32) -> Quad {
        Quad::from([(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    /// Reports the size of the image it was handed as its only token.
    struct SizeEcho;

    impl OcrBackend for SizeEcho {
        fn recognize(&self, image: &DynamicImage) -> Result<TokenStream, OcrError> {
            let text = format!("{}x{}", image.width(), image.height());
            Ok(TokenStream::new(vec![RecognizedToken::new(square(0, 0, 1, 1), text, 1.0)]))
        }
    }

    #[test]
    fn mock_returns_preset_tokens() {
        let r = MockRecognizer::from_texts(&["BILLA", "Celkem", "87,60"]);
        let tokens = r.recognize(&blank(4, 4)).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens.tokens()[1].text, "Celkem");
        assert_eq!(r.calls(), 1);
    }

    #[test]
    fn mock_failure_is_distinct_from_no_tokens() {
        let empty = MockRecognizer::new(TokenStream::empty());
        assert!(empty.recognize(&blank(4, 4)).unwrap().is_empty());
        let failing = MockRecognizer::failing("model not loaded");
        assert!(matches!(failing.recognize(&blank(4, 4)), Err(OcrError::Engine(_))));
    }

    #[test]
    fn crop_joins_tokens_with_single_space() {
        let r = MockRecognizer::from_texts(&["Pekárna", "Novák", "s.r.o."]);
        let text = crop_and_recognize(&r, &blank(100, 100), &square(10, 10, 60, 40)).unwrap();
        assert_eq!(text, "Pekárna Novák s.r.o.");
    }

    #[test]
    fn crop_is_clamped_to_image() {
        let text = crop_and_recognize(&SizeEcho, &blank(100, 80), &square(-20, 50, 140, 200)).unwrap();
        assert_eq!(text, "100x30");
    }

    #[test]
    fn degenerate_crop_skips_engine() {
        let r = MockRecognizer::from_texts(&["never"]);
        let image = blank(100, 100);
        assert_eq!(crop_and_recognize(&r, &image, &square(10, 10, 14, 60)).unwrap(), "");
        assert_eq!(crop_and_recognize(&r, &image, &square(98, 10, 130, 60)).unwrap(), "");
        assert_eq!(r.calls(), 0);
    }

    #[test]
    fn crop_propagates_engine_failure() {
        let r = MockRecognizer::failing("boom");
        assert!(crop_and_recognize(&r, &blank(50, 50), &square(0, 0, 50, 50)).is_err());
    }

    #[test]
    fn crop_with_no_tokens_is_empty() {
        let r = MockRecognizer::new(TokenStream::empty());
        assert_eq!(crop_and_recognize(&r, &blank(50, 50), &square(0, 0, 50, 50)).unwrap(), "");
    }

    #[test]
    fn tsv_words_become_tokens() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t\n\
                   4\t1\t1\t1\t1\t0\t12\t20\t200\t30\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t12\t20\t80\t30\t91.5\tCELKEM\n\
                   5\t1\t1\t1\t1\t2\t120\t22\t60\t28\t87\t87,60\n\
                   5\t1\t1\t1\t1\t3\t190\t22\t10\t28\t95\t \n";
        let tokens = tokens_from_tsv(tsv);
        assert_eq!(tokens.len(), 2);
        let first = &tokens.tokens()[0];
        assert_eq!(first.text, "CELKEM");
        assert_eq!(first.polygon, square(12, 20, 92, 50));
        assert!((first.confidence - 0.915).abs() < 1e-6);
        assert_eq!(tokens.tokens()[1].text, "87,60");
    }

    #[test]
    fn tsv_garbage_is_ignored() {
        assert!(tokens_from_tsv("").is_empty());
        assert!(tokens_from_tsv("5\t1\t1\t1\t1\t1\tx\t0\t1\t1\t90\tword").is_empty());
    }
}
