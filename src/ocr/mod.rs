pub mod bridge;
pub mod hocr;
pub mod reference;

pub use bridge::TesseractEngine;

use image::GrayImage;
use thiserror::Error;

use crate::core::geometry::Rect;
use crate::core::settings::RecognitionSettings;

/// Errors from OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Malformed engine output: {0}")]
    Markup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Recognizes text with per-word boxes. Boxes are relative to `region`
/// when one is given.
pub trait OcrEngine: Send + Sync {
    fn recognize(
        &self,
        image: &GrayImage,
        region: Option<Rect>,
        settings: &RecognitionSettings,
    ) -> Result<OcrPage, OcrError>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub bbox: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub words: Vec<OcrWord>,
}

impl OcrLine {
    pub fn new(words: Vec<OcrWord>) -> Self {
        Self { words }
    }

    pub fn text(&self) -> String {
        let words: Vec<&str> = self.words.iter().map(|w| w.text.as_str()).collect();
        words.join(" ")
    }
}

/// Recognized text of one image or region, in reading order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OcrPage {
    pub lines: Vec<OcrLine>,
}

impl OcrPage {
    pub fn new(lines: Vec<OcrLine>) -> Self {
        Self { lines }
    }

    /// Builds a page from plain text, one line per input line. Word boxes are empty.
    pub fn from_text(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| {
                OcrLine::new(
                    line.split_whitespace()
                        .map(|word| OcrWord {
                            text: word.to_string(),
                            bbox: Rect::default(),
                        })
                        .collect(),
                )
            })
            .filter(|line| !line.words.is_empty())
            .collect();
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line-structured text, one recognized line per output line.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text());
            out.push('\n');
        }
        out
    }

    /// All words joined by single spaces.
    pub fn flat_text(&self) -> String {
        let words: Vec<&str> = self
            .lines
            .iter()
            .flat_map(|line| line.words.iter().map(|w| w.text.as_str()))
            .collect();
        words.join(" ")
    }
}
