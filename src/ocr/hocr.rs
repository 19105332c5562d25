use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::core::geometry::Rect;
use crate::ocr::{OcrError, OcrLine, OcrPage, OcrWord};

static LINE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".ocr_line, .ocr_header, .ocr_caption, .ocr_textfloat")
        .expect("line selector should parse")
});

static WORD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".ocrx_word").expect("word selector should parse"));

static BBOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"bbox (\d+) (\d+) (\d+) (\d+)").expect("bbox pattern should compile")
});

/// Parses Tesseract hOCR output into lines of boxed words.
pub fn parse_hocr(markup: &str) -> Result<OcrPage, OcrError> {
    let document = Html::parse_document(markup);
    let mut lines = Vec::new();

    for line in document.select(&LINE_SELECTOR) {
        let mut words = Vec::new();
        for word in line.select(&WORD_SELECTOR) {
            let text = word.text().collect::<String>();
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let title = word.value().attr("title").unwrap_or_default();
            let bbox = parse_bbox(title).ok_or_else(|| {
                OcrError::Markup(format!("word {text:?} has no bounding box"))
            })?;
            words.push(OcrWord {
                text: text.to_string(),
                bbox,
            });
        }
        if !words.is_empty() {
            lines.push(OcrLine::new(words));
        }
    }

    Ok(OcrPage::new(lines))
}

/// Reads `bbox x0 y0 x1 y1` from an hOCR `title` attribute.
pub fn parse_bbox(title: &str) -> Option<Rect> {
    let caps = BBOX.captures(title)?;
    let mut coords = [0i32; 4];
    for (i, slot) in coords.iter_mut().enumerate() {
        *slot = caps.get(i + 1)?.as_str().parse().ok()?;
    }
    Some(Rect::from_corners(coords[0], coords[1], coords[2], coords[3]))
}
