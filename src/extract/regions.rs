use std::fmt::Write as _;
use std::sync::LazyLock;

use image::GrayImage;
use regex::Regex;
use tracing::debug;

use super::{ExtractContext, FieldExtractor, PassOutput};
use crate::core::model::{DocumentType, Rotation};
use crate::core::record::DocumentBuilder;
use crate::core::settings::RecognitionSettings;
use crate::layout::card::{estimate_location, locate_title, AreaKind, CardLayout, CardSide};
use crate::ocr::{OcrError, OcrPage};
use crate::pages::imaging;

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d\d).*?(\d\d).*?(\d{4})").expect("date pattern should compile"));

/// Rewrites the first `DD?MM?YYYY`-like run in `raw` as `DD/MM/YYYY`.
/// Returns an empty string when there is none.
pub fn normalize_date(raw: &str) -> String {
    DATE.captures(raw)
        .map(|c| format!("{}/{}/{}", &c[1], &c[2], &c[3]))
        .unwrap_or_default()
}

/// A card side found on some page, with the deskewed card image its
/// layout refers to.
struct LocatedCard {
    layout: CardLayout,
    image: GrayImage,
}

/// Region-based extraction for work-permit cards.
///
/// Card sides are searched for until at least one is found; later passes
/// only re-read the located sub-areas with their own settings.
pub struct CardExtractor {
    ctx: ExtractContext,
    located: Vec<LocatedCard>,
}

impl CardExtractor {
    pub fn new(ctx: ExtractContext) -> Self {
        Self {
            ctx,
            located: Vec::new(),
        }
    }

    pub fn located_sides(&self) -> Vec<CardSide> {
        self.located.iter().map(|card| card.layout.side).collect()
    }

    fn is_located(&self, side: CardSide) -> bool {
        self.located.iter().any(|card| card.layout.side == side)
    }

    fn search(&mut self, pages: &[GrayImage], settings: &RecognitionSettings) -> Result<(), OcrError> {
        for (index, page) in pages.iter().enumerate() {
            for rotation in Rotation::ALL {
                if CardSide::ALL.iter().all(|side| self.is_located(*side)) {
                    break;
                }
                let rotated = imaging::rotate_quarter(page, rotation);
                let recognized = self.ctx.engine.recognize(&rotated, None, settings)?;

                for side in CardSide::ALL {
                    if self.is_located(side) {
                        continue;
                    }
                    if let Some(card) = self.locate(side, &rotated, &recognized, settings)? {
                        debug!(
                            side = side.name(),
                            page = index + 1,
                            %rotation,
                            main = ?card.layout.main,
                            "card located"
                        );
                        self.located.push(card);
                    }
                }
            }
            if !self.located.is_empty() {
                break;
            }
        }
        Ok(())
    }

    /// Coarse estimate from the page, then a precise layout from the
    /// deskewed crop. Either title search failing leaves the side unlocated.
    fn locate(
        &self,
        side: CardSide,
        page: &GrayImage,
        recognized: &OcrPage,
        settings: &RecognitionSettings,
    ) -> Result<Option<LocatedCard>, OcrError> {
        let Some(title) = locate_title(side, recognized) else {
            return Ok(None);
        };
        let coarse = estimate_location(side, title, page.width(), page.height());
        let Some(cropped) = imaging::crop(page, coarse) else {
            return Ok(None);
        };

        let card = imaging::deskew(&cropped);
        let refined = self.ctx.engine.recognize(&card, None, settings)?;
        let Some(fine_title) = locate_title(side, &refined) else {
            debug!(side = side.name(), "title lost after deskew");
            return Ok(None);
        };

        Ok(Some(LocatedCard {
            layout: CardLayout::new(side, fine_title, card.width(), card.height()),
            image: card,
        }))
    }
}

impl FieldExtractor for CardExtractor {
    fn document_type(&self) -> DocumentType {
        DocumentType::WorkPermitCard
    }

    fn extract_pass(
        &mut self,
        pages: &[GrayImage],
        settings: &RecognitionSettings,
    ) -> Result<PassOutput, OcrError> {
        if self.located.is_empty() {
            self.search(pages, settings)?;
        }

        let mut builder = DocumentBuilder::new(DocumentType::WorkPermitCard);
        let mut trace = String::new();
        if self.located.is_empty() {
            trace.push_str("no card located\n");
        }

        for card in &self.located {
            let _ = writeln!(trace, "[{}] {:?}", card.layout.side.name(), card.layout.main);
            for (area, rect) in &card.layout.areas {
                if rect.is_empty() {
                    continue;
                }
                let recognized = self.ctx.engine.recognize(&card.image, Some(*rect), settings)?;
                let text = recognized.text();
                let raw = text.trim();
                let value = match area.kind {
                    AreaKind::Text => raw.to_string(),
                    AreaKind::Date => normalize_date(raw),
                };
                let _ = writeln!(trace, "{}: {{ {} }} -> '{}'", area.field, raw, value);
                builder.set(area.field, &value);
            }
        }

        Ok(PassOutput {
            data: builder.build(),
            debug: trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Rect;
    use crate::core::model::Field;
    use crate::core::settings::{EngineMode, PageSegMode};
    use crate::ocr::{OcrEngine, OcrLine, OcrWord};
    use image::Luma;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type Script = dyn Fn(&GrayImage, Option<Rect>) -> OcrPage + Send + Sync;

    struct FnEngine {
        script: Box<Script>,
        full_page_calls: AtomicUsize,
    }

    impl FnEngine {
        fn new(script: impl Fn(&GrayImage, Option<Rect>) -> OcrPage + Send + Sync + 'static) -> Self {
            Self {
                script: Box::new(script),
                full_page_calls: AtomicUsize::new(0),
            }
        }
    }

    impl OcrEngine for FnEngine {
        fn recognize(
            &self,
            image: &GrayImage,
            region: Option<Rect>,
            _settings: &RecognitionSettings,
        ) -> Result<OcrPage, OcrError> {
            if region.is_none() {
                self.full_page_calls.fetch_add(1, Ordering::SeqCst);
            }
            Ok((self.script)(image, region))
        }

        fn name(&self) -> &str {
            "fn"
        }
    }

    fn title_at(x: i32, y: i32) -> OcrPage {
        OcrPage::new(vec![OcrLine::new(vec![
            OcrWord {
                text: "WORK".to_string(),
                bbox: Rect::new(x, y, 90, 20),
            },
            OcrWord {
                text: "PERMIT".to_string(),
                bbox: Rect::new(x + 100, y, 100, 20),
            },
        ])])
    }

    fn settings() -> RecognitionSettings {
        RecognitionSettings::new(90, EngineMode::Basic, PageSegMode::SingleBlock)
    }

    #[test]
    fn normalizes_dates() {
        assert_eq!(normalize_date("Expires 31.12.2025"), "31/12/2025");
        assert_eq!(normalize_date("0 1 - 0 2 - 1985"), "");
        assert_eq!(normalize_date("01 02 1985"), "01/02/1985");
        assert_eq!(normalize_date("n/a"), "");
    }

    #[test]
    fn reads_areas_of_located_card() -> Result<(), OcrError> {
        // Title at (900, 300) on the page; the coarse crop is 1100x600 and
        // puts the title at (450, 40).
        let layout = CardLayout::new(CardSide::WorkPermit, Rect::new(450, 40, 200, 20), 1100, 600);
        let name_area = layout.area(Field::FullName).expect("name area");
        let expiry_area = layout.area(Field::WorkPermitExpirationDate).expect("expiry area");

        let engine = Arc::new(FnEngine::new(move |image, region| match region {
            None if image.dimensions() == (2000, 1500) => title_at(900, 300),
            None if image.dimensions() == (1100, 600) => title_at(450, 40),
            None => OcrPage::default(),
            Some(r) if r == name_area => OcrPage::from_text("JOHN SMITH"),
            Some(r) if r == expiry_area => OcrPage::from_text("Expires 31.12.2025"),
            Some(_) => OcrPage::default(),
        }));
        let mut extractor = CardExtractor::new(ExtractContext::new(engine.clone()));
        let page = GrayImage::from_pixel(2000, 1500, Luma([255]));

        let output = extractor.extract_pass(std::slice::from_ref(&page), &settings())?;
        assert_eq!(extractor.located_sides(), vec![CardSide::WorkPermit]);
        assert_eq!(output.data.get(Field::FullName), Some("JOHN SMITH"));
        assert_eq!(output.data.get(Field::WorkPermitExpirationDate), Some("31/12/2025"));
        assert_eq!(output.data.completeness(), 25);
        assert!(output.debug.contains("full_name: { JOHN SMITH }"));

        // Four rotations of the page plus one refined read of the crop.
        assert_eq!(engine.full_page_calls.load(Ordering::SeqCst), 5);
        extractor.extract_pass(std::slice::from_ref(&page), &settings())?;
        assert_eq!(engine.full_page_calls.load(Ordering::SeqCst), 5);
        Ok(())
    }

    #[test]
    fn unlocated_card_yields_empty_record() -> Result<(), OcrError> {
        let engine = Arc::new(FnEngine::new(|_, _| OcrPage::from_text("nothing to see")));
        let mut extractor = CardExtractor::new(ExtractContext::new(engine.clone()));
        let pages = vec![
            GrayImage::from_pixel(300, 200, Luma([255])),
            GrayImage::from_pixel(300, 200, Luma([255])),
        ];

        let output = extractor.extract_pass(&pages, &settings())?;
        assert_eq!(output.data.completeness(), 0);
        assert!(extractor.located_sides().is_empty());
        assert_eq!(engine.full_page_calls.load(Ordering::SeqCst), 8);

        // Still unlocated, so the next pass searches again.
        extractor.extract_pass(&pages, &settings())?;
        assert_eq!(engine.full_page_calls.load(Ordering::SeqCst), 16);
        Ok(())
    }
}
