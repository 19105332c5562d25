pub mod patterns;
pub mod regions;

pub use patterns::PatternExtractor;
pub use regions::CardExtractor;

use std::sync::Arc;

use image::GrayImage;

use crate::core::model::DocumentType;
use crate::core::record::DocumentData;
use crate::core::settings::RecognitionSettings;
use crate::layout::detector::{LineDetector, MorphologyDetector};
use crate::ocr::{OcrEngine, OcrError};

/// Result of one extraction pass.
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub data: DocumentData,
    /// Free-form diagnostics for the debug trace.
    pub debug: String,
}

/// Per-type field extraction, run once per rung of the settings ladder.
///
/// Implementations may keep state between passes of the same target
/// (for example, a card outline found on an earlier pass).
pub trait FieldExtractor: Send {
    fn document_type(&self) -> DocumentType;

    fn extract_pass(
        &mut self,
        pages: &[GrayImage],
        settings: &RecognitionSettings,
    ) -> Result<PassOutput, OcrError>;
}

/// Collaborators shared by every extractor of one manager.
#[derive(Clone)]
pub struct ExtractContext {
    pub engine: Arc<dyn OcrEngine>,
    pub detector: Arc<dyn LineDetector>,
}

impl ExtractContext {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            detector: Arc::new(MorphologyDetector::default()),
        }
    }
}

impl DocumentType {
    /// Fresh extractor for one target of this type.
    pub fn extractor(self, ctx: &ExtractContext) -> Box<dyn FieldExtractor> {
        match self {
            DocumentType::ManpowerForm => Box::new(PatternExtractor::new(ctx.clone())),
            DocumentType::WorkPermitCard => Box::new(CardExtractor::new(ctx.clone())),
        }
    }
}
