use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::GrayImage;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ActiveConfig;
use crate::core::model::{DocumentType, Rotation};
use crate::core::page_classifier::{classify_text, Classification};
use crate::core::record::{DocumentBuilder, DocumentData};
use crate::core::settings::RecognitionSettings;
use crate::error::RecognitionError;
use crate::events::{EventDispatcher, EventKind, ManagerEvent};
use crate::export::debug_trace::DebugTrace;
use crate::extract::ExtractContext;
use crate::pages::{imaging, PageSource};

/// One submitted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub source: PathBuf,
}

impl Target {
    /// The id is the source's file name.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let id = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        Self { id, source }
    }
}

/// Completeness after one rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub settings: RecognitionSettings,
    pub completeness: u8,
}

/// A finished target. `document_type` is `None` when no layout matched,
/// which is a valid outcome rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionReport {
    pub id: String,
    pub source: PathBuf,
    pub document_type: Option<DocumentType>,
    pub data: Option<DocumentData>,
    pub completeness: u8,
    pub rotation: Rotation,
    pub passes: Vec<PassSummary>,
}

#[derive(Debug)]
pub struct RecognitionFailure {
    pub id: String,
    pub source: PathBuf,
    pub error: RecognitionError,
}

pub type RecognitionOutcome = Result<RecognitionReport, RecognitionFailure>;

/// Runs one target from source file to finished report.
pub struct RecognitionPipeline {
    ctx: ExtractContext,
    pages: Arc<dyn PageSource>,
}

impl RecognitionPipeline {
    pub fn new(ctx: ExtractContext, pages: Arc<dyn PageSource>) -> Self {
        Self { ctx, pages }
    }

    pub fn process(
        &self,
        target: &Target,
        config: &ActiveConfig,
        events: &EventDispatcher,
    ) -> Result<RecognitionReport, RecognitionError> {
        let mut pages = self.prepare_pages(&target.source, &config.working_dir)?;
        let mut trace = DebugTrace::new(&target.id);

        let Some((classification, rotation)) = self.classify(&pages[0])? else {
            info!(id = %target.id, "no document type recognized");
            trace.note("no document type recognized");
            write_trace(&trace, target, config, events);
            return Ok(RecognitionReport {
                id: target.id.clone(),
                source: target.source.clone(),
                document_type: None,
                data: None,
                completeness: 0,
                rotation: Rotation::Deg0,
                passes: Vec::new(),
            });
        };

        let document_type = classification.document_type;
        info!(
            id = %target.id,
            %document_type,
            score = classification.score,
            %rotation,
            "classified"
        );
        if rotation != Rotation::Deg0 {
            for page in pages.iter_mut() {
                *page = imaging::rotate_quarter(page, rotation);
            }
        }

        let mut extractor = document_type.extractor(&self.ctx);
        let mut builder = DocumentBuilder::new(document_type);
        let mut passes = Vec::new();

        for (iteration, settings) in config.ladder.iter().enumerate() {
            let output = extractor.extract_pass(&pages, settings)?;
            builder.fill_empty_fields(&output.data);
            let completeness = builder.completeness();
            info!(id = %target.id, iteration, %settings, completeness, "pass finished");

            trace.record_pass(iteration, completeness, settings, &builder.snapshot(), &output.debug);
            passes.push(PassSummary {
                settings: *settings,
                completeness,
            });
            if settings.is_passed_by(completeness) {
                break;
            }
        }

        write_trace(&trace, target, config, events);

        let data = builder.build();
        Ok(RecognitionReport {
            id: target.id.clone(),
            source: target.source.clone(),
            document_type: Some(document_type),
            completeness: data.completeness(),
            data: Some(data),
            rotation,
            passes,
        })
    }

    /// Page images in order, each deskewed.
    fn prepare_pages(&self, source: &Path, working_dir: &Path) -> Result<Vec<GrayImage>, RecognitionError> {
        let paths = self.pages.extract_pages(source, working_dir)?;
        if paths.is_empty() {
            return Err(RecognitionError::NoPages(source.to_path_buf()));
        }
        debug!(source = %source.display(), pages = paths.len(), "pages extracted");

        paths
            .iter()
            .map(|path| -> Result<GrayImage, RecognitionError> {
                let page = imaging::load_gray(path)?;
                Ok(imaging::deskew(&page))
            })
            .collect()
    }

    /// Quarter-turn sweep over the first page until a type matches.
    fn classify(&self, first: &GrayImage) -> Result<Option<(Classification, Rotation)>, RecognitionError> {
        for rotation in Rotation::ALL {
            let candidate = imaging::rotate_quarter(first, rotation);
            let text = self
                .ctx
                .engine
                .recognize(&candidate, None, &RecognitionSettings::CLASSIFICATION)?
                .text();
            if let Some(classification) = classify_text(&text) {
                return Ok(Some((classification, rotation)));
            }
            debug!(%rotation, "no match at this orientation");
        }
        Ok(None)
    }
}

fn write_trace(trace: &DebugTrace, target: &Target, config: &ActiveConfig, events: &EventDispatcher) {
    let Some(dir) = &config.debug_dir else {
        return;
    };
    if let Err(err) = trace.write_to(dir) {
        events.fire(
            ManagerEvent::new(EventKind::Miscellaneous, "can't write debug trace")
                .with_file(&target.source)
                .with_cause(&err),
        );
    }
}
