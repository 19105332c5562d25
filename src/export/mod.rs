pub mod debug_trace;
pub mod json_export;

use anyhow::Result;

use crate::pipeline::RecognitionReport;

pub use debug_trace::DebugTrace;
pub use json_export::JsonExporter;

pub trait Exporter {
    fn export(&self, reports: &[RecognitionReport]) -> Result<()>;
}
