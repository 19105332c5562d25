pub mod geometry;
pub mod model;
pub mod page_classifier;
pub mod record;
pub mod settings;

pub use geometry::{Line, Point, Rect};
pub use model::{DocumentType, Field, Rotation};
pub use record::{DocumentBuilder, DocumentData};
pub use settings::{EngineMode, LadderPreset, PageSegMode, RecognitionSettings};
