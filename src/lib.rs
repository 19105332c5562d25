pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod export;
pub mod extract;
pub mod layout;
pub mod manager;
pub mod ocr;
pub mod pages;
pub mod pipeline;

pub use crate::core::{DocumentData, DocumentType, Field, RecognitionSettings};
pub use manager::{JobHandle, ManagerState, RecognitionManager};
pub use pipeline::{RecognitionFailure, RecognitionOutcome, RecognitionReport};
