use std::fmt;

use serde::{Deserialize, Serialize};

/// OCR engine mode, mapped onto Tesseract's `--oem` values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Legacy engine only.
    Basic,
    Lstm,
    /// Legacy and LSTM combined.
    Full,
    Default,
}

impl EngineMode {
    pub fn code(self) -> u8 {
        match self {
            EngineMode::Basic => 0,
            EngineMode::Lstm => 1,
            EngineMode::Full => 2,
            EngineMode::Default => 3,
        }
    }
}

/// Page segmentation mode, mapped onto Tesseract's `--psm` values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    Auto,
    SingleColumn,
    SingleBlock,
    SingleWord,
    SparseText,
}

impl PageSegMode {
    pub fn code(self) -> u8 {
        match self {
            PageSegMode::Auto => 3,
            PageSegMode::SingleColumn => 4,
            PageSegMode::SingleBlock => 6,
            PageSegMode::SingleWord => 8,
            PageSegMode::SparseText => 11,
        }
    }
}

/// One rung of the settings ladder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RecognitionSettings {
    passing_completeness: u8,
    engine_mode: EngineMode,
    page_seg_mode: PageSegMode,
}

impl RecognitionSettings {
    /// Settings for the orientation/type sweep.
    pub const CLASSIFICATION: RecognitionSettings =
        RecognitionSettings::new(0, EngineMode::Basic, PageSegMode::SingleBlock);

    /// Settings for the reference-image check run by `init`.
    pub const SELF_TEST: RecognitionSettings =
        RecognitionSettings::new(0, EngineMode::Default, PageSegMode::SingleWord);

    /// Thresholds above 100 are clamped.
    pub const fn new(passing_completeness: u8, engine_mode: EngineMode, page_seg_mode: PageSegMode) -> Self {
        let passing_completeness = if passing_completeness > 100 {
            100
        } else {
            passing_completeness
        };
        Self {
            passing_completeness,
            engine_mode,
            page_seg_mode,
        }
    }

    pub fn passing_completeness(&self) -> u8 {
        self.passing_completeness
    }

    pub fn engine_mode(&self) -> EngineMode {
        self.engine_mode
    }

    pub fn page_seg_mode(&self) -> PageSegMode {
        self.page_seg_mode
    }

    pub fn is_passed_by(&self, completeness: u8) -> bool {
        completeness >= self.passing_completeness
    }
}

impl fmt::Display for RecognitionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecognitionSettings{{passing_completeness={}, engine_mode={:?}({}), page_seg_mode={:?}({})}}",
            self.passing_completeness,
            self.engine_mode,
            self.engine_mode.code(),
            self.page_seg_mode,
            self.page_seg_mode.code()
        )
    }
}

/// Named settings ladders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LadderPreset {
    #[default]
    Default,
    Sloppy,
    Fast,
    Perfectionist,
    Whatever,
}

impl LadderPreset {
    pub fn settings(self) -> Vec<RecognitionSettings> {
        use EngineMode::{Basic, Full};
        use PageSegMode::{Auto, SingleBlock, SparseText};

        match self {
            LadderPreset::Default => vec![
                RecognitionSettings::new(90, Basic, SingleBlock),
                RecognitionSettings::new(90, Full, SingleBlock),
            ],
            LadderPreset::Sloppy => vec![
                RecognitionSettings::new(75, Basic, SingleBlock),
                RecognitionSettings::new(75, Full, SingleBlock),
            ],
            LadderPreset::Fast => vec![RecognitionSettings::new(80, Basic, SingleBlock)],
            LadderPreset::Perfectionist => vec![
                RecognitionSettings::new(100, Basic, SingleBlock),
                RecognitionSettings::new(100, Basic, SparseText),
                RecognitionSettings::new(100, Full, SingleBlock),
                RecognitionSettings::new(100, Basic, SparseText),
            ],
            LadderPreset::Whatever => vec![RecognitionSettings::new(0, Basic, Auto)],
        }
    }
}
