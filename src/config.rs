//! Manager configuration: the mutable settings edited before `init`, and
//! the frozen snapshot the worker reads while running.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::settings::{LadderPreset, RecognitionSettings};
use crate::error::ConfigError;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const WORKING_IMAGES_DIR: &str = "workingImages";
pub const DEBUG_DIR: &str = "debug";

/// Either a named preset or an explicit list of rungs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LadderConfig {
    Preset(LadderPreset),
    Steps(Vec<RecognitionSettings>),
}

impl Default for LadderConfig {
    fn default() -> Self {
        LadderConfig::Preset(LadderPreset::Default)
    }
}

impl From<LadderPreset> for LadderConfig {
    fn from(preset: LadderPreset) -> Self {
        LadderConfig::Preset(preset)
    }
}

impl From<Vec<RecognitionSettings>> for LadderConfig {
    fn from(steps: Vec<RecognitionSettings>) -> Self {
        LadderConfig::Steps(steps)
    }
}

impl LadderConfig {
    /// Resolved rungs. An empty list falls back to the default preset.
    pub fn steps(&self) -> Vec<RecognitionSettings> {
        match self {
            LadderConfig::Preset(preset) => preset.settings(),
            LadderConfig::Steps(steps) if steps.is_empty() => LadderPreset::Default.settings(),
            LadderConfig::Steps(steps) => steps
                .iter()
                .map(|s| RecognitionSettings::new(s.passing_completeness(), s.engine_mode(), s.page_seg_mode()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Root for the working-images and debug directories.
    pub temp_dir: Option<PathBuf>,
    pub debug_output: bool,
    /// Language data for the OCR engine.
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
    pub ladder: LadderConfig,
    pub poll_interval_ms: u64,
    /// Run the reference-image check during `init`.
    pub self_test: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            debug_output: false,
            tessdata_dir: None,
            language: "eng".to_string(),
            ladder: LadderConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            self_test: true,
        }
    }
}

impl ManagerConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Creates the working directories and freezes the configuration.
    pub fn activate(&self) -> Result<ActiveConfig, ConfigError> {
        let temp_dir = self.temp_dir.clone().ok_or(ConfigError::MissingTempDir)?;

        let working_dir = temp_dir.join(WORKING_IMAGES_DIR);
        create_dir(&working_dir)?;

        let debug_dir = if self.debug_output {
            let dir = temp_dir.join(DEBUG_DIR);
            create_dir(&dir)?;
            Some(dir)
        } else {
            None
        };

        Ok(ActiveConfig {
            temp_dir,
            working_dir,
            debug_dir,
            ladder: self.ladder.steps(),
            poll_interval: self.poll_interval(),
        })
    }
}

fn create_dir(path: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(path).map_err(|source| ConfigError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Configuration as captured by `init`; never changes while running.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveConfig {
    pub temp_dir: PathBuf,
    pub working_dir: PathBuf,
    pub debug_dir: Option<PathBuf>,
    pub ladder: Vec<RecognitionSettings>,
    pub poll_interval: Duration,
}
