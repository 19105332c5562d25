use std::path::PathBuf;

use thiserror::Error;

use crate::ocr::OcrError;

/// Rejected configuration changes and unusable working directories.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("recognition manager is running")]
    Running,

    #[error("temporary directory location not specified")]
    MissingTempDir,

    #[error("can't create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Lifecycle failures raised by `init` and `start`.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("recognition manager wasn't initialized")]
    NotInitialized,

    #[error("engine can't process the reference image; check the language data path: {0}")]
    SelfTestEngine(#[source] OcrError),

    #[error("engine read {0:?} from the reference image; language data may be missing or wrong")]
    SelfTest(String),

    #[error("worker thread failure: {0}")]
    Worker(String),
}

/// Failure of a single submitted target.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("recognition engine error: {0}")]
    Engine(#[from] OcrError),

    #[error("can't rasterize {path}: {message}")]
    Rasterize { path: PathBuf, message: String },

    #[error("no page images extracted from {0}")]
    NoPages(PathBuf),

    #[error("unsupported file type: {0}")]
    Unsupported(PathBuf),

    #[error("recognition process was aborted")]
    Aborted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RecognitionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecognitionError::Io {
            path: path.into(),
            source,
        }
    }
}
