pub mod imaging;
pub mod renderer;

pub use renderer::PageRenderer;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RecognitionError;

/// File extensions accepted for submission, lower case.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["pdf", "jpg", "jpeg", "png", "gif", "bmp"];

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Produces one image file per page of a submitted document.
pub trait PageSource: Send + Sync {
    fn extract_pages(&self, source: &Path, work_dir: &Path) -> Result<Vec<PathBuf>, RecognitionError>;
}

/// PDFs are rasterized; image files are copied as a single page.
#[derive(Debug, Clone, Default)]
pub struct FilePageSource {
    renderer: PageRenderer,
}

impl FilePageSource {
    pub fn new(renderer: PageRenderer) -> Self {
        Self { renderer }
    }
}

impl PageSource for FilePageSource {
    fn extract_pages(&self, source: &Path, work_dir: &Path) -> Result<Vec<PathBuf>, RecognitionError> {
        if !source.is_file() {
            return Err(RecognitionError::io(
                source,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a file"),
            ));
        }
        if !is_supported(source) {
            return Err(RecognitionError::Unsupported(source.to_path_buf()));
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string());
        let is_pdf = source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            return self.renderer.render_all(source, work_dir, &stem);
        }

        fs::create_dir_all(work_dir).map_err(|e| RecognitionError::io(work_dir, e))?;
        let file_name = source.file_name().unwrap_or(source.as_os_str());
        let destination = work_dir.join(file_name);
        fs::copy(source, &destination).map_err(|e| RecognitionError::io(source, e))?;
        Ok(vec![destination])
    }
}
