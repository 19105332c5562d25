use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::RecognitionError;

/// Rasterizes every page of a PDF with `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    dpi: u32,
}

impl PageRenderer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Writes `<prefix>-<n>.png` files into `out_dir` and returns them in page order.
    pub fn render_all(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
        prefix: &str,
    ) -> Result<Vec<PathBuf>, RecognitionError> {
        fs::create_dir_all(out_dir).map_err(|e| RecognitionError::io(out_dir, e))?;

        let prefix_path = out_dir.join(prefix);
        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf_path)
            .arg(&prefix_path)
            .output()
            .map_err(|e| RecognitionError::Rasterize {
                path: pdf_path.to_path_buf(),
                message: format!("failed to invoke pdftoppm; is poppler-utils installed? ({e})"),
            })?;

        if !output.status.success() {
            return Err(RecognitionError::Rasterize {
                path: pdf_path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let pages = collect_pages(out_dir, prefix).map_err(|e| RecognitionError::io(out_dir, e))?;
        debug!(pdf = %pdf_path.display(), pages = pages.len(), "rasterized pdf");
        Ok(pages)
    }
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new(300)
    }
}

/// pdftoppm zero-pads page numbers to the width of the page count, so
/// files are ordered by the parsed number rather than by name.
fn collect_pages(out_dir: &Path, prefix: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut numbered = Vec::new();
    for entry in fs::read_dir(out_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(page) = page_number(name, prefix) else {
            continue;
        };
        numbered.push((page, path));
    }
    numbered.sort_by_key(|(page, _)| *page);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

fn page_number(file_name: &str, prefix: &str) -> Option<u32> {
    file_name
        .strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(".png")?
        .parse()
        .ok()
}
