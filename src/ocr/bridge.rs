use std::path::{Path, PathBuf};
use std::process::Command;

use image::{imageops, GrayImage, ImageFormat};
use tracing::debug;

use crate::core::geometry::Rect;
use crate::core::settings::RecognitionSettings;
use crate::ocr::{hocr, OcrEngine, OcrError, OcrPage};

/// Runs the `tesseract` binary on a temporary PNG and parses its hOCR output.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    tessdata_dir: Option<PathBuf>,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            tessdata_dir: None,
        }
    }

    pub fn with_binary(mut self, binary: PathBuf) -> Self {
        self.binary = binary;
        self
    }

    pub fn with_language(mut self, language: String) -> Self {
        self.language = language;
        self
    }

    pub fn with_tessdata_dir(mut self, tessdata_dir: Option<PathBuf>) -> Self {
        self.tessdata_dir = tessdata_dir;
        self
    }

    fn run_tesseract(&self, image_path: &Path, settings: &RecognitionSettings) -> Result<String, OcrError> {
        let mut command = Command::new(&self.binary);
        command
            .arg(image_path)
            .arg("stdout")
            .args(["--oem", &settings.engine_mode().code().to_string()])
            .args(["--psm", &settings.page_seg_mode().code().to_string()])
            .args(["-l", &self.language]);
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        command.arg("hocr");

        match command.output() {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr.trim())))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::BackendNotAvailable(
                format!("{} not found (install tesseract-ocr)", self.binary.display()),
            )),
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(
        &self,
        image: &GrayImage,
        region: Option<Rect>,
        settings: &RecognitionSettings,
    ) -> Result<OcrPage, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidParameters("empty image".to_string()));
        }

        let file = tempfile::Builder::new()
            .prefix("fieldscan-ocr-")
            .suffix(".png")
            .tempfile()?;

        match region {
            Some(region) => {
                let clipped = region.clip_to(width, height);
                if clipped.is_empty() {
                    return Err(OcrError::InvalidParameters(format!(
                        "region {region:?} lies outside the {width}x{height} image"
                    )));
                }
                imageops::crop_imm(
                    image,
                    clipped.x as u32,
                    clipped.y as u32,
                    clipped.width as u32,
                    clipped.height as u32,
                )
                .to_image()
                .save_with_format(file.path(), ImageFormat::Png)
            }
            None => image.save_with_format(file.path(), ImageFormat::Png),
        }
        .map_err(|e| OcrError::ImageError(e.to_string()))?;

        debug!(region = ?region, %settings, "running tesseract");
        let markup = self.run_tesseract(file.path(), settings)?;
        hocr::parse_hocr(&markup)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
