//! OCR engines for image attachments

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, error};

use super::ExtractionError;

const DEFAULT_FAILURE: &str = "Text extraction failed";

/// Recognize the text in one encoded image. Called from a blocking task.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &[u8]) -> Result<String, ExtractionError>;
}

/// Shells out to the `tesseract` binary, one child process per image
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: String,
    language: String,
}

impl TesseractCli {
    pub fn new(program: &str, language: &str) -> Self {
        Self {
            program: program.to_string(),
            language: language.to_string(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &[u8]) -> Result<String, ExtractionError> {
        let mut child = self.command().spawn().map_err(|e| {
            error!(program = %self.program, error = %e, "Failed to start tesseract");
            ExtractionError::new(format!("Failed to start OCR engine: {}", e))
        })?;

        // Tesseract reads the whole image before writing anything, so writing
        // stdin to completion first cannot deadlock on a full stdout pipe.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(image) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExtractionError::new(format!("Failed to feed OCR engine: {}", e)));
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| ExtractionError::new(format!("OCR engine did not finish: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().find(|l| !l.trim().is_empty()).unwrap_or(DEFAULT_FAILURE);
            debug!(status = %output.status, "tesseract exited with failure");
            return Err(ExtractionError::new(reason.trim()));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| ExtractionError::new("OCR engine produced invalid UTF-8"))
    }
}

/// In-process Tesseract. A fresh engine is created for every image.
#[cfg(feature = "leptess")]
#[derive(Debug, Clone)]
pub struct LepTessEngine {
    language: String,
}

#[cfg(feature = "leptess")]
impl LepTessEngine {
    pub fn new(language: &str) -> Self {
        Self { language: language.to_string() }
    }
}

#[cfg(feature = "leptess")]
impl OcrEngine for LepTessEngine {
    fn recognize(&self, image: &[u8]) -> Result<String, ExtractionError> {
        let mut lt = leptess::LepTess::new(None, &self.language)
            .map_err(|e| ExtractionError::new(format!("Failed to initialize Tesseract: {}", e)))?;

        lt.set_image_from_mem(image)
            .map_err(|e| ExtractionError::new(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| ExtractionError::new(format!("OCR failed: {}", e)))
    }
}
