//! Text extraction workers
//!
//! Each extraction runs in its own single-use worker. A [`WorkerFactory`]
//! hands out a fresh [`Worker`] per call; the worker consumes itself when it
//! runs, so it cannot be reused, and reports back exactly one
//! [`WorkerMessage`].

pub mod ocr;
pub mod pdf;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::state::SourceFile;
pub use ocr::{OcrEngine, TesseractCli};

#[cfg(feature = "leptess")]
pub use ocr::LepTessEngine;

pub const PDF_MIME: &str = "application/pdf";

/// Human readable extraction failure. No partial text is ever attached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ExtractionError {
    pub message: String,
}

impl ExtractionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Pdf,
}

impl FileKind {
    /// Classify a declared MIME type. `None` means unsupported.
    pub fn classify(mime_type: &str) -> Option<FileKind> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence.starts_with("image/") {
            Some(FileKind::Image)
        } else if essence == PDF_MIME {
            Some(FileKind::Pdf)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Pdf => "pdf",
        }
    }

    /// Message reported when the engine itself dies mid-extraction
    fn crash_message(&self) -> &'static str {
        match self {
            FileKind::Image => "Image processing failed",
            FileKind::Pdf => pdf::PDF_FAILURE,
        }
    }
}

/// What a worker posts back: `{"text": ...}` or `{"error": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerMessage {
    Text { text: String },
    Error { error: String },
}

impl WorkerMessage {
    pub fn text(text: impl Into<String>) -> Self {
        WorkerMessage::Text { text: text.into() }
    }

    pub fn error(error: impl Into<String>) -> Self {
        WorkerMessage::Error { error: error.into() }
    }

    pub fn into_result(self) -> Result<String, ExtractionError> {
        match self {
            WorkerMessage::Text { text } => Ok(text),
            WorkerMessage::Error { error } => Err(ExtractionError::new(error)),
        }
    }
}

impl From<Result<String, ExtractionError>> for WorkerMessage {
    fn from(result: Result<String, ExtractionError>) -> Self {
        match result {
            Ok(text) => WorkerMessage::text(text),
            Err(e) => WorkerMessage::error(e.message),
        }
    }
}

/// A one-shot extraction unit
#[async_trait]
pub trait Worker: Send {
    async fn run(self: Box<Self>, file: SourceFile) -> WorkerMessage;
}

pub trait WorkerFactory: Send + Sync {
    fn spawn(&self, kind: FileKind) -> Box<dyn Worker>;
}

/// Extract text from `file` with a freshly spawned worker.
pub async fn extract(
    factory: &dyn WorkerFactory,
    file: SourceFile,
    kind: FileKind,
) -> Result<String, ExtractionError> {
    debug!(file = %file.name, kind = kind.as_str(), bytes = file.bytes.len(), "Spawning extraction worker");
    factory.spawn(kind).run(file).await.into_result()
}

/// Runs every extraction on its own blocking task
pub struct BlockingWorkerFactory {
    ocr: Arc<dyn OcrEngine>,
}

impl BlockingWorkerFactory {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }
}

impl WorkerFactory for BlockingWorkerFactory {
    fn spawn(&self, kind: FileKind) -> Box<dyn Worker> {
        Box::new(BlockingWorker {
            kind,
            ocr: Arc::clone(&self.ocr),
        })
    }
}

struct BlockingWorker {
    kind: FileKind,
    ocr: Arc<dyn OcrEngine>,
}

#[async_trait]
impl Worker for BlockingWorker {
    async fn run(self: Box<Self>, file: SourceFile) -> WorkerMessage {
        let kind = self.kind;
        let ocr = self.ocr;
        let (tx, rx) = oneshot::channel();

        let handle = tokio::task::spawn_blocking(move || {
            let result = match kind {
                FileKind::Image => ocr.recognize(&file.bytes),
                FileKind::Pdf => pdf::extract_text(&file.bytes),
            };
            let _ = tx.send(WorkerMessage::from(result));
        });

        match rx.await {
            Ok(message) => message,
            Err(_) => {
                // Sender dropped without a reply: the engine panicked
                if let Err(e) = handle.await {
                    warn!(kind = kind.as_str(), error = %e, "Extraction worker crashed");
                }
                WorkerMessage::error(kind.crash_message())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingOcr;

    impl OcrEngine for PanickingOcr {
        fn recognize(&self, _image: &[u8]) -> Result<String, ExtractionError> {
            panic!("engine blew up");
        }
    }

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn recognize(&self, _image: &[u8]) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_classify_images() {
        assert_eq!(FileKind::classify("image/png"), Some(FileKind::Image));
        assert_eq!(FileKind::classify("image/jpeg"), Some(FileKind::Image));
        assert_eq!(FileKind::classify("IMAGE/WEBP"), Some(FileKind::Image));
    }

    #[test]
    fn test_classify_pdf_exact() {
        assert_eq!(FileKind::classify("application/pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::classify("application/pdf; charset=binary"), Some(FileKind::Pdf));
        assert_eq!(FileKind::classify("application/pdfx"), None);
    }

    #[test]
    fn test_classify_unsupported() {
        assert_eq!(FileKind::classify("text/plain"), None);
        assert_eq!(FileKind::classify("application/msword"), None);
        assert_eq!(FileKind::classify(""), None);
    }

    #[test]
    fn test_worker_message_wire_format() {
        let ok: WorkerMessage = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(ok.into_result(), Ok("hello".to_string()));

        let err: WorkerMessage = serde_json::from_str(r#"{"error":"bad scan"}"#).unwrap();
        assert_eq!(err.into_result(), Err(ExtractionError::new("bad scan")));

        let json = serde_json::to_string(&WorkerMessage::text("x")).unwrap();
        assert_eq!(json, r#"{"text":"x"}"#);
    }

    #[tokio::test]
    async fn test_blocking_worker_returns_ocr_text() {
        let factory = BlockingWorkerFactory::new(Arc::new(FixedOcr("WARRANTY DEED")));
        let file = SourceFile::new("deed.png", "image/png", vec![1u8, 2, 3]);

        let text = extract(&factory, file, FileKind::Image).await.unwrap();
        assert_eq!(text, "WARRANTY DEED");
    }

    #[tokio::test]
    async fn test_crashing_engine_becomes_error() {
        let factory = BlockingWorkerFactory::new(Arc::new(PanickingOcr));
        let file = SourceFile::new("scan.jpg", "image/jpeg", vec![0u8; 8]);

        let err = extract(&factory, file, FileKind::Image).await.unwrap_err();
        assert_eq!(err.message, "Image processing failed");
    }

    #[tokio::test]
    async fn test_corrupt_pdf_through_worker() {
        let factory = BlockingWorkerFactory::new(Arc::new(FixedOcr("unused")));
        let file = SourceFile::new("broken.pdf", PDF_MIME, b"not a pdf at all".to_vec());

        let err = extract(&factory, file, FileKind::Pdf).await.unwrap_err();
        assert_eq!(err.message, pdf::PDF_FAILURE);
    }
}
