//! Chat session core
//!
//! [`ChatSession`] ties the pieces together: it runs extractions for attached
//! files, composes the outgoing query, streams the answer into the transcript
//! and enforces that at most one extraction and one send are in flight.
//! All methods take `&self`; state sits behind a mutex that is never held
//! across an await point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{AnswerBody, ByteStream, HttpBackend, QueryBackend, TransportError, UploadError};
use crate::compose::compose;
use crate::config::Config;
use crate::decode::{DecodeError, Utf8StreamDecoder};
use crate::extract::{self, BlockingWorkerFactory, ExtractionError, FileKind, WorkerFactory};
use crate::state::{Attachment, Message, PendingState, SourceFile};
use crate::transcript::{Transcript, TranscriptEvent};

/// Shown in place of the answer whenever an exchange fails
pub const APOLOGY: &str = "⚠️ Something went wrong. Please try again!";
pub const EMPTY_EXTRACTION: &str = "Failed to extract text. The file may be empty or unreadable.";

#[derive(Debug, Error)]
pub enum AttachError {
    #[error("Another file is still being processed.")]
    Busy,
    #[error("Wait for the current answer before attaching another file.")]
    SendInFlight,
    #[error("Unsupported file type. Please upload a PDF or image.")]
    UnsupportedFileType { mime_type: String },
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("Nothing to send")]
    Empty,
    #[error("A message is already being sent")]
    Busy,
}

/// Why an exchange ended with the apology message
#[derive(Debug, Error)]
pub enum SendFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Failed to decode response: {0}")]
    Decode(#[from] DecodeError),
    #[error("Server returned an empty answer")]
    EmptyAnswer,
}

#[derive(Debug)]
pub enum SendOutcome {
    Completed { answer: String },
    Failed { reason: SendFailure },
}

impl SendOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SendOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    AwaitingResponse,
    Streaming,
    Completed,
    Failed,
}

/// Holds a mutual-exclusion flag for as long as it lives
struct Gate<'a>(&'a AtomicBool);

impl<'a> Gate<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Gate(flag))
    }
}

impl Drop for Gate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct SessionInner {
    transcript: Transcript,
    pending: Vec<Attachment>,
    input: String,
    last_error: Option<String>,
    phase: SendPhase,
}

pub struct ChatSession {
    backend: Arc<dyn QueryBackend>,
    workers: Arc<dyn WorkerFactory>,
    upload_enabled: bool,
    inner: Mutex<SessionInner>,
    sending: AtomicBool,
    processing_file: AtomicBool,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn QueryBackend>, workers: Arc<dyn WorkerFactory>) -> Self {
        Self {
            backend,
            workers,
            upload_enabled: false,
            inner: Mutex::new(SessionInner {
                transcript: Transcript::new(),
                pending: Vec::new(),
                input: String::new(),
                last_error: None,
                phase: SendPhase::Idle,
            }),
            sending: AtomicBool::new(false),
            processing_file: AtomicBool::new(false),
        }
    }

    /// Also POST every successfully extracted file to `/upload`.
    pub fn with_upload(mut self, enabled: bool) -> Self {
        self.upload_enabled = enabled;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let backend = HttpBackend::new(&config.api_url, config.response_mode);
        let workers = BlockingWorkerFactory::new(ocr_engine(config));
        Self::new(Arc::new(backend), Arc::new(workers)).with_upload(config.upload_enabled)
    }

    // Typed input

    pub fn input(&self) -> String {
        self.inner.lock().input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.inner.lock().input = text.into();
    }

    // Read access for the presentation layer

    pub fn transcript(&self) -> Vec<Message> {
        self.inner.lock().transcript.snapshot()
    }

    pub fn pending(&self) -> Vec<Attachment> {
        self.inner.lock().pending.clone()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TranscriptEvent> {
        self.inner.lock().transcript.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn is_processing_file(&self) -> bool {
        self.processing_file.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.inner.lock().last_error = None;
    }

    pub fn phase(&self) -> SendPhase {
        self.inner.lock().phase
    }

    pub fn state(&self) -> PendingState {
        PendingState {
            is_loading: self.is_loading(),
            is_processing_file: self.is_processing_file(),
            last_error: self.last_error(),
        }
    }

    /// Extract a newly attached file and queue it for the next send.
    ///
    /// On success one attachment and one `system` message are added. On any
    /// failure `last_error` is set and nothing else changes. A second call
    /// while one is still running is rejected with [`AttachError::Busy`].
    pub async fn attach_file(&self, file: SourceFile) -> Result<Attachment, AttachError> {
        let _gate = Gate::acquire(&self.processing_file).ok_or_else(|| {
            debug!(file = %file.name, "Rejected attach: extraction already running");
            AttachError::Busy
        })?;
        if self.is_loading() {
            return Err(AttachError::SendInFlight);
        }

        self.clear_error();
        let file_name = file.name.clone();
        info!(file = %file_name, mime = %file.mime_type, "Processing attachment");

        match self.ingest(file).await {
            Ok(attachment) => {
                let mut inner = self.inner.lock();
                inner.pending.push(attachment.clone());
                inner
                    .transcript
                    .append(Message::system(format!("📂 Uploaded: {}", file_name)));
                info!(
                    file = attachment.file_name(),
                    mime = attachment.mime_type(),
                    chars = attachment.extracted_text.len(),
                    "Attachment ready"
                );
                Ok(attachment)
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "Attachment failed");
                self.inner.lock().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn ingest(&self, file: SourceFile) -> Result<Attachment, AttachError> {
        let kind = FileKind::classify(&file.mime_type).ok_or_else(|| AttachError::UnsupportedFileType {
            mime_type: file.mime_type.clone(),
        })?;

        let text = extract::extract(self.workers.as_ref(), file.clone(), kind).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractionError::new(EMPTY_EXTRACTION).into());
        }

        if self.upload_enabled {
            self.backend.upload(&file).await?;
        }

        Ok(Attachment {
            source: file,
            extracted_text: text.to_string(),
        })
    }

    /// Compose the held input with the pending attachments and send it.
    ///
    /// Returns [`SendError::Empty`] without touching anything when there is
    /// nothing to send.
    pub async fn submit(&self) -> Result<SendOutcome, SendError> {
        let query = {
            let inner = self.inner.lock();
            compose(&inner.input, &inner.pending)
        };
        match query {
            Some(query) => self.send(&query).await,
            None => Err(SendError::Empty),
        }
    }

    /// Send `query` and stream the answer into the transcript.
    ///
    /// Transport and decode failures never surface as `Err`: they end in the
    /// apology message and a [`SendOutcome::Failed`]. Input and pending
    /// attachments are cleared whatever happens.
    pub async fn send(&self, query: &str) -> Result<SendOutcome, SendError> {
        let _gate = Gate::acquire(&self.sending).ok_or(SendError::Busy)?;

        {
            let mut inner = self.inner.lock();
            inner.transcript.append(Message::user(query));
            inner.transcript.append(Message::assistant(""));
        }
        self.set_phase(SendPhase::AwaitingResponse);
        info!(chars = query.len(), "Sending query");

        let outcome = match self.exchange(query).await {
            Ok(answer) => {
                self.set_phase(SendPhase::Completed);
                info!(chars = answer.len(), "Answer complete");
                SendOutcome::Completed { answer }
            }
            Err(reason) => {
                warn!(error = %reason, "Query failed");
                self.replace_last(APOLOGY);
                self.set_phase(SendPhase::Failed);
                SendOutcome::Failed { reason }
            }
        };

        {
            let mut inner = self.inner.lock();
            inner.input.clear();
            inner.pending.clear();
            inner.phase = SendPhase::Idle;
        }
        Ok(outcome)
    }

    async fn exchange(&self, query: &str) -> Result<String, SendFailure> {
        let answer = match self.backend.query(query).await? {
            AnswerBody::Complete(answer) => {
                if !answer.is_empty() {
                    self.replace_last(&answer);
                }
                answer
            }
            AnswerBody::Stream(stream) => {
                self.set_phase(SendPhase::Streaming);
                self.consume(stream).await?
            }
        };

        // The placeholder must never be left empty
        if answer.is_empty() {
            return Err(SendFailure::EmptyAnswer);
        }
        Ok(answer)
    }

    async fn consume(&self, mut stream: ByteStream) -> Result<String, SendFailure> {
        let mut decoder = Utf8StreamDecoder::new();
        let mut answer = String::new();

        while let Some(chunk) = stream.next().await {
            let text = decoder.decode(&chunk?)?;
            if text.is_empty() {
                continue;
            }
            answer.push_str(&text);
            self.replace_last(&answer);
        }

        decoder.finish()?;
        Ok(answer)
    }

    fn replace_last(&self, content: &str) {
        if let Err(e) = self.inner.lock().transcript.replace_last(content) {
            warn!(error = %e, "Could not update the answer in place");
        }
    }

    fn set_phase(&self, phase: SendPhase) {
        debug!(?phase, "Send phase");
        self.inner.lock().phase = phase;
    }
}

#[cfg(feature = "leptess")]
fn ocr_engine(config: &Config) -> Arc<dyn extract::OcrEngine> {
    Arc::new(extract::LepTessEngine::new(&config.ocr_language))
}

#[cfg(not(feature = "leptess"))]
fn ocr_engine(config: &Config) -> Arc<dyn extract::OcrEngine> {
    Arc::new(extract::TesseractCli::new(&config.tesseract_path, &config.ocr_language))
}
