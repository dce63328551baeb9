pub mod auth;
pub mod client;
pub mod compose;
pub mod config;
pub mod decode;
pub mod extract;
pub mod format;
pub mod session;
pub mod state;
pub mod transcript;
pub mod view;

// Re-export main types for convenience
pub use auth::{Credentials, UserDirectory};
pub use client::{AnswerBody, HttpBackend, QueryBackend};
pub use compose::compose;
pub use config::{Config, ResponseMode};
pub use extract::{BlockingWorkerFactory, ExtractionError, FileKind, OcrEngine, TesseractCli, WorkerFactory};
pub use session::{AttachError, ChatSession, SendError, SendOutcome, SendPhase};
pub use state::{Attachment, Message, PendingState, Role, SourceFile};
pub use transcript::{Transcript, TranscriptEvent};
