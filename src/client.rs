use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ResponseMode;
use crate::state::SourceFile;

const UPLOAD_FAILURE: &str = "Failed to upload file.";

/// Chunked response body
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Server error: {0}")]
    Status(u16),
    #[error("No response body received.")]
    MissingBody,
    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

/// Upload failure; the message is shown to the user verbatim
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct UploadError(pub String);

pub enum AnswerBody {
    /// Whole answer read at once (`{"answer": ...}`)
    Complete(String),
    /// Raw text chunks, no envelope
    Stream(ByteStream),
}

impl std::fmt::Debug for AnswerBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerBody::Complete(answer) => f.debug_tuple("Complete").field(answer).finish(),
            AnswerBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// The remote side of a chat session
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(&self, question: &str) -> Result<AnswerBody, TransportError>;

    async fn upload(&self, file: &SourceFile) -> Result<(), UploadError>;
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(alias = "response")]
    answer: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    mode: ResponseMode,
}

impl HttpBackend {
    pub fn new(base_url: &str, mode: ResponseMode) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            mode,
        }
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    async fn query(&self, question: &str) -> Result<AnswerBody, TransportError> {
        let url = format!("{}/query", self.base_url);
        debug!(%url, mode = ?self.mode, "Sending query");

        let response = self
            .client
            .post(&url)
            .json(&QueryRequest { question })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        match self.mode {
            ResponseMode::Json => {
                let body: QueryResponse = response.json().await?;
                Ok(AnswerBody::Complete(body.answer))
            }
            ResponseMode::Stream => {
                let stream = response.bytes_stream().map_err(TransportError::from);
                Ok(AnswerBody::Stream(stream.boxed()))
            }
        }
    }

    async fn upload(&self, file: &SourceFile) -> Result<(), UploadError> {
        let url = format!("{}/upload", self.base_url);

        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| UploadError(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Upload request failed");
                UploadError(UPLOAD_FAILURE.to_string())
            })?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| UPLOAD_FAILURE.to_string());
        warn!(%status, %message, "Upload rejected");
        Err(UploadError(message))
    }
}
