//! Wire contract with the consultation backend.
//!
//! Two endpoints:
//! - `POST {base}/chat`: streamed text reply, optional patient-data header
//! - `POST {base}/save-chat`: fire-and-forget transcript persistence

pub mod http;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::Serialize;

use crate::config::ChatProtocol;
use crate::models::{PatientData, Transcript, Turn};
use crate::pipeline::PipelineError;

pub use http::HttpBackend;

/// Raw response body, one item per network chunk.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, PipelineError>>;

/// `/chat` request body, one variant per contract version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatRequest {
    History { history: Vec<Turn> },
    Message { message: String },
}

impl ChatRequest {
    pub fn build(protocol: ChatProtocol, transcript: &Transcript, include_pending: bool) -> Self {
        match protocol {
            ChatProtocol::History => Self::History {
                history: transcript.history_for_request(include_pending),
            },
            ChatProtocol::SingleMessage => Self::Message {
                message: transcript.last_user_message().unwrap_or_default().to_string(),
            },
        }
    }
}

/// An opened `/chat` response whose body has not been read yet.
pub struct ChatResponse {
    /// Raw value of the patient-data header, if the backend sent one.
    pub patient_data_header: Option<String>,
    pub body: ByteStream,
}

/// `/save-chat` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatRequest {
    pub chat_history: Vec<Turn>,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_data: Option<PatientData>,
}

#[async_trait]
pub trait ConsultationBackend: Send + Sync {
    /// Send the chat request. Resolves once response headers arrive.
    ///
    /// Connection failure → `TransportFailure`; non-2xx → `HttpStatusFailure`.
    async fn open_chat(&self, request: &ChatRequest) -> Result<ChatResponse, PipelineError>;

    /// Persist a transcript snapshot. Non-2xx → `PersistenceFailure`.
    async fn save_chat(&self, request: &SaveChatRequest) -> Result<(), PipelineError>;
}
