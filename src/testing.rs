//! Scripted backend and recording view shared by controller and pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use crate::pipeline::PipelineError;
use crate::transport::{
    ByteStream, ChatRequest, ChatResponse, ConsultationBackend, SaveChatRequest,
};
use crate::view::{ChatView, MessageHandle};

pub enum MockReply {
    Bytes { chunks: Vec<Vec<u8>>, header: Option<String> },
    /// Body items arrive as the test sends them; the stream ends when the
    /// sender is dropped.
    Channel {
        rx: mpsc::UnboundedReceiver<Result<Vec<u8>, PipelineError>>,
        header: Option<String>,
    },
    FailMidStream { chunks: Vec<String>, error: PipelineError },
    /// `open_chat` itself fails.
    Fail(PipelineError),
}

impl MockReply {
    pub fn chunks(chunks: &[&str]) -> Self {
        Self::Bytes {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            header: None,
        }
    }

    pub fn with_header(chunks: &[&str], header: &str) -> Self {
        Self::Bytes {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            header: Some(header.to_string()),
        }
    }

    pub fn connect_refused() -> Self {
        Self::Fail(PipelineError::TransportFailure(
            "Could not reach consultation backend".into(),
        ))
    }
}

#[derive(Default)]
pub struct MockBackend {
    replies: Mutex<VecDeque<MockReply>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    saves: Mutex<Vec<SaveChatRequest>>,
    save_error: Mutex<Option<PipelineError>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Every subsequent save fails with `error`.
    pub fn fail_saves(&self, error: PipelineError) {
        *self.save_error.lock().unwrap() = Some(error);
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<SaveChatRequest> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConsultationBackend for MockBackend {
    async fn open_chat(&self, request: &ChatRequest) -> Result<ChatResponse, PipelineError> {
        self.chat_requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PipelineError::TransportFailure("no scripted reply".into()))?;

        let (body, header): (ByteStream, Option<String>) = match reply {
            MockReply::Bytes { chunks, header } => {
                (stream::iter(chunks.into_iter().map(Ok)).boxed(), header)
            }
            MockReply::Channel { rx, header } => {
                let body = stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                (body.boxed(), header)
            }
            MockReply::FailMidStream { chunks, error } => {
                let items = chunks
                    .into_iter()
                    .map(|c| Ok(c.into_bytes()))
                    .chain(std::iter::once(Err(error)));
                (stream::iter(items).boxed(), None)
            }
            MockReply::Fail(error) => return Err(error),
        };

        Ok(ChatResponse {
            patient_data_header: header,
            body,
        })
    }

    async fn save_chat(&self, request: &SaveChatRequest) -> Result<(), PipelineError> {
        self.saves.lock().unwrap().push(request.clone());
        match self.save_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    User(String),
    Opened(MessageHandle),
    Update {
        handle: MessageHandle,
        visible: String,
        html: String,
    },
    Error {
        handle: MessageHandle,
        message: String,
    },
    LoadingShown,
    LoadingRemoved,
}

#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
    next_handle: AtomicU64,
}

impl RecordingView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    /// `(visible_text, html)` of every update, in order.
    pub fn updates(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Update { visible, html, .. } => Some((visible, html)),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(MessageHandle, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Error { handle, message } => Some((handle, message)),
                _ => None,
            })
            .collect()
    }

    pub fn user_messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::User(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ChatView for RecordingView {
    fn display_user_message(&self, text: &str) {
        self.record(ViewEvent::User(text.to_string()));
    }

    fn open_bot_message(&self) -> MessageHandle {
        let handle = MessageHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.record(ViewEvent::Opened(handle));
        handle
    }

    fn update_bot_message(&self, handle: MessageHandle, visible_text: &str, html: &str) {
        self.record(ViewEvent::Update {
            handle,
            visible: visible_text.to_string(),
            html: html.to_string(),
        });
    }

    fn show_error(&self, handle: MessageHandle, message: &str) {
        self.record(ViewEvent::Error {
            handle,
            message: message.to_string(),
        });
    }

    fn show_loading(&self) {
        self.record(ViewEvent::LoadingShown);
    }

    fn remove_loading(&self) {
        self.record(ViewEvent::LoadingRemoved);
    }
}
