//! Streaming response consumer.
//!
//! Drives one exchange through
//! `Idle → RequestSent → Streaming* → Complete | Failed`, re-rendering the
//! accumulated buffer after every chunk.

pub mod chunks;

use tracing::{debug, warn};

use crate::pipeline::render::MarkdownRenderer;
use crate::pipeline::PipelineError;
use crate::transport::{ChatRequest, ConsultationBackend};
use crate::view::{ChatView, MessageHandle};

pub use chunks::{TextChunks, Utf8ChunkDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    RequestSent,
    Streaming,
    Complete,
    Failed,
}

/// Result of one consumed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    /// `Complete` or `Failed`.
    pub state: ExchangeState,
    /// Final stored message of the bot turn (raw buffer, or the error text).
    pub message: String,
    pub chunks: usize,
    pub patient_data_header: Option<String>,
    pub error: Option<PipelineError>,
}

pub struct StreamConsumer<'a, V: ChatView + ?Sized> {
    renderer: &'a MarkdownRenderer,
    view: &'a V,
    error_prefix: &'a str,
    state: ExchangeState,
    loading: bool,
}

impl<'a, V: ChatView + ?Sized> StreamConsumer<'a, V> {
    pub fn new(renderer: &'a MarkdownRenderer, view: &'a V, error_prefix: &'a str) -> Self {
        Self {
            renderer,
            view,
            error_prefix,
            state: ExchangeState::Idle,
            loading: false,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Run the exchange to a terminal state.
    ///
    /// `store` receives the full bot message every time it changes, so the
    /// transcript turn always mirrors what has been received.
    pub async fn consume<B, F>(
        &mut self,
        backend: &B,
        request: &ChatRequest,
        handle: MessageHandle,
        mut store: F,
    ) -> StreamOutcome
    where
        B: ConsultationBackend + ?Sized,
        F: FnMut(&str) + Send,
    {
        self.transition(ExchangeState::RequestSent);
        self.view.show_loading();
        self.loading = true;

        let response = match backend.open_chat(request).await {
            Ok(response) => response,
            Err(e) => return self.fail(e, handle, &mut store, 0, None),
        };
        let header = response.patient_data_header;

        self.transition(ExchangeState::Streaming);
        let mut chunks = TextChunks::new(response.body);
        let mut buffer = String::new();
        let mut count = 0usize;

        while let Some(next) = chunks.next_chunk().await {
            let text = match next {
                Ok(text) => text,
                Err(e) => return self.fail(e, handle, &mut store, count, header),
            };
            self.clear_loading();
            count += 1;
            buffer.push_str(&text);
            store(&buffer);
            let html = self.renderer.render(&buffer);
            self.view
                .update_bot_message(handle, self.renderer.visible_text(&buffer), &html);
        }

        self.clear_loading();
        self.transition(ExchangeState::Complete);
        debug!(chunks = count, bytes = buffer.len(), "Stream complete");
        StreamOutcome {
            state: ExchangeState::Complete,
            message: buffer,
            chunks: count,
            patient_data_header: header,
            error: None,
        }
    }

    fn fail<F: FnMut(&str)>(
        &mut self,
        error: PipelineError,
        handle: MessageHandle,
        store: &mut F,
        chunks: usize,
        header: Option<String>,
    ) -> StreamOutcome {
        self.clear_loading();
        self.transition(ExchangeState::Failed);
        warn!(error = %error, chunks, "Exchange failed");
        let message = format!("{}{}", self.error_prefix, error);
        store(&message);
        self.view.show_error(handle, &message);
        StreamOutcome {
            state: ExchangeState::Failed,
            message,
            chunks,
            patient_data_header: header,
            error: Some(error),
        }
    }

    fn clear_loading(&mut self) {
        if self.loading {
            self.loading = false;
            self.view.remove_loading();
        }
    }

    fn transition(&mut self, next: ExchangeState) {
        debug!(from = ?self.state, to = ?next, "Exchange state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderMode;
    use crate::pipeline::render::Sentinel;
    use crate::testing::{MockBackend, MockReply, RecordingView, ViewEvent};

    const PREFIX: &str = "Maaf, terjadi kesalahan: ";

    fn request() -> ChatRequest {
        ChatRequest::Message { message: "halo".into() }
    }

    fn basic() -> MarkdownRenderer {
        MarkdownRenderer::new(RenderMode::Basic, None)
    }

    #[tokio::test]
    async fn each_chunk_rerenders_a_longer_prefix() {
        let backend = MockBackend::new();
        backend.push(MockReply::chunks(&["Hel", "lo wor", "ld"]));
        let view = RecordingView::default();
        let renderer = basic();
        let handle = view.open_bot_message();
        let mut stored = Vec::new();

        let mut consumer = StreamConsumer::new(&renderer, &view, PREFIX);
        let outcome = consumer
            .consume(&backend, &request(), handle, |m| stored.push(m.to_string()))
            .await;

        assert_eq!(outcome.state, ExchangeState::Complete);
        assert_eq!(outcome.message, "Hello world");
        assert_eq!(outcome.chunks, 3);
        assert_eq!(consumer.state(), ExchangeState::Complete);
        assert_eq!(stored, vec!["Hel", "Hello wor", "Hello world"]);

        let updates = view.updates();
        assert_eq!(updates.len(), 3);
        for pair in updates.windows(2) {
            assert!(pair[1].0.len() > pair[0].0.len());
            assert!(pair[1].0.starts_with(&pair[0].0));
        }
        assert_eq!(updates[2].1, "Hello world");
    }

    #[tokio::test]
    async fn loading_removed_exactly_once_on_first_chunk() {
        let backend = MockBackend::new();
        backend.push(MockReply::chunks(&["a", "b"]));
        let view = RecordingView::default();
        let renderer = basic();
        let handle = view.open_bot_message();

        StreamConsumer::new(&renderer, &view, PREFIX)
            .consume(&backend, &request(), handle, |_| {})
            .await;

        let events = view.events();
        let shown = events.iter().filter(|e| **e == ViewEvent::LoadingShown).count();
        let removed = events.iter().filter(|e| **e == ViewEvent::LoadingRemoved).count();
        assert_eq!((shown, removed), (1, 1));
        let removed_at = events.iter().position(|e| *e == ViewEvent::LoadingRemoved);
        let first_update = events.iter().position(|e| matches!(e, ViewEvent::Update { .. }));
        assert!(removed_at < first_update);
    }

    #[tokio::test]
    async fn multibyte_split_across_chunks_renders_cleanly() {
        let backend = MockBackend::new();
        backend.push(MockReply::Bytes {
            chunks: vec![b"Dem\xC3".to_vec(), b"\xA9am".to_vec()],
            header: None,
        });
        let view = RecordingView::default();
        let renderer = basic();
        let handle = view.open_bot_message();

        let outcome = StreamConsumer::new(&renderer, &view, PREFIX)
            .consume(&backend, &request(), handle, |_| {})
            .await;

        assert_eq!(outcome.message, "Deméam");
        assert!(!outcome.message.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn mid_stream_error_overwrites_partial_text() {
        let backend = MockBackend::new();
        backend.push(MockReply::FailMidStream {
            chunks: vec!["Sebagian".into()],
            error: PipelineError::TransportFailure("Connection lost: reset".into()),
        });
        let view = RecordingView::default();
        let renderer = basic();
        let handle = view.open_bot_message();
        let mut last = String::new();

        let outcome = StreamConsumer::new(&renderer, &view, PREFIX)
            .consume(&backend, &request(), handle, |m| last = m.to_string())
            .await;

        assert_eq!(outcome.state, ExchangeState::Failed);
        assert_eq!(outcome.chunks, 1);
        assert_eq!(outcome.message, "Maaf, terjadi kesalahan: Connection lost: reset");
        assert_eq!(last, outcome.message);
        assert_eq!(view.errors(), vec![(handle, outcome.message.clone())]);
    }

    #[tokio::test]
    async fn http_status_failure_never_streams() {
        let backend = MockBackend::new();
        backend.push(MockReply::Fail(PipelineError::HttpStatusFailure { status: 500 }));
        let view = RecordingView::default();
        let renderer = basic();
        let handle = view.open_bot_message();

        let outcome = StreamConsumer::new(&renderer, &view, PREFIX)
            .consume(&backend, &request(), handle, |_| {})
            .await;

        assert_eq!(outcome.state, ExchangeState::Failed);
        assert_eq!(outcome.message, "Maaf, terjadi kesalahan: HTTP error! status: 500");
        assert!(view.updates().is_empty());
        let removed = view
            .events()
            .iter()
            .filter(|e| **e == ViewEvent::LoadingRemoved)
            .count();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn sentinel_hidden_from_view_but_stored() {
        let backend = MockBackend::new();
        backend.push(MockReply::chunks(&[
            "{\"PATIENT_DATA\": {\"nama\": \"Budi\"}}\n",
            "Halo Budi",
        ]));
        let view = RecordingView::default();
        let renderer = MarkdownRenderer::new(
            RenderMode::Basic,
            Some(Sentinel::new("PATIENT_DATA")),
        );
        let handle = view.open_bot_message();

        let outcome = StreamConsumer::new(&renderer, &view, PREFIX)
            .consume(&backend, &request(), handle, |_| {})
            .await;

        assert!(outcome.message.starts_with("{\"PATIENT_DATA\""));
        let updates = view.updates();
        assert!(updates.iter().all(|(visible, html)| {
            !visible.contains("PATIENT_DATA") && !html.contains("PATIENT_DATA")
        }));
        assert_eq!(updates.last().map(|u| u.0.as_str()), Some("Halo Budi"));
    }

    #[tokio::test]
    async fn header_captured_for_caller() {
        let backend = MockBackend::new();
        backend.push(MockReply::Bytes {
            chunks: vec![b"ok".to_vec()],
            header: Some("{\"nama\":\"Sari\"}".into()),
        });
        let view = RecordingView::default();
        let renderer = basic();
        let handle = view.open_bot_message();

        let outcome = StreamConsumer::new(&renderer, &view, PREFIX)
            .consume(&backend, &request(), handle, |_| {})
            .await;

        assert_eq!(outcome.patient_data_header.as_deref(), Some("{\"nama\":\"Sari\"}"));
    }
}
