//! Per-conversation state owned by the chat controller.

use crate::config::SessionIdStyle;
use crate::models::{PatientData, SessionId, Transcript};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSession {
    pub transcript: Transcript,
    /// `None` until the first message or the intake form starts a session.
    pub session_id: Option<SessionId>,
    pub patient_data: PatientData,
    /// Set once the first user message has been offered to the extractor.
    pub extraction_done: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a session id if none exists yet. Returns the id in use.
    pub fn ensure_session_id(&mut self, style: SessionIdStyle) -> &SessionId {
        self.session_id.get_or_insert_with(|| SessionId::generate(style))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
