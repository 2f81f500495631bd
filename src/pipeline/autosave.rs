//! Best-effort transcript persistence.

use tracing::{debug, warn};

use crate::models::{PatientData, SessionId, Transcript};
use crate::transport::{ConsultationBackend, SaveChatRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to save or no session id yet; no request was made.
    Skipped,
    Saved,
    Failed(String),
}

/// Snapshot the transcript to `/save-chat`.
///
/// Never propagates failures and never retries.
pub async fn save<B: ConsultationBackend + ?Sized>(
    backend: &B,
    transcript: &Transcript,
    session_id: Option<&SessionId>,
    patient_data: Option<&PatientData>,
) -> SaveOutcome {
    let Some(session_id) = session_id else {
        debug!("Auto-save skipped: no session id");
        return SaveOutcome::Skipped;
    };
    if transcript.is_empty() {
        debug!(session_id = %session_id, "Auto-save skipped: empty transcript");
        return SaveOutcome::Skipped;
    }

    let request = SaveChatRequest {
        chat_history: transcript.turns().to_vec(),
        session_id: session_id.as_str().to_string(),
        patient_data: patient_data.cloned(),
    };

    match backend.save_chat(&request).await {
        Ok(()) => {
            debug!(session_id = %session_id, turns = transcript.len(), "Chat saved");
            SaveOutcome::Saved
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Auto-save failed");
            SaveOutcome::Failed(e.to_string())
        }
    }
}
