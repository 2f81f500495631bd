//! Chat controller: one patient conversation end to end.
//!
//! Owns the session state and wires the pipeline stages together:
//! extractor → transcript → stream consumer → patient-data merge → autosave.
//!
//! One exchange at a time: a second `send_message` while a reply is still
//! streaming is rejected with `ChatError::Busy`, not queued.

use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{PatientDataSource, WidgetConfig};
use crate::models::{PatientData, PatientDataPatch, Turn};
use crate::pipeline::attributes::AttributeExtractor;
use crate::pipeline::autosave::{self, SaveOutcome};
use crate::pipeline::render::{MarkdownRenderer, Sentinel};
use crate::pipeline::stream::{StreamConsumer, StreamOutcome};
use crate::pipeline::PipelineError;
use crate::session::ChatSession;
use crate::transport::{ChatRequest, ConsultationBackend};
use crate::view::ChatView;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("A reply is still streaming")]
    Busy,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Intake form field '{0}' is required")]
    IncompleteIntake(&'static str),

    #[error("Session lock poisoned")]
    LockPoisoned,
}

/// The patient form shown before the first message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeForm {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub complaint: String,
}

impl IntakeForm {
    fn validate(&self) -> Result<(), ChatError> {
        for (field, value) in [
            ("name", &self.name),
            ("age", &self.age),
            ("gender", &self.gender),
            ("complaint", &self.complaint),
        ] {
            if value.trim().is_empty() {
                return Err(ChatError::IncompleteIntake(field));
            }
        }
        Ok(())
    }

    fn patient_data(&self) -> PatientData {
        PatientData {
            name: self.name.trim().to_string(),
            age: self.age.trim().to_string(),
            gender: self.gender.trim().to_string(),
            complaint: Some(self.complaint.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub stream: StreamOutcome,
    pub save: SaveOutcome,
    /// Patient data after extraction / merge.
    pub patient_data: PatientData,
}

impl ExchangeOutcome {
    /// The reply was lost to a transport or HTTP status failure.
    pub fn is_failed(&self) -> bool {
        self.stream.error.as_ref().is_some_and(PipelineError::is_fatal)
    }
}

pub struct ChatController<B, V> {
    config: WidgetConfig,
    backend: B,
    view: V,
    renderer: MarkdownRenderer,
    extractor: AttributeExtractor,
    sentinel: Sentinel,
    session: Mutex<ChatSession>,
    exchange_gate: tokio::sync::Mutex<()>,
}

impl<B: ConsultationBackend, V: ChatView> ChatController<B, V> {
    pub fn new(config: WidgetConfig, backend: B, view: V) -> Self {
        Self::with_extractor(config, backend, view, AttributeExtractor::default())
    }

    pub fn with_extractor(
        config: WidgetConfig,
        backend: B,
        view: V,
        extractor: AttributeExtractor,
    ) -> Self {
        let renderer = MarkdownRenderer::from_config(&config);
        let sentinel = Sentinel::new(&config.sentinel_key);
        Self {
            config,
            backend,
            view,
            renderer,
            extractor,
            sentinel,
            session: Mutex::new(ChatSession::new()),
            exchange_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn is_busy(&self) -> bool {
        self.exchange_gate.try_lock().is_err()
    }

    /// Clone of the current session state.
    pub fn snapshot(&self) -> Result<ChatSession, ChatError> {
        Ok(self.lock_session()?.clone())
    }

    /// Submit one patient message and stream the reply to completion.
    ///
    /// Transport and HTTP failures do not surface as `Err`; they end up in
    /// the outcome and as an error turn in the transcript.
    pub async fn send_message(&self, text: &str) -> Result<ExchangeOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let _gate = self.exchange_gate.try_lock().map_err(|_| ChatError::Busy)?;
        self.run_exchange(text).await
    }

    /// Start a fresh session from the intake form and send the complaint.
    pub async fn start_with_intake(&self, form: IntakeForm) -> Result<ExchangeOutcome, ChatError> {
        form.validate()?;
        let _gate = self.exchange_gate.try_lock().map_err(|_| ChatError::Busy)?;
        {
            let mut session = self.lock_session()?;
            session.reset();
            session.ensure_session_id(self.config.session_id_style);
            session.patient_data = form.patient_data();
            session.extraction_done = true;
            info!(
                session_id = %session.session_id.as_ref().map(|s| s.as_str()).unwrap_or_default(),
                "Session started from intake form"
            );
        }
        self.run_exchange(form.complaint.trim()).await
    }

    /// Forget the transcript, patient data and session id.
    pub fn new_session(&self) -> Result<(), ChatError> {
        let _gate = self.exchange_gate.try_lock().map_err(|_| ChatError::Busy)?;
        self.lock_session()?.reset();
        info!("Session reset");
        Ok(())
    }

    /// Render a static bot message (welcome text, notices). Not stored.
    pub fn show_notice(&self, raw: &str) {
        let handle = self.view.open_bot_message();
        let html = self.renderer.render(raw);
        self.view
            .update_bot_message(handle, self.renderer.visible_text(raw), &html);
    }

    // ── exchange ──────────────────────────────────────────────

    async fn run_exchange(&self, text: &str) -> Result<ExchangeOutcome, ChatError> {
        let (request, bot_index, session_id) = {
            let mut session = self.lock_session()?;
            let session_id = session
                .ensure_session_id(self.config.session_id_style)
                .clone();

            if self.config.patient_data_source == PatientDataSource::FirstMessage
                && !session.extraction_done
            {
                session.patient_data = self.extractor.extract(text, &session.patient_data);
                session.extraction_done = true;
            }

            session.transcript.push(Turn::user(text));
            let bot_index = session.transcript.push(Turn::bot_placeholder());
            let request = ChatRequest::build(
                self.config.protocol,
                &session.transcript,
                self.config.send_pending_placeholder,
            );
            (request, bot_index, session_id)
        };

        info!(session_id = %session_id, turn = bot_index, "Exchange started");
        self.view.display_user_message(text);
        let handle = self.view.open_bot_message();

        let stream = StreamConsumer::new(&self.renderer, &self.view, &self.config.error_prefix)
            .consume(&self.backend, &request, handle, |message| {
                match self.session.lock() {
                    Ok(mut session) => {
                        session.transcript.set_message(bot_index, message);
                    }
                    Err(_) => warn!("Session lock poisoned; dropping stream update"),
                }
            })
            .await;

        let (transcript, session_id, patient_data) = {
            let mut session = self.lock_session()?;
            if self.config.patient_data_source == PatientDataSource::Backend {
                self.merge_backend_data(&mut session.patient_data, &stream);
            }
            (
                session.transcript.clone(),
                session.session_id.clone(),
                session.patient_data.clone(),
            )
        };

        let save = autosave::save(
            &self.backend,
            &transcript,
            session_id.as_ref(),
            self.config
                .include_patient_data_in_save
                .then_some(&patient_data),
        )
        .await;

        info!(
            session_id = %session_id.as_ref().map(|s| s.as_str()).unwrap_or_default(),
            state = ?stream.state,
            chunks = stream.chunks,
            save = ?save,
            "Exchange finished"
        );
        Ok(ExchangeOutcome {
            stream,
            save,
            patient_data,
        })
    }

    /// Apply backend-pushed patient data: header first, then the sentinel line.
    fn merge_backend_data(&self, patient: &mut PatientData, stream: &StreamOutcome) {
        if let Some(raw) = stream.patient_data_header.as_deref() {
            match self.parse_header(raw) {
                Ok(patch) => {
                    if patient.merge(&patch) {
                        debug!("Patient data updated from response header");
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring patient-data header"),
            }
        }
        if stream.error.is_none() {
            match self.sentinel.parse(&stream.message) {
                Ok(Some(patch)) => {
                    if patient.merge(&patch) {
                        debug!("Patient data updated from sentinel line");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Ignoring sentinel line"),
            }
        }
    }

    /// Header value is a JSON object, bare or wrapped in the sentinel key.
    fn parse_header(&self, raw: &str) -> Result<PatientDataPatch, PipelineError> {
        let value: serde_json::Value = serde_json::from_str(raw.trim())
            .map_err(|e| PipelineError::DecodeFailure(e.to_string()))?;
        let inner = value.get(self.sentinel.key()).unwrap_or(&value);
        PatientDataPatch::from_json(inner).ok_or_else(|| {
            PipelineError::DecodeFailure("patient-data header is not a JSON object".into())
        })
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, ChatSession>, ChatError> {
        self.session.lock().map_err(|_| ChatError::LockPoisoned)
    }
}
