//! reqwest-backed `ConsultationBackend`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::warn;

use super::{ChatRequest, ChatResponse, ConsultationBackend, SaveChatRequest};
use crate::config::{ConfigError, Endpoints, WidgetConfig};
use crate::pipeline::PipelineError;

/// HTTP client for the chat and save endpoints.
///
/// Only the connect phase is time-limited; a reply may stream for as
/// long as the backend keeps producing tokens.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoints: Endpoints,
    patient_data_header: String,
}

impl HttpBackend {
    pub fn new(
        endpoints: Endpoints,
        patient_data_header: &str,
        connect_timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                PipelineError::TransportFailure(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoints,
            patient_data_header: patient_data_header.to_string(),
        })
    }

    /// Resolve endpoints once from config (and the host origin, if any).
    pub fn from_config(config: &WidgetConfig, origin: Option<&str>) -> Result<Self, ConfigError> {
        let endpoints = config.endpoint.resolve(origin)?;
        Self::new(
            endpoints,
            &config.patient_data_header,
            Duration::from_secs(config.connect_timeout_secs),
        )
        .map_err(|e| ConfigError::InvalidValue {
            field: "http_client".into(),
            value: e.to_string(),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

fn describe_send_error(e: &reqwest::Error, url: &str) -> String {
    if e.is_connect() {
        format!("Failed to connect to {url}")
    } else if e.is_timeout() {
        format!("Request to {url} timed out")
    } else {
        e.to_string()
    }
}

/// Header text as sent. Raw UTF-8 (a name like "Zoë") is accepted even though
/// it is not visible ASCII; anything else is a decode failure and dropped.
fn decode_header(name: &str, value: &reqwest::header::HeaderValue) -> Option<String> {
    match std::str::from_utf8(value.as_bytes()) {
        Ok(text) => Some(text.to_string()),
        Err(e) => {
            let err = PipelineError::DecodeFailure(format!("{name} header is not UTF-8: {e}"));
            warn!(error = %err, "Ignoring patient-data header");
            None
        }
    }
}

#[async_trait]
impl ConsultationBackend for HttpBackend {
    async fn open_chat(&self, request: &ChatRequest) -> Result<ChatResponse, PipelineError> {
        let url = &self.endpoints.chat_url;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| PipelineError::TransportFailure(describe_send_error(&e, url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatusFailure {
                status: status.as_u16(),
            });
        }

        let patient_data_header = response
            .headers()
            .get(self.patient_data_header.as_str())
            .and_then(|v| decode_header(&self.patient_data_header, v));

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| PipelineError::TransportFailure(format!("Connection lost: {e}")))
            })
            .boxed();

        Ok(ChatResponse {
            patient_data_header,
            body,
        })
    }

    async fn save_chat(&self, request: &SaveChatRequest) -> Result<(), PipelineError> {
        let url = &self.endpoints.save_url;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| PipelineError::PersistenceFailure(describe_send_error(&e, url)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::PersistenceFailure(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(())
    }
}
