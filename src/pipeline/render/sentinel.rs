//! Inline structured-data line smuggled into the bot's token stream.
//!
//! The backend may open a reply with one line such as
//! `{"PATIENT_DATA": {"nama": "Eka", "umur": "30", ...}}`. The line is
//! hidden from the rendered view but kept verbatim in the transcript.

use crate::models::PatientDataPatch;
use crate::pipeline::PipelineError;

#[derive(Debug, Clone)]
pub struct Sentinel {
    key: String,
    prefix: String,
}

impl Sentinel {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            prefix: format!("{{\"{key}\":"),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Split `raw` into the sentinel line and the remainder.
    ///
    /// Returns `None` when `raw` does not open with the sentinel. While the
    /// line is still streaming in (no newline yet) the remainder is empty.
    pub fn split<'a>(&self, raw: &'a str) -> Option<(&'a str, &'a str)> {
        let trimmed = raw.trim_start();
        if !trimmed.starts_with(&self.prefix) {
            return None;
        }
        match trimmed.find('\n') {
            Some(idx) => Some((trimmed[..idx].trim_end(), &trimmed[idx + 1..])),
            None => Some((trimmed, "")),
        }
    }

    /// Text safe to display: `raw` without a leading sentinel line.
    ///
    /// A reply that so far is only the start of the sentinel prefix
    /// (`{"PATI`) is withheld too, so partial JSON never flashes on screen.
    pub fn strip<'a>(&self, raw: &'a str) -> &'a str {
        if let Some((_, rest)) = self.split(raw) {
            return rest;
        }
        let trimmed = raw.trim_start();
        if trimmed.len() >= 2 && self.prefix.starts_with(trimmed) {
            return "";
        }
        raw
    }

    /// Decode the sentinel payload, if the line is present and complete.
    pub fn parse(&self, raw: &str) -> Result<Option<PatientDataPatch>, PipelineError> {
        let Some((line, _)) = self.split(raw) else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| PipelineError::DecodeFailure(format!("sentinel line: {e}")))?;
        let payload = value.get(&self.key).ok_or_else(|| {
            PipelineError::DecodeFailure(format!("sentinel line has no '{}' key", self.key))
        })?;
        PatientDataPatch::from_json(payload)
            .map(Some)
            .ok_or_else(|| PipelineError::DecodeFailure("sentinel payload is not an object".into()))
    }
}
