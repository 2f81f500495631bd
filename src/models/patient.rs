use serde::{Deserialize, Serialize};

/// Placeholder for a patient field nobody has filled in yet.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientData {
    pub name: String,
    pub age: String,
    pub gender: String,
    /// Initial complaint from the intake form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complaint: Option<String>,
}

impl Default for PatientData {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            age: UNKNOWN.to_string(),
            gender: UNKNOWN.to_string(),
            complaint: None,
        }
    }
}

impl PatientData {
    pub fn has_name(&self) -> bool {
        is_known(&self.name)
    }

    pub fn has_age(&self) -> bool {
        is_known(&self.age)
    }

    pub fn has_gender(&self) -> bool {
        is_known(&self.gender)
    }

    /// Overwrite fields with every known value in `patch`.
    ///
    /// This is the backend write path; unlike the extractor it may
    /// replace values that are already set. Returns true if anything changed.
    pub fn merge(&mut self, patch: &PatientDataPatch) -> bool {
        let mut changed = false;
        for (slot, value) in [
            (&mut self.name, &patch.name),
            (&mut self.age, &patch.age),
            (&mut self.gender, &patch.gender),
        ] {
            if let Some(v) = value.as_deref().filter(|v| is_known(v)) {
                if slot.as_str() != v {
                    *slot = v.to_string();
                    changed = true;
                }
            }
        }
        if let Some(c) = patch.complaint.as_deref().filter(|v| is_known(v)) {
            if self.complaint.as_deref() != Some(c) {
                self.complaint = Some(c.to_string());
                changed = true;
            }
        }
        changed
    }
}

/// A value counts as set when it is non-blank and not `"unknown"`.
pub fn is_known(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && !v.eq_ignore_ascii_case(UNKNOWN)
}

/// Partial patient fields pushed by the backend.
///
/// Accepts the backend's Indonesian keys (`nama`, `umur`, `keluhan_awal`)
/// as well as English ones, and numeric ages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientDataPatch {
    pub name: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub complaint: Option<String>,
}

impl PatientDataPatch {
    /// Build from a JSON object. Returns `None` for non-objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |keys: &[&str]| {
            keys.iter().find_map(|k| match obj.get(*k)? {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        };
        Some(Self {
            name: field(&["nama", "name"]),
            age: field(&["umur", "age", "usia"]),
            gender: field(&["gender", "jenis_kelamin"]),
            complaint: field(&["keluhan_awal", "complaint", "keluhan"]),
        })
    }
}
