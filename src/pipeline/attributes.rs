//! Heuristic patient-attribute extraction from a free-text message.
//!
//! Each field has an ordered list of `FieldRule`s (regex + extractor fn).
//! Rules are evaluated in order and the first one that yields a value wins,
//! so precedence lives in the rule tables rather than in control flow.
//! Only fields still at their `"unknown"` default are attempted.

use regex::{Captures, Regex};

use crate::models::PatientData;

pub const MALE_LABEL: &str = "Laki-laki";
pub const FEMALE_LABEL: &str = "Perempuan";

/// Exclusive bounds for a plausible age.
const MIN_AGE: u32 = 0;
const MAX_AGE: u32 = 150;

/// Words that open a message without being a name.
const GREETING_WORDS: &[&str] = &[
    "halo", "hallo", "helo", "hai", "hi", "hello", "hey", "pagi", "siang", "sore", "malam",
    "selamat", "permisi", "assalamualaikum", "salam", "dok", "dokter", "test", "tes", "ok",
    "oke", "terima", "makasih",
];

/// Words that start a new clause after "saya"; a captured name stops here.
const NON_NAME_WORDS: &[&str] = &[
    "umur", "usia", "berusia", "tahun", "thn", "dan", "saya", "aku", "yang", "sedang", "lagi",
    "mau", "ingin", "sakit", "merasa", "punya", "sudah", "belum", "tidak", "jenis", "kelamin",
    "laki", "perempuan", "pria", "wanita", "dari", "asal", "tinggal", "dengan",
];

// ═══════════════════════════════════════════════════════════
// Rules
// ═══════════════════════════════════════════════════════════

/// One extraction rule: a pattern and a function turning a match into a value.
pub struct FieldRule {
    pub label: &'static str,
    regex: Regex,
    extract: fn(&Captures<'_>) -> Option<String>,
}

impl FieldRule {
    pub fn new(
        label: &'static str,
        pattern: &str,
        extract: fn(&Captures<'_>) -> Option<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            label,
            regex: Regex::new(pattern)?,
            extract,
        })
    }

    fn builtin(
        label: &'static str,
        pattern: &str,
        extract: fn(&Captures<'_>) -> Option<String>,
    ) -> Self {
        Self::new(label, pattern, extract).expect("valid regex")
    }

    /// First value produced by any match of this rule, in text order.
    pub fn apply(&self, text: &str) -> Option<String> {
        self.regex
            .captures_iter(text)
            .find_map(|caps| (self.extract)(&caps))
    }
}

/// Value of the first ordered rule that produces one.
pub fn first_match(rules: &[FieldRule], text: &str) -> Option<String> {
    rules.iter().find_map(|rule| {
        let value = rule.apply(text)?;
        tracing::trace!(rule = rule.label, "Attribute rule matched");
        Some(value)
    })
}

fn name_from_capture(caps: &Captures<'_>) -> Option<String> {
    let raw = caps.get(1)?.as_str();
    let mut words = Vec::new();
    for word in raw.split_whitespace() {
        if NON_NAME_WORDS.contains(&word.to_lowercase().as_str()) {
            break;
        }
        words.push(word);
    }
    if words.is_empty() || words.concat().chars().count() < 2 {
        return None;
    }
    Some(title_case(&words.join(" ")))
}

fn age_from_capture(caps: &Captures<'_>) -> Option<String> {
    let value: u32 = caps.get(1)?.as_str().parse().ok()?;
    (value > MIN_AGE && value < MAX_AGE).then(|| value.to_string())
}

fn male(_: &Captures<'_>) -> Option<String> {
    Some(MALE_LABEL.to_string())
}

fn female(_: &Captures<'_>) -> Option<String> {
    Some(FEMALE_LABEL.to_string())
}

const NAME_WORDS: &str = r"(\p{L}+(?:\s+\p{L}+){0,3})";

pub fn default_name_rules() -> Vec<FieldRule> {
    vec![
        FieldRule::builtin(
            "nama saya",
            &format!(r"(?i)\bnama\s+saya\s+(?:adalah\s+|ialah\s+)?{NAME_WORDS}"),
            name_from_capture,
        ),
        FieldRule::builtin(
            "saya",
            &format!(
                r"(?i)(?:^\s*(?:(?:{greetings})\b[\s,.!?]*)*|[.,!?]\s*)saya\s+(?:adalah\s+)?{NAME_WORDS}",
                greetings = GREETING_WORDS.join("|"),
            ),
            name_from_capture,
        ),
        FieldRule::builtin(
            "perkenalkan saya",
            &format!(r"(?i)\bperkenalkan\s*,?\s+(?:nama\s+)?saya\s+(?:adalah\s+)?{NAME_WORDS}"),
            name_from_capture,
        ),
    ]
}

pub fn default_age_rules() -> Vec<FieldRule> {
    vec![
        FieldRule::builtin(
            "<n> tahun",
            r"(?i)\b(\d+)\s*(?:tahun|thn|th|years?|yo|y/o)\b",
            age_from_capture,
        ),
        FieldRule::builtin(
            "umur <n>",
            r"(?i)\b(?:umur|usia|berusia)\s*(?:saya\s*)?(?:adalah\s*)?:?\s*(\d+)\b",
            age_from_capture,
        ),
    ]
}

/// Male group first: a message matching both resolves to male.
pub fn default_gender_rules() -> Vec<FieldRule> {
    vec![
        FieldRule::builtin(
            "male",
            r"(?i)\b(?:laki[\s-]*laki|lelaki|pria|cowok|cowo|male|man)\b",
            male,
        ),
        FieldRule::builtin(
            "female",
            r"(?i)\b(?:perempuan|wanita|cewek|cewe|female|woman)\b",
            female,
        ),
    ]
}

// ═══════════════════════════════════════════════════════════
// Extractor
// ═══════════════════════════════════════════════════════════

pub struct AttributeExtractor {
    name_rules: Vec<FieldRule>,
    age_rules: Vec<FieldRule>,
    gender_rules: Vec<FieldRule>,
}

impl Default for AttributeExtractor {
    fn default() -> Self {
        Self::with_rules(default_name_rules(), default_age_rules(), default_gender_rules())
    }
}

impl AttributeExtractor {
    pub fn with_rules(
        name_rules: Vec<FieldRule>,
        age_rules: Vec<FieldRule>,
        gender_rules: Vec<FieldRule>,
    ) -> Self {
        Self {
            name_rules,
            age_rules,
            gender_rules,
        }
    }

    /// Refine `current` from `message`. Fields already set are never touched.
    pub fn extract(&self, message: &str, current: &PatientData) -> PatientData {
        let mut data = current.clone();

        if !data.has_name() {
            if let Some(name) =
                first_match(&self.name_rules, message).or_else(|| fallback_name(message))
            {
                data.name = name;
            }
        }
        if !data.has_age() {
            if let Some(age) = first_match(&self.age_rules, message) {
                data.age = age;
            }
        }
        if !data.has_gender() {
            if let Some(gender) = first_match(&self.gender_rules, message) {
                data.gender = gender;
            }
        }

        if data != *current {
            tracing::debug!(
                name_set = data.has_name(),
                age_set = data.has_age(),
                gender_set = data.has_gender(),
                "Patient attributes extracted from message"
            );
        }
        data
    }
}

/// First token as a name, unless it is a greeting, a clause word,
/// shorter than two characters or not purely alphabetic.
fn fallback_name(message: &str) -> Option<String> {
    let token = message.split_whitespace().next()?;
    let token = token.trim_end_matches(|c: char| c.is_ascii_punctuation());
    if token.chars().count() < 2 || !token.chars().all(char::is_alphabetic) {
        return None;
    }
    let lower = token.to_lowercase();
    if GREETING_WORDS.contains(&lower.as_str()) || NON_NAME_WORDS.contains(&lower.as_str()) {
        return None;
    }
    Some(title_case(token))
}

/// "budi SANTOSO" → "Budi Santoso"
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
