//! Widget configuration: constants, layered settings and endpoint resolution.
//!
//! Layers, lowest to highest priority:
//! 1. `WidgetConfig::default()`
//! 2. JSON file (`MEDCONSULT_CONFIG`, else `<config_dir>/medconsult/config.json`)
//! 3. `MEDCONSULT_*` environment overrides
//!
//! The binary applies CLI flags on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "medconsult";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Backend used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Key of the inline structured-data line the backend may emit.
pub const DEFAULT_SENTINEL_KEY: &str = "PATIENT_DATA";

/// Response header carrying backend-extracted patient fields.
pub const DEFAULT_PATIENT_DATA_HEADER: &str = "X-Patient-Data";

/// Shown in place of a failed bot reply, followed by the error text.
pub const DEFAULT_ERROR_PREFIX: &str = "Maaf, terjadi kesalahan: ";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const CONFIG_ENV: &str = "MEDCONSULT_CONFIG";
const BASE_URL_ENV: &str = "MEDCONSULT_BASE_URL";
const PATIENT_SOURCE_ENV: &str = "MEDCONSULT_PATIENT_SOURCE";
const RENDER_MODE_ENV: &str = "MEDCONSULT_RENDER_MODE";
const SESSION_ID_STYLE_ENV: &str = "MEDCONSULT_SESSION_ID_STYLE";

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medconsult=info,medconsult_lib=info"
}

/// Default config file location, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.json"))
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid base URL '{0}'")]
    InvalidUrl(String),

    #[error("Endpoint mode is 'origin' but no origin was provided")]
    MissingOrigin,
}

// ═══════════════════════════════════════════════════════════
// String-valued settings
// ═══════════════════════════════════════════════════════════

/// Generates a snake_case serde enum with `as_str` and `FromStr`.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ConfigError::InvalidValue {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(
    /// Where patient attributes come from during a session.
    PatientDataSource {
        /// Regex extraction on the first user message.
        FirstMessage => "first_message",
        /// Header and inline sentinel pushed by the backend.
        Backend => "backend",
    }
);

str_enum!(
    /// How bot text becomes HTML.
    RenderMode {
        /// Full markdown parser followed by sanitization.
        Markdown => "markdown",
        /// Escape, then bold/italic/line-break substitution.
        Basic => "basic",
    }
);

str_enum!(
    SessionIdStyle {
        Timestamp => "timestamp",
        Uuid => "uuid",
    }
);

str_enum!(
    /// Request body shape for `/chat`.
    ChatProtocol {
        /// `{"history": [...]}`
        History => "history",
        /// `{"message": "..."}`, the oldest widget contract.
        SingleMessage => "single_message",
    }
);

// ═══════════════════════════════════════════════════════════
// Endpoint
// ═══════════════════════════════════════════════════════════

/// Base URL selection, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EndpointConfig {
    Fixed { url: String },
    /// Use the host's own origin (the page origin for a browser widget).
    Origin,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::Fixed {
            url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Concrete endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub base_url: String,
    pub chat_url: String,
    pub save_url: String,
}

impl EndpointConfig {
    pub fn resolve(&self, origin: Option<&str>) -> Result<Endpoints, ConfigError> {
        let base = match self {
            Self::Fixed { url } => url.as_str(),
            Self::Origin => origin.ok_or(ConfigError::MissingOrigin)?,
        };
        let base = base.trim().trim_end_matches('/');
        reqwest::Url::parse(base).map_err(|_| ConfigError::InvalidUrl(base.to_string()))?;

        Ok(Endpoints {
            base_url: base.to_string(),
            chat_url: format!("{base}/chat"),
            save_url: format!("{base}/save-chat"),
        })
    }
}

// ═══════════════════════════════════════════════════════════
// WidgetConfig
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub endpoint: EndpointConfig,
    pub protocol: ChatProtocol,
    pub patient_data_source: PatientDataSource,
    pub session_id_style: SessionIdStyle,
    pub render_mode: RenderMode,
    /// Remove the leading sentinel line before rendering.
    pub strip_sentinel: bool,
    pub sentinel_key: String,
    pub patient_data_header: String,
    /// Include the empty Bot placeholder in the `/chat` history.
    pub send_pending_placeholder: bool,
    pub include_patient_data_in_save: bool,
    pub error_prefix: String,
    pub connect_timeout_secs: u64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            protocol: ChatProtocol::History,
            patient_data_source: PatientDataSource::FirstMessage,
            session_id_style: SessionIdStyle::Timestamp,
            render_mode: RenderMode::Markdown,
            strip_sentinel: true,
            sentinel_key: DEFAULT_SENTINEL_KEY.to_string(),
            patient_data_header: DEFAULT_PATIENT_DATA_HEADER.to_string(),
            send_pending_placeholder: true,
            include_patient_data_in_save: true,
            error_prefix: DEFAULT_ERROR_PREFIX.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl WidgetConfig {
    /// Load defaults, then the config file (if any), then env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded widget config file");
        Ok(config)
    }

    /// Apply `MEDCONSULT_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.endpoint = EndpointConfig::Fixed { url };
        }
        if let Some(v) = lookup(PATIENT_SOURCE_ENV) {
            self.patient_data_source = v.parse()?;
        }
        if let Some(v) = lookup(RENDER_MODE_ENV) {
            self.render_mode = v.parse()?;
        }
        if let Some(v) = lookup(SESSION_ID_STYLE_ENV) {
            self.session_id_style = v.parse()?;
        }
        Ok(())
    }
}
