//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{AssembleArgs, ClearArgs, CliArgs, Command, FormatArgs, SettingsOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "codebox";
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_STORAGE_PATH: &str = ".codebox/session.json";
const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub preview: PreviewSettings,
    pub storage: StorageSettings,
    pub project: ProjectSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct PreviewSettings {
    pub debounce: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProjectSettings {
    pub default_name: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("CODEBOX").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    preview: RawPreviewSettings,
    storage: RawStorageSettings,
    project: RawProjectSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &SettingsOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(ms) = overrides.debounce_ms {
            self.preview.debounce_ms = Some(ms);
        }
        if let Some(path) = overrides.storage_path.as_ref() {
            self.storage.path = Some(path.clone());
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPreviewSettings {
    debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawProjectSettings {
    default_name: Option<String>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            preview,
            storage,
            project,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            preview: build_preview_settings(preview)?,
            storage: build_storage_settings(storage)?,
            project: build_project_settings(project)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_preview_settings(preview: RawPreviewSettings) -> Result<PreviewSettings, LoadError> {
    let ms = preview.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS);
    if ms == 0 {
        return Err(LoadError::invalid(
            "preview.debounce_ms",
            "must be greater than zero",
        ));
    }
    Ok(PreviewSettings {
        debounce: Duration::from_millis(ms),
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let path = storage
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid("storage.path", "must not be empty"));
    }
    Ok(StorageSettings { path })
}

fn build_project_settings(project: RawProjectSettings) -> Result<ProjectSettings, LoadError> {
    let default_name = match project.default_name {
        Some(name) => {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(LoadError::invalid(
                    "project.default_name",
                    "must not be empty",
                ));
            }
            trimmed.to_string()
        }
        None => DEFAULT_PROJECT_NAME.to_string(),
    };
    Ok(ProjectSettings { default_name })
}
