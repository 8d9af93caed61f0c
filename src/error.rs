use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while turning a configuration into a compiler.
///
/// Nothing in this enum is produced once scanning has started: file and
/// token level problems surface as [`Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid theme: {0}")]
    InvalidTheme(String),

    #[error("invalid plugin '{plugin}': {reason}")]
    InvalidPlugin { plugin: String, reason: String },

    #[error("invalid content pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid variant separator '{0}'")]
    InvalidSeparator(char),

    #[error("invalid lexer options: {0}")]
    InvalidLexer(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ConfigError {
    pub(crate) fn plugin(plugin: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidPlugin {
            plugin: plugin.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PluginError(pub String);

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("skipped unreadable directory {path}: {message}")]
    UnreadableDirectory { path: PathBuf, message: String },

    #[error("skipped unreadable file {path}: {message}")]
    UnreadableFile { path: PathBuf, message: String },

    #[error("filesystem walk error: {0}")]
    Walk(String),
}
