use thiserror::Error;

/// Failures that must reach the caller. Everything else inside the engine
/// self-corrects silently (rollback, skip, clear).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("host did not provide a rendering surface")]
    MissingSurface,

    #[error("engine has been disposed")]
    Disposed,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
