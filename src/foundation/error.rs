/// Convenience result type used across fxchain.
pub type FxResult<T> = Result<T, FxError>;

/// Top-level error taxonomy used by the filter pipeline.
#[derive(thiserror::Error, Debug)]
pub enum FxError {
    /// Malformed filter records or parameters (unknown type, missing field, bad buffer sizes).
    #[error("validation error: {0}")]
    Validation(String),

    /// An embedded resource (image) failed to fetch or decode.
    #[error("resource load error: {0}")]
    ResourceLoad(String),

    /// Reconstruction was aborted through the cancellation signal.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Rendering-time failures: missing adapter, shader compilation, readback, pass accounting.
    #[error("render error: {0}")]
    Render(String),

    /// Errors when serializing or deserializing filter records.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FxError {
    /// Build a [`FxError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FxError::ResourceLoad`] value.
    pub fn resource_load(msg: impl Into<String>) -> Self {
        Self::ResourceLoad(msg.into())
    }

    /// Build a [`FxError::Cancelled`] value.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Build a [`FxError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`FxError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for user-initiated aborts, which callers usually do not report.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<serde_json::Error> for FxError {
    fn from(e: serde_json::Error) -> Self {
        Self::serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
