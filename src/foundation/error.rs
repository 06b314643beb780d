/// Convenience result type used across cardforge.
pub type CardforgeResult<T> = Result<T, CardforgeError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum CardforgeError {
    /// Invalid user-provided spec or element data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while drawing an element or compositing a card.
    #[error("render error: {0}")]
    Render(String),

    /// Errors while reading or typing the tabular data source.
    #[error("data error: {0}")]
    Data(String),

    /// Errors when serializing or deserializing documents.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CardforgeError {
    /// Build a [`CardforgeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CardforgeError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`CardforgeError::Data`] value.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Build a [`CardforgeError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
