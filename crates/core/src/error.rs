/// Result alias that carries the custom [`ThinkError`] type.
pub type Result<T> = std::result::Result<T, ThinkError>;

/// Common error type for the core crate.
///
/// Only the boundary adapters (config loading, audio host, image fetcher)
/// produce these. The timeline compiler, validator and verifier never fail.
#[derive(Debug, thiserror::Error)]
pub enum ThinkError {
    /// Free-form message, mostly raised by host implementations.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Config or timeline (de)serialization failure.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// The audio host could not fetch, decode or play a sound.
    #[error("audio `{url}`: {reason}")]
    Audio { url: String, reason: String },
    /// The image fetcher could not fetch or decode an asset.
    #[error("asset `{url}`: {reason}")]
    Asset { url: String, reason: String },
}

impl ThinkError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn audio(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Audio {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn asset(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Asset {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for ThinkError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ThinkError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
