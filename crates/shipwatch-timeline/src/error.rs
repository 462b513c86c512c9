use thiserror::Error;

/// Failure of one snapshot load path. Never fatal to a consuming view: the
/// store captures the message into an empty [`crate::store::EventSet`]
/// instead of propagating.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unreadable {path}: {message}")]
    Unreadable { path: String, message: String },
    #[error("index document invalid: {0}")]
    InvalidIndex(String),
    #[error("legacy document invalid: {0}")]
    InvalidLegacy(String),
}

impl LoadError {
    pub fn unreadable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            message: message.into(),
        }
    }
}
