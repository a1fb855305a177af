use crate::channel::ChannelError;
use crate::compose::UnresolvedTransformError;
use crate::graph::validate::SchemaErrors;

/// Convenience result type used across the crate.
pub type PoseGraphResult<T> = Result<T, PoseGraphError>;

/// Top-level error taxonomy used by public APIs.
#[derive(thiserror::Error, Debug)]
pub enum PoseGraphError {
    /// A snapshot failed schema validation; nothing was applied.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaErrors),

    /// A requested element has no solved pose at the requested frame.
    #[error(transparent)]
    Unresolved(#[from] UnresolvedTransformError),

    /// Transport-level failure of the update channel.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Invalid viewer configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid input to the synthetic graph generator.
    #[error("synthetic graph error: {0}")]
    Synthetic(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PoseGraphError {
    /// Build a [`PoseGraphError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`PoseGraphError::Synthetic`] value.
    pub fn synthetic(msg: impl Into<String>) -> Self {
        Self::Synthetic(msg.into())
    }

    /// Build a [`PoseGraphError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
