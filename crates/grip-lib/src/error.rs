use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Fault taxonomy for browsing and rendering recordings.
///
/// Remote failures abort the operation at hand (the caller may retry);
/// schema and decode failures degrade the affected view only; invalid paths
/// and duplicate ids indicate a stale or inconsistent listing and reset the
/// navigator. Nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum Error {
    /// Listing or download failure in the backing store.
    #[error("store error: {0}")]
    Remote(String),

    /// The downloaded document is not valid JSON.
    #[error("recording decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A field is missing, ragged, non-numeric, or has the wrong shape.
    #[error("field `{field}`: {reason}")]
    Schema { field: String, reason: String },

    /// A navigation path does not resolve against the current tree.
    #[error("no folder `{segment}` under `/{path}`")]
    InvalidPath { path: String, segment: String },

    /// Two listed files share the same id.
    #[error("duplicate file id `{0}`")]
    DuplicateId(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn remote(err: impl std::fmt::Display) -> Self {
        Error::Remote(err.to_string())
    }

    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
