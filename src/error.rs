use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned status {status}: {detail}")]
    Status {
        url: String,
        status: u16,
        detail: String,
    },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("model '{0}' not found. Install it with: ollama pull {0}")]
    ModelNotFound(String),

    #[error("a model is required for the local backend")]
    ModelRequired,

    #[error("{0} returned an empty reply")]
    EmptyReply(String),

    #[error("both requests failed. Local: {local}, Remote: {remote}")]
    BothFailed { local: String, remote: String },

    #[error("{url} rejected the request: {message}")]
    Rejected { url: String, message: String },

    #[error("{backend} does not offer {feature}")]
    Unsupported {
        backend: String,
        feature: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("path '{0}' escapes the project root")]
    EscapesRoot(String),

    #[error("could not inspect '{path}': {message}")]
    Inspect { path: PathBuf, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error(
        "No model selected. Pick one with /models or wait for the model list to load."
    )]
    NoModelSelected,

    #[error("The selected model ({0}) is not available. Choose another model.")]
    ModelUnavailable(String),

    #[error("Edit mode needs an active document. Open one with /open <path>.")]
    NoActiveDocument,

    #[error("/{0} needs an active document. Open one with /open <path>.")]
    NoDocumentFor(&'static str),

    #[error("Agent mode needs a project folder. Open a folder (--root) or a document first.")]
    NoProjectRoot,

    #[error("Backend request failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Failed to update {path}: {message}")]
    DocumentWrite { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("a request is already in flight")]
    Busy,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HOME is not set")]
    NoHome,

    #[error("config io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
