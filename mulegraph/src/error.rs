// mulegraph/src/error.rs
//
// Fault taxonomy. Every fault is recovered at the boundary that detects it;
// none of them ends the session.
//
//   InputError    : file rejected before any network call
//   ServiceError  : analysis / sample request failed, no partial result applied
//   GraphError    : graph_data is internally inconsistent (dangling edge)
//   ExportError   : rendering or encoding step failed, data stays exportable
//   SessionError  : stale run generation, unknown focus target, no result loaded

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Generic fallbacks used when the service gives no message of its own.
pub const GENERIC_ANALYSIS_FAILURE: &str = "Analysis failed";
pub const GENERIC_SAMPLE_FAILURE:   &str = "Could not load sample dataset.";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("invalid file {name:?}: upload a .csv file")]
    NotCsv { name: String },

    #[error("no file selected")]
    NoFile,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Non-success status. `message` is the server's `{error}` payload when it
    /// sent one, otherwise the generic fallback for the request kind.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("{context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source:  reqwest::Error,
    },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("sample dataset could not be re-encoded: {0}")]
    Encode(#[from] csv::Error),
}

impl ServiceError {
    /// Message suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } => message.clone(),
            Self::Transport { context, .. } => (*context).to_string(),
            Self::Decode(_) => GENERIC_ANALYSIS_FAILURE.to_string(),
            Self::Encode(_) => GENERIC_SAMPLE_FAILURE.to_string(),
        }
    }
}

/// Which end of an edge failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("edge #{edge} {endpoint} references unknown account {account_id:?}")]
    DanglingEdge {
        edge:       usize,
        endpoint:   Endpoint,
        account_id: String,
    },

    #[error("duplicate node id {0:?} in graph_data")]
    DuplicateNode(String),

    #[error("unknown node {0:?}")]
    UnknownNode(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("svg parse failed: {0}")]
    Svg(String),

    #[error("pixmap allocation failed for {width}x{height}")]
    Pixmap { width: u32, height: u32 },

    #[error("png encoding failed: {0}")]
    Png(#[from] png::EncodingError),

    #[error("pdf generation failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("response for run {got} discarded, current run is {current}")]
    StaleRun { got: u64, current: u64 },

    #[error("run analysis first")]
    NoResult,

    #[error("unknown ring {0:?}")]
    UnknownRing(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
