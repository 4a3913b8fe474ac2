//! Error handling for meshflow
//!
//! Every error carries an [`ErrorKind`]. Configuration mistakes made while
//! wiring a pipeline are `Fatal`; problems with the data of one domain are
//! `Recoverable`, which is what lets the time loop skip a bad timestep and
//! keep going.

use crate::data::DataObjectType;
use crate::types::DomainId;
use thiserror::Error;

/// Whether an error aborts everything or only the current execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programming or wiring mistake. Never retried.
    Fatal,
    /// Bad data for one execution. Drivers above a single `update` may continue.
    Recoverable,
}

/// Main error type for meshflow operations
#[derive(Error, Debug)]
pub enum FlowError {
    /// A sink was wired to an upstream node producing the wrong object type
    #[error("Type mismatch: {sink} expects {expected:?} input, got {actual:?}")]
    TypeMismatch {
        sink: String,
        expected: DataObjectType,
        actual: DataObjectType,
    },

    /// Errors in pipeline construction or missing contract fields
    #[error("Configuration error: {0}")]
    Config(String),

    /// A SIL restriction was widened or referenced unknown domains
    #[error("Restriction error: {0}")]
    Restriction(String),

    /// Malformed data for a specific domain
    #[error("Data error in domain {domain}: {message}")]
    DomainData { domain: DomainId, message: String },

    /// Malformed data or a reader failure
    #[error("Data error: {0}")]
    Data(String),

    /// Every timestep of a time loop failed
    #[error("All {count} timesteps were skipped: {messages}")]
    AllTimestepsSkipped { count: usize, messages: String },

    /// Image compositing failures
    #[error("Compositing error: {0}")]
    Composite(String),

    /// An expected sub-image never arrived
    #[error("Missing sub-image: expected {expected}, received {received}")]
    MissingSubImage { expected: usize, received: usize },

    /// Errors exchanging messages between ranks
    #[error("Communication error: {0}")]
    Communication(String),

    /// Malformed or truncated message buffers
    #[error("Wire format error: {0}")]
    Wire(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FlowError>,
    },
}

impl FlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error. Context wrappers report the kind of what they wrap.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::DomainData { .. } | FlowError::Data(_) => ErrorKind::Recoverable,
            FlowError::WithContext { source, .. } => source.kind(),
            _ => ErrorKind::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Recoverable
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Shorthand for a data error attributed to one domain.
    pub fn domain(domain: DomainId, message: impl Into<String>) -> Self {
        FlowError::DomainData {
            domain,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Serialization(err.to_string())
    }
}

/// Result type alias for meshflow operations
pub type FlowResult<T> = std::result::Result<T, FlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> FlowResult<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> FlowResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for FlowResult<T> {
    fn context(self, context: impl Into<String>) -> FlowResult<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> FlowResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
