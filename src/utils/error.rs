//! Error types for the partial-page engine

use std::time::Duration;
use thiserror::Error;

/// Main error type for partial-page exchanges
#[derive(Debug, Error)]
pub enum AjaxError {
    /// Invalid call or page setup, raised before any network I/O
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Non-2xx status or network failure
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The exchange exceeded its timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Malformed or unexecutable response document
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// An `error` directive sent by the server
    #[error("server error {name}: {message}")]
    Server { name: String, message: String },
    /// DOM patch failure
    #[error(transparent)]
    Dom(#[from] DomError),
    /// Script execution failure
    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Network-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP error with status code
    #[error("HTTP error {0}: {1}")]
    Http(u16, String),
    /// Connection or I/O failure
    #[error("network failure: {0}")]
    Network(String),
    /// Transport ended without delivering a result
    #[error("connection closed before the exchange completed")]
    ConnectionClosed,
    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// The selected transport cannot carry this payload
    #[error("{0} transport cannot send this payload")]
    Unsupported(&'static str),
}

/// Response document failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty response")]
    EmptyResponse,
    #[error("malformed XML: {0}")]
    MalformedXml(String),
    #[error("unexpected root element <{0}>, expected <partial-response>")]
    UnexpectedRoot(String),
    #[error("<{command}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        command: &'static str,
        attribute: &'static str,
    },
    #[error("<{command}> target '{id}' is not in the document")]
    UnknownTarget { command: &'static str, id: String },
    #[error("attributes cannot target '{0}'")]
    IllegalAttributesTarget(String),
    #[error("redirect without url")]
    MissingRedirectUrl,
}

/// DOM patch failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    /// Markup could not be parsed
    #[error("markup parse error: {0}")]
    Parse(String),
    /// Node is not attached to a parent
    #[error("node {0} has no parent")]
    Detached(usize),
    /// Node id does not exist
    #[error("unknown node {0}")]
    UnknownNode(usize),
}

/// Script execution failures
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Script execution error
    #[error("script execution failed: {0}")]
    Execution(String),
}

/// Error classification reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    HttpError,
    EmptyResponse,
    MalformedXml,
    ServerError,
    ClientError,
    Timeout,
}

impl ErrorStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpError => "httpError",
            Self::EmptyResponse => "emptyResponse",
            Self::MalformedXml => "malformedXML",
            Self::ServerError => "serverError",
            Self::ClientError => "clientError",
            Self::Timeout => "timeout",
        }
    }
}

impl AjaxError {
    /// Status reported to error listeners
    pub fn status(&self) -> ErrorStatus {
        match self {
            Self::Configuration(_) | Self::Dom(_) | Self::Script(_) => ErrorStatus::ClientError,
            Self::Transport(_) => ErrorStatus::HttpError,
            Self::Timeout(_) => ErrorStatus::Timeout,
            Self::Protocol(ProtocolError::EmptyResponse) => ErrorStatus::EmptyResponse,
            Self::Protocol(_) => ErrorStatus::MalformedXml,
            Self::Server { .. } => ErrorStatus::ServerError,
        }
    }

    /// Error name reported to listeners
    pub fn name(&self) -> String {
        match self {
            Self::Server { name, .. } => name.clone(),
            Self::Configuration(_) => "ConfigurationError".to_string(),
            Self::Transport(_) => "TransportError".to_string(),
            Self::Timeout(_) => "TimeoutError".to_string(),
            Self::Protocol(_) => "ProtocolError".to_string(),
            Self::Dom(_) => "DomError".to_string(),
            Self::Script(_) => "ScriptError".to_string(),
        }
    }

    /// Error message reported to listeners
    pub fn message(&self) -> String {
        match self {
            Self::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Component that raised the error, used in diagnostics
    pub fn origin(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "AjaxRequest::prepare",
            Self::Transport(_) | Self::Timeout(_) => "Transport::send",
            Self::Protocol(_) | Self::Dom(_) | Self::Script(_) => "ResponseInterpreter::process",
            Self::Server { .. } => "ResponseInterpreter::process_error",
        }
    }
}

/// Convenience Result type for engine operations
pub type Result<T> = std::result::Result<T, AjaxError>;
