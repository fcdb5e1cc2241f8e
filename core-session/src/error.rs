use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Login or registration rejected by the backend. Session state is
    /// unchanged; the message is suitable for direct display.
    #[error("{message}")]
    Authentication { message: String },

    /// Backend-reported, field-scoped validation errors, surfaced verbatim.
    #[error("{message}")]
    Validation {
        message: String,
        fields: HashMap<String, Vec<String>>,
    },

    /// The credential could not be renewed; the store has been cleared and a
    /// hard logout signaled on the event bus.
    #[error("Session expired")]
    SessionExpired,

    /// No response from the server. Never triggers a logout.
    #[error("Network failure: {0}")]
    Network(String),

    /// Durable state store failure.
    #[error("State storage failure: {0}")]
    Storage(String),

    /// A response arrived but could not be interpreted.
    #[error("Unexpected response (HTTP {status}): {message}")]
    UnexpectedResponse { status: u16, message: String },

    /// An identity update attempted to change the session role.
    #[error("Identity update would change role from {current} to {proposed}")]
    RoleChange { current: String, proposed: String },

    /// A payload that should carry an identity could not be decoded.
    #[error("Malformed identity payload: {0}")]
    MalformedPayload(String),
}

impl SessionError {
    /// Whether retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::Network(_) | SessionError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
