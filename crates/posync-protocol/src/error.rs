//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the problem is in the bytes or the text,
//! never in networking or session state.

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The input does not follow the wire grammar: unknown header, wrong
    /// field count or tuple arity, a number that doesn't parse, a
    /// non-finite float, or bytes that aren't valid text.
    ///
    /// Never fatal. The receiver logs it and drops the message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The message can't be written without breaking the grammar, e.g. a
    /// name containing `|` or `%`, or a NaN coordinate.
    #[error("unencodable message: {0}")]
    Unencodable(String),
}

impl ProtocolError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage(reason.into())
    }

    pub(crate) fn unencodable(reason: impl Into<String>) -> Self {
        Self::Unencodable(reason.into())
    }
}
