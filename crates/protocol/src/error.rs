//! Error types for the protocol crate.
//!
//! Each failure class carries its own type so callers can map it to the
//! correct transport outcome: schema and security failures are always
//! local rejects, validation failures carry a specific human-readable
//! reason, and protocol errors relay a response code to the peer.

use thiserror::Error;

use crate::messages::ResponseCode;

/// A structural violation of the protocol schema.
///
/// Decoding rejects documents that do not conform to the envelope schema
/// even when they are well-formed XML. The variant names the violated
/// rule so the transport layer can report it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The document is not well-formed XML at all.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// A required element is absent.
    #[error("missing required element '{element}'")]
    MissingElement {
        /// Local name of the missing element.
        element: String,
    },

    /// An element is present but not in its mandated position.
    #[error("element '{element}' out of order")]
    ElementOrder {
        /// Local name of the misplaced element.
        element: String,
    },

    /// An element appears where the schema does not allow it.
    #[error("unexpected element '{element}'")]
    UnexpectedElement {
        /// Local name of the offending element.
        element: String,
    },

    /// An element's text content does not parse as the required type.
    #[error("invalid value '{value}' for element '{element}'")]
    InvalidValue {
        /// Local name of the element.
        element: String,
        /// The offending text content.
        value: String,
    },
}

impl From<quick_xml::Error> for SchemaError {
    fn from(err: quick_xml::Error) -> Self {
        SchemaError::Malformed(err.to_string())
    }
}

/// Signature or fingerprint verification failure.
///
/// The display text is deliberately uniform: callers (and peers) are not
/// told whether the digest, the signature value or the fingerprint check
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid Signature")]
pub struct SecurityError;

/// Replay-protection violation.
///
/// The display strings are part of the protocol surface: they are sent
/// back to the peer verbatim, so they must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The ReplayProtect block is absent or its timestamp is unusable.
    #[error("Missing or malformed ReplayProtect element in the message signature.")]
    MalformedReplayProtect,

    /// The ReplayProtect block carries no nonce.
    #[error("Missing 'nonce' element in ReplayProtect in incoming message.")]
    MissingNonce,

    /// The signing timestamp is older than the replay window.
    #[error("The message was signed too long ago.")]
    SignedTooLongAgo,

    /// The (timestamp, nonce) pair was already consumed for this principal.
    #[error("This combination of timestamp and nonce was already used.")]
    NonceAlreadyUsed,
}

/// A recognized, application-level protocol error.
///
/// Handlers return these to signal a business-rule violation; the
/// dispatcher maps each variant to its response code and relays it to
/// the peer verbatim. This set is closed on purpose: anything else a
/// handler produces is an unrecognized fault and is mapped to a generic
/// server error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The message arrived when the peer's state machine did not expect it.
    #[error("out of sequence")]
    OutOfSequence,

    /// The requested operation is not allowed for this party.
    #[error("not allowed")]
    NotAllowed,

    /// An identifier in the message is unknown to the receiver.
    #[error("invalid id")]
    InvalidId,

    /// The message type or content is not recognized.
    #[error("not recognized")]
    NotRecognized,

    /// The message content is structurally fine but semantically invalid.
    #[error("invalid data")]
    InvalidData,
}

impl ProtocolError {
    /// The response code relayed to the peer for this error.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            ProtocolError::OutOfSequence => ResponseCode::OutOfSequence,
            ProtocolError::NotAllowed => ResponseCode::NotAllowed,
            ProtocolError::InvalidId => ResponseCode::InvalidId,
            ProtocolError::NotRecognized => ResponseCode::NotRecognized,
            ProtocolError::InvalidData => ResponseCode::InvalidData,
        }
    }
}
