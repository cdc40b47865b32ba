//! # GridWire Protocol Library
//!
//! This crate provides the OpenADR 2.0b message layer for the GridWire
//! demand-response system.
//!
//! ## Overview
//!
//! The protocol crate is the foundation of GridWire's communication
//! layer, providing:
//!
//! - **Message Definitions**: Registration, event, report, poll and
//!   response payloads with their envelope
//! - **XML Codec**: Deterministic encoding and schema-checked decoding
//!   of `oadrPayload` documents
//! - **Digital Signatures**: Ed25519 signing and verification with
//!   compact certificates and fingerprint pinning
//! - **Replay Protection**: Per-principal freshness and nonce tracking
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Application Payloads            │  typed message structs
//! ├─────────────────────────────────────────┤
//! │        Envelope + Signature             │  Ed25519 + ReplayProtect
//! ├─────────────────────────────────────────┤
//! │            XML Codec                    │  oadrPayload documents
//! ├─────────────────────────────────────────┤
//! │          Transport (HTTP)               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{codec, signature, Envelope, Payload, SigningIdentity};
//! use protocol::messages::Poll;
//!
//! // Generate a signing identity
//! let identity = SigningIdentity::generate("ven123");
//! println!("Fingerprint: {}", identity.fingerprint());
//!
//! // Build and sign a poll message
//! let mut envelope = Envelope::new(
//!     Envelope::generate_request_id(),
//!     Payload::Poll(Poll { ven_id: "ven123".to_string() }),
//! );
//! signature::sign(&mut envelope, &identity).unwrap();
//!
//! // Serialize to XML for transport
//! let xml = codec::encode(&envelope).unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Envelope and payload definitions
//! - [`codec`]: XML encoding and decoding
//! - [`signature`]: Identities, certificates, sign and verify
//! - [`replay`]: Replay-protection guard
//! - [`error`]: Error types

pub mod codec;
pub mod error;
pub mod messages;
pub mod replay;
pub mod signature;

pub use error::{ProtocolError, SchemaError, SecurityError, ValidationError};
pub use messages::{
    Envelope, MessageType, Payload, ReplayProtect, ResponseCode, SecurityBlock, Service,
    SERVICE_PREFIX,
};
pub use replay::{ReplayGuard, DEFAULT_REPLAY_WINDOW};
pub use signature::{Certificate, FingerprintLookup, SigningIdentity};
