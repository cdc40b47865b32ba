//! Dispatch pipeline: turns a raw HTTP request body into an HTTP reply.
//!
//! This module is the heart of the server role. It runs each incoming
//! document through a fixed sequence of gates — decode, replay check,
//! signature verification, endpoint admission, handler invocation — and
//! maps every failure class to its transport outcome:
//!
//! - schema failure → HTTP 400 with a plain-text reason
//! - replay or signature failure → HTTP 403 with the rejection reason
//! - wrong endpoint / unrecognized message / handler protocol refusal →
//!   an `oadrResponse` envelope with the matching response code over
//!   HTTP 200
//! - handler fault or timeout → HTTP 500, the fault contained to that
//!   one request
//!
//! Handlers are registered by name at startup; unknown names are
//! rejected then, not discovered at dispatch time.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use protocol::codec;
use protocol::error::ProtocolError;
use protocol::messages::{
    CreatedPartyRegistration, EiResponse, Envelope, MessageType, Payload, ResponseCode,
    ResponsePayload, Service,
};
use protocol::replay::ReplayGuard;
use protocol::signature;
use tracing::{debug, error, warn};

use crate::config::{VtnConfig, VtnSigning};

// ============================================================================
// Handler contract
// ============================================================================

/// The dispatchable message kinds a server application can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    QueryRegistration,
    CreatePartyRegistration,
    CancelPartyRegistration,
    Poll,
    CreatedEvent,
    RegisterReport,
    UpdateReport,
}

impl EventTag {
    /// All dispatchable kinds.
    pub const ALL: [EventTag; 7] = [
        EventTag::QueryRegistration,
        EventTag::CreatePartyRegistration,
        EventTag::CancelPartyRegistration,
        EventTag::Poll,
        EventTag::CreatedEvent,
        EventTag::RegisterReport,
        EventTag::UpdateReport,
    ];

    /// The registration-time name of this handler slot.
    pub fn handler_name(&self) -> &'static str {
        match self {
            EventTag::QueryRegistration => "on_query_registration",
            EventTag::CreatePartyRegistration => "on_create_party_registration",
            EventTag::CancelPartyRegistration => "on_cancel_party_registration",
            EventTag::Poll => "on_poll",
            EventTag::CreatedEvent => "on_created_event",
            EventTag::RegisterReport => "on_register_report",
            EventTag::UpdateReport => "on_update_report",
        }
    }

    /// Resolves a registration-time name, if it is a known slot.
    pub fn from_handler_name(name: &str) -> Option<Self> {
        EventTag::ALL.into_iter().find(|t| t.handler_name() == name)
    }

    /// The handler slot responsible for an incoming message type.
    /// `None` for message types that are replies, never requests.
    fn for_message(message_type: MessageType) -> Option<Self> {
        Some(match message_type {
            MessageType::QueryRegistration => EventTag::QueryRegistration,
            MessageType::CreatePartyRegistration => EventTag::CreatePartyRegistration,
            MessageType::CancelPartyRegistration => EventTag::CancelPartyRegistration,
            MessageType::Poll => EventTag::Poll,
            MessageType::CreatedEvent => EventTag::CreatedEvent,
            MessageType::RegisterReport => EventTag::RegisterReport,
            MessageType::UpdateReport => EventTag::UpdateReport,
            _ => return None,
        })
    }
}

/// What a handler asks the server to send back.
#[derive(Debug)]
pub enum HandlerOutcome {
    /// Send this payload as the reply.
    Reply(Payload),
    /// Accept a party registration with the given identities.
    RegistrationAccepted {
        ven_id: String,
        registration_id: String,
    },
    /// Deny a party registration; the reply carries no VEN identity.
    RegistrationDenied,
}

/// How a handler refuses or fails.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A deliberate protocol-level refusal, relayed verbatim to the
    /// peer as its response code.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// An unexpected fault. Logged server-side and mapped to HTTP 500;
    /// never relayed in detail to the peer.
    #[error(transparent)]
    Fault(#[from] anyhow::Error),
}

/// What a handler returns.
pub type HandlerResult = Result<HandlerOutcome, HandlerError>;

/// A registered message handler.
pub type Handler = Arc<dyn Fn(Envelope) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Errors raised while registering handlers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The name matches no handler slot.
    #[error("unknown handler name '{name}'")]
    UnknownName { name: String },

    /// The slot already has a handler.
    #[error("handler '{name}' is already registered")]
    Duplicate { name: String },
}

/// Handler registration table, populated at startup and immutable
/// afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EventTag, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its slot name
    /// (for example `"on_poll"`). Unknown names and duplicate
    /// registrations are rejected here, at startup.
    pub fn add_handler<F, Fut>(&mut self, name: &str, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let tag = EventTag::from_handler_name(name).ok_or_else(|| RegistryError::UnknownName {
            name: name.to_string(),
        })?;
        if self.handlers.contains_key(&tag) {
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
            });
        }
        self.handlers
            .insert(tag, Arc::new(move |envelope| Box::pin(handler(envelope))));
        Ok(())
    }

    /// The handler for a slot, if one is registered.
    pub fn get(&self, tag: EventTag) -> Option<Handler> {
        self.handlers.get(&tag).cloned()
    }

    /// Whether a slot has a handler.
    pub fn has(&self, tag: EventTag) -> bool {
        self.handlers.contains_key(&tag)
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// An HTTP-level reply: status code plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Runs the dispatch pipeline for one service endpoint set.
///
/// Holds the handler registry, the replay guard and the signing
/// configuration; shared across connections behind an `Arc`.
pub struct Dispatcher {
    vtn_id: String,
    signing: Option<VtnSigning>,
    replay: ReplayGuard,
    registry: HandlerRegistry,
    handler_timeout: Duration,
    requested_poll_freq: Duration,
}

impl Dispatcher {
    pub fn new(config: VtnConfig, registry: HandlerRegistry) -> Self {
        Self {
            vtn_id: config.vtn_id,
            signing: config.signing,
            replay: ReplayGuard::with_window(config.replay_window),
            registry,
            handler_timeout: config.handler_timeout,
            requested_poll_freq: config.requested_poll_freq,
        }
    }

    /// Whether a handler slot is filled; used for startup diagnostics.
    pub fn has_handler(&self, tag: EventTag) -> bool {
        self.registry.has(tag)
    }

    /// Processes one request body addressed to `service`.
    ///
    /// Never panics and never returns transport-level failure for a
    /// handler problem; every outcome is an [`HttpReply`].
    pub async fn dispatch(&self, service: Service, body: &str) -> HttpReply {
        let envelope = match codec::decode(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    service = service.path_segment(),
                    error = %e,
                    "rejecting undecodable request"
                );
                return HttpReply {
                    status: 400,
                    body: format!("XML failed validation: {e}"),
                };
            }
        };
        let request_id = envelope.request_id.clone();

        if let Some(signing) = &self.signing {
            let principal = envelope.party_id().unwrap_or("anonymous").to_string();
            let replay = envelope
                .security
                .as_ref()
                .and_then(|s| s.replay_protect.as_ref());
            if let Err(e) = self.replay.check_and_consume(&principal, replay) {
                warn!(
                    service = service.path_segment(),
                    principal,
                    error = %e,
                    "rejecting stale or replayed request"
                );
                return HttpReply {
                    status: 403,
                    body: e.to_string(),
                };
            }
            if let Err(e) = signature::verify(&envelope, &signing.fingerprint_lookup) {
                warn!(
                    service = service.path_segment(),
                    principal,
                    "rejecting request with invalid signature"
                );
                return HttpReply {
                    status: 403,
                    body: e.to_string(),
                };
            }
        }

        let Some(message_type) = envelope.message_type() else {
            debug!(
                service = service.path_segment(),
                "answering unrecognized message element"
            );
            return self.response_reply(&request_id, ResponseCode::NotRecognized);
        };
        if !service.admits(message_type) {
            warn!(
                service = service.path_segment(),
                message = message_type.element_name(),
                "message sent to the wrong endpoint"
            );
            return self.response_reply(&request_id, ResponseCode::WrongEndpoint);
        }
        let Some(tag) = EventTag::for_message(message_type) else {
            // Reply-only message types are admitted by no service, so
            // this arm is only reachable if the admission table drifts.
            return self.response_reply(&request_id, ResponseCode::NotRecognized);
        };

        let Some(handler) = self.registry.get(tag) else {
            return self.missing_handler(tag, &request_id);
        };

        debug!(
            service = service.path_segment(),
            handler = tag.handler_name(),
            request_id,
            "dispatching message"
        );
        let result = match tokio::time::timeout(self.handler_timeout, handler(envelope)).await {
            Ok(result) => result,
            Err(_) => {
                error!(handler = tag.handler_name(), "handler timed out");
                return self.server_error(&request_id);
            }
        };

        match result {
            Ok(outcome) => self.success_reply(&request_id, outcome),
            Err(HandlerError::Protocol(e)) => {
                debug!(
                    handler = tag.handler_name(),
                    error = %e,
                    "handler refused the message"
                );
                self.response_reply(&request_id, e.response_code())
            }
            Err(HandlerError::Fault(e)) => {
                error!(handler = tag.handler_name(), error = %e, "handler failed");
                self.server_error(&request_id)
            }
        }
    }

    fn success_reply(&self, request_id: &str, outcome: HandlerOutcome) -> HttpReply {
        match outcome {
            HandlerOutcome::Reply(payload) => self.reply_with(request_id, 200, payload),
            HandlerOutcome::RegistrationAccepted {
                ven_id,
                registration_id,
            } => self.registration_reply(request_id, Some(ven_id), Some(registration_id)),
            HandlerOutcome::RegistrationDenied => self.registration_reply(request_id, None, None),
        }
    }

    /// A slot without a handler still gets a well-formed answer.
    /// Registration and queries are denied cleanly; polls come back
    /// empty; anything else is a server-side configuration problem.
    fn missing_handler(&self, tag: EventTag, request_id: &str) -> HttpReply {
        match tag {
            EventTag::CreatePartyRegistration => {
                debug!("no registration handler installed, denying registration");
                self.registration_reply(request_id, None, None)
            }
            EventTag::QueryRegistration => self.registration_reply(request_id, None, None),
            EventTag::Poll => self.response_reply(request_id, ResponseCode::Ok),
            _ => {
                warn!(
                    handler = tag.handler_name(),
                    "no handler installed for message"
                );
                self.server_error(request_id)
            }
        }
    }

    fn registration_reply(
        &self,
        request_id: &str,
        ven_id: Option<String>,
        registration_id: Option<String>,
    ) -> HttpReply {
        self.reply_with(
            request_id,
            200,
            Payload::CreatedPartyRegistration(CreatedPartyRegistration {
                response: EiResponse::ok(),
                vtn_id: self.vtn_id.clone(),
                ven_id,
                registration_id,
                requested_poll_freq_secs: Some(self.requested_poll_freq.as_secs()),
            }),
        )
    }

    fn response_reply(&self, request_id: &str, code: ResponseCode) -> HttpReply {
        self.reply_with(
            request_id,
            200,
            Payload::Response(ResponsePayload {
                response: EiResponse::from_code(code),
                ven_id: None,
            }),
        )
    }

    fn server_error(&self, request_id: &str) -> HttpReply {
        self.reply_with(
            request_id,
            500,
            Payload::Response(ResponsePayload {
                response: EiResponse::from_code(ResponseCode::ServerError),
                ven_id: None,
            }),
        )
    }

    /// Builds, signs (when configured) and encodes a reply envelope.
    /// The inbound request ID is echoed so the peer can correlate.
    fn reply_with(&self, request_id: &str, status: u16, payload: Payload) -> HttpReply {
        let mut envelope = Envelope::new(request_id, payload);
        if let Some(signing) = &self.signing {
            if let Err(e) = signature::sign(&mut envelope, &signing.identity) {
                error!(error = %e, "failed to sign response");
                return HttpReply {
                    status: 500,
                    body: String::new(),
                };
            }
        }
        match codec::encode(&envelope) {
            Ok(xml) => HttpReply { status, body: xml },
            Err(e) => {
                error!(error = %e, "failed to encode response");
                HttpReply {
                    status: 500,
                    body: String::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use protocol::messages::{CreatePartyRegistration, Poll, QueryRegistration};
    use protocol::signature::SigningIdentity;

    fn encode_poll(ven_id: &str) -> String {
        let envelope = Envelope::new(
            "req-poll",
            Payload::Poll(Poll {
                ven_id: ven_id.to_string(),
            }),
        );
        codec::encode(&envelope).unwrap()
    }

    fn encode_registration() -> String {
        let envelope = Envelope::new(
            "req-reg",
            Payload::CreatePartyRegistration(CreatePartyRegistration {
                ven_name: "TestVEN".to_string(),
                profile_name: "2.0b".to_string(),
                transport_name: "simpleHttp".to_string(),
                ven_id: None,
            }),
        );
        codec::encode(&envelope).unwrap()
    }

    fn plain_dispatcher(registry: HandlerRegistry) -> Dispatcher {
        Dispatcher::new(VtnConfig::new("VTN_TEST"), registry)
    }

    fn decoded_response_code(reply: &HttpReply) -> ResponseCode {
        let envelope = codec::decode(&reply.body).unwrap();
        match envelope.payload {
            Payload::Response(p) => p.response.code,
            other => panic!("expected oadrResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_schema_failure_maps_to_400() {
        let dispatcher = plain_dispatcher(HandlerRegistry::new());
        let reply = dispatcher
            .dispatch(Service::OadrPoll, "this is not xml")
            .await;
        assert_eq!(reply.status, 400);
        assert!(reply.body.starts_with("XML failed validation"));
    }

    #[tokio::test]
    async fn test_wrong_endpoint_answers_459_over_200() {
        let dispatcher = plain_dispatcher(HandlerRegistry::new());
        let reply = dispatcher
            .dispatch(Service::EiEvent, &encode_poll("ven123"))
            .await;
        assert_eq!(reply.status, 200);
        assert_eq!(decoded_response_code(&reply), ResponseCode::WrongEndpoint);
    }

    #[tokio::test]
    async fn test_unrecognized_message_answers_453() {
        let dispatcher = plain_dispatcher(HandlerRegistry::new());
        let body = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
                    <oadrPayload><oadrSignedObject><oadrFancyMessage>\
                    <requestID>req-x</requestID>\
                    </oadrFancyMessage></oadrSignedObject></oadrPayload>";
        let reply = dispatcher.dispatch(Service::OadrPoll, body).await;
        assert_eq!(reply.status, 200);
        assert_eq!(decoded_response_code(&reply), ResponseCode::NotRecognized);
    }

    #[tokio::test]
    async fn test_protocol_refusal_relayed_verbatim() {
        let mut registry = HandlerRegistry::new();
        registry
            .add_handler("on_poll", |_envelope| async {
                Err(HandlerError::from(ProtocolError::OutOfSequence))
            })
            .unwrap();
        let dispatcher = plain_dispatcher(registry);

        let reply = dispatcher
            .dispatch(Service::OadrPoll, &encode_poll("ven123"))
            .await;
        assert_eq!(reply.status, 200);
        let envelope = codec::decode(&reply.body).unwrap();
        let Payload::Response(p) = envelope.payload else {
            panic!("expected oadrResponse");
        };
        assert_eq!(p.response.code, ResponseCode::OutOfSequence);
        assert_eq!(p.response.description, "OUT OF SEQUENCE");
        assert_eq!(p.response.code.to_string(), "450: OUT OF SEQUENCE");
    }

    #[tokio::test]
    async fn test_handler_fault_contained_to_500() {
        let mut registry = HandlerRegistry::new();
        registry
            .add_handler("on_poll", |_envelope| async {
                Err(HandlerError::from(anyhow!("database exploded")))
            })
            .unwrap();
        let dispatcher = plain_dispatcher(registry);

        let reply = dispatcher
            .dispatch(Service::OadrPoll, &encode_poll("ven123"))
            .await;
        assert_eq!(reply.status, 500);
        assert_eq!(decoded_response_code(&reply), ResponseCode::ServerError);

        // The fault is contained; the next request still works.
        let reply = dispatcher
            .dispatch(Service::OadrPoll, "still not xml")
            .await;
        assert_eq!(reply.status, 400);
    }

    #[tokio::test]
    async fn test_handler_timeout_maps_to_500() {
        let mut registry = HandlerRegistry::new();
        registry
            .add_handler("on_poll", |_envelope| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(HandlerOutcome::Reply(Payload::Response(ResponsePayload {
                    response: EiResponse::ok(),
                    ven_id: None,
                })))
            })
            .unwrap();
        let mut config = VtnConfig::new("VTN_TEST");
        config.handler_timeout = Duration::from_millis(50);
        let dispatcher = Dispatcher::new(config, registry);

        let reply = dispatcher
            .dispatch(Service::OadrPoll, &encode_poll("ven123"))
            .await;
        assert_eq!(reply.status, 500);
    }

    #[tokio::test]
    async fn test_missing_registration_handler_denies_cleanly() {
        let dispatcher = plain_dispatcher(HandlerRegistry::new());
        let reply = dispatcher
            .dispatch(Service::EiRegisterParty, &encode_registration())
            .await;
        assert_eq!(reply.status, 200);

        let envelope = codec::decode(&reply.body).unwrap();
        let Payload::CreatedPartyRegistration(p) = envelope.payload else {
            panic!("expected oadrCreatedPartyRegistration");
        };
        assert_eq!(p.response.code, ResponseCode::Ok);
        assert_eq!(p.ven_id, None);
        assert_eq!(p.registration_id, None);
        assert_eq!(p.vtn_id, "VTN_TEST");
    }

    #[tokio::test]
    async fn test_registration_accepted() {
        let mut registry = HandlerRegistry::new();
        registry
            .add_handler("on_create_party_registration", |_envelope| async {
                Ok(HandlerOutcome::RegistrationAccepted {
                    ven_id: "ven123".to_string(),
                    registration_id: "reg456".to_string(),
                })
            })
            .unwrap();
        let dispatcher = plain_dispatcher(registry);

        let reply = dispatcher
            .dispatch(Service::EiRegisterParty, &encode_registration())
            .await;
        let envelope = codec::decode(&reply.body).unwrap();
        let Payload::CreatedPartyRegistration(p) = envelope.payload else {
            panic!("expected oadrCreatedPartyRegistration");
        };
        assert_eq!(p.ven_id.as_deref(), Some("ven123"));
        assert_eq!(p.registration_id.as_deref(), Some("reg456"));
        assert_eq!(p.requested_poll_freq_secs, Some(10));
        assert_eq!(envelope.request_id, "req-reg");
    }

    #[tokio::test]
    async fn test_missing_poll_handler_answers_empty_ok() {
        let dispatcher = plain_dispatcher(HandlerRegistry::new());
        let reply = dispatcher
            .dispatch(Service::OadrPoll, &encode_poll("ven123"))
            .await;
        assert_eq!(reply.status, 200);
        assert_eq!(decoded_response_code(&reply), ResponseCode::Ok);
    }

    #[tokio::test]
    async fn test_missing_query_handler_denies_cleanly() {
        let envelope = Envelope::new(
            "req-q",
            Payload::QueryRegistration(QueryRegistration { ven_id: None }),
        );
        let dispatcher = plain_dispatcher(HandlerRegistry::new());
        let reply = dispatcher
            .dispatch(Service::EiRegisterParty, &codec::encode(&envelope).unwrap())
            .await;
        assert_eq!(reply.status, 200);
        let decoded = codec::decode(&reply.body).unwrap();
        assert!(matches!(
            decoded.payload,
            Payload::CreatedPartyRegistration(ref p) if p.ven_id.is_none()
        ));
    }

    #[tokio::test]
    async fn test_missing_report_handler_is_a_server_error() {
        let envelope = Envelope::new(
            "req-rr",
            Payload::RegisterReport(protocol::messages::RegisterReport {
                ven_id: "ven123".to_string(),
                reports: Vec::new(),
            }),
        );
        let dispatcher = plain_dispatcher(HandlerRegistry::new());
        let reply = dispatcher
            .dispatch(Service::EiReport, &codec::encode(&envelope).unwrap())
            .await;
        assert_eq!(reply.status, 500);
    }

    #[tokio::test]
    async fn test_signed_mode_rejects_unsigned_request() {
        let identity = SigningIdentity::generate("VTN_TEST");
        let config =
            VtnConfig::new("VTN_TEST").with_signing(identity, Arc::new(|_| None));
        let dispatcher = Dispatcher::new(config, HandlerRegistry::new());

        let reply = dispatcher
            .dispatch(Service::OadrPoll, &encode_poll("ven123"))
            .await;
        assert_eq!(reply.status, 403);
        assert_eq!(
            reply.body,
            "Missing or malformed ReplayProtect element in the message signature."
        );
    }

    #[tokio::test]
    async fn test_signed_mode_rejects_replayed_request() {
        let vtn_identity = SigningIdentity::generate("VTN_TEST");
        let ven_identity = SigningIdentity::generate("ven123");
        let fingerprint = ven_identity.fingerprint();
        let config = VtnConfig::new("VTN_TEST")
            .with_signing(vtn_identity, Arc::new(move |_| Some(fingerprint.clone())));
        let dispatcher = Dispatcher::new(config, HandlerRegistry::new());

        let mut envelope = Envelope::new(
            "req-poll",
            Payload::Poll(Poll {
                ven_id: "ven123".to_string(),
            }),
        );
        signature::sign(&mut envelope, &ven_identity).unwrap();
        let body = codec::encode(&envelope).unwrap();

        let first = dispatcher.dispatch(Service::OadrPoll, &body).await;
        assert_eq!(first.status, 200);

        let second = dispatcher.dispatch(Service::OadrPoll, &body).await;
        assert_eq!(second.status, 403);
        assert_eq!(
            second.body,
            "This combination of timestamp and nonce was already used."
        );
    }

    #[tokio::test]
    async fn test_signed_mode_rejects_unknown_signer() {
        let vtn_identity = SigningIdentity::generate("VTN_TEST");
        let ven_identity = SigningIdentity::generate("ven123");
        // Trust source knows a different certificate.
        let other = SigningIdentity::generate("ven123").fingerprint();
        let config = VtnConfig::new("VTN_TEST")
            .with_signing(vtn_identity, Arc::new(move |_| Some(other.clone())));
        let dispatcher = Dispatcher::new(config, HandlerRegistry::new());

        let mut envelope = Envelope::new(
            "req-poll",
            Payload::Poll(Poll {
                ven_id: "ven123".to_string(),
            }),
        );
        signature::sign(&mut envelope, &ven_identity).unwrap();
        let body = codec::encode(&envelope).unwrap();

        let reply = dispatcher.dispatch(Service::OadrPoll, &body).await;
        assert_eq!(reply.status, 403);
        assert_eq!(reply.body, "Invalid Signature");
    }

    #[tokio::test]
    async fn test_signed_mode_signs_responses() {
        let vtn_identity = SigningIdentity::generate("VTN_TEST");
        let ven_identity = SigningIdentity::generate("ven123");
        let fingerprint = ven_identity.fingerprint();
        let config = VtnConfig::new("VTN_TEST")
            .with_signing(vtn_identity, Arc::new(move |_| Some(fingerprint.clone())));
        let dispatcher = Dispatcher::new(config, HandlerRegistry::new());

        let mut envelope = Envelope::new(
            "req-poll",
            Payload::Poll(Poll {
                ven_id: "ven123".to_string(),
            }),
        );
        signature::sign(&mut envelope, &ven_identity).unwrap();
        let body = codec::encode(&envelope).unwrap();

        let reply = dispatcher.dispatch(Service::OadrPoll, &body).await;
        let response = codec::decode(&reply.body).unwrap();
        let security = response.security.as_ref().unwrap();
        assert!(security.digest.is_some());
        assert!(security.signature.is_some());
        assert!(security.certificate.is_some());
        assert!(security.replay_protect.is_some());
    }

    #[test]
    fn test_registry_rejects_unknown_name() {
        let mut registry = HandlerRegistry::new();
        let err = registry
            .add_handler("on_coffee_break", |_envelope| async {
                Ok(HandlerOutcome::RegistrationDenied)
            })
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownName {
                name: "on_coffee_break".to_string()
            }
        );
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = HandlerRegistry::new();
        registry
            .add_handler("on_poll", |_envelope| async {
                Ok(HandlerOutcome::RegistrationDenied)
            })
            .unwrap();
        let err = registry
            .add_handler("on_poll", |_envelope| async {
                Ok(HandlerOutcome::RegistrationDenied)
            })
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
    }

    #[test]
    fn test_handler_names_roundtrip() {
        for tag in EventTag::ALL {
            assert_eq!(EventTag::from_handler_name(tag.handler_name()), Some(tag));
        }
        assert_eq!(EventTag::from_handler_name("on_unknown"), None);
    }
}
