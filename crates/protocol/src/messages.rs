//! Protocol message definitions for GridWire.
//!
//! This module defines the envelope model exchanged between the VTN
//! (server role) and VENs (client role): the closed set of message
//! types, the per-type payload bodies, response codes and the
//! well-known service endpoints. The XML wire representation lives in
//! [`crate::codec`]; the types here are plain data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// XML namespace of the oadr payload vocabulary.
pub const OADR_XMLNS: &str = "http://openadr.org/oadr-2.0b/2012/07";
/// XML namespace of the payloads vocabulary (`pyld:` prefix).
pub const PYLD_XMLNS: &str = "http://docs.oasis-open.org/ns/energyinterop/201110/payloads";
/// XML namespace of the energy-interop vocabulary (`ei:` prefix).
pub const EI_XMLNS: &str = "http://docs.oasis-open.org/ns/energyinterop/201110";
/// XML namespace of XML digital signatures (`ds:` prefix).
pub const DS_XMLNS: &str = "http://www.w3.org/2000/09/xmldsig#";
/// XML namespace of the ReplayProtect extension (`dsp:` prefix).
pub const DSP_XMLNS: &str = "http://openadr.org/oadr/ReplayProtect";

/// The closed set of protocol message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Query the VTN for its registration profile.
    QueryRegistration,
    /// Register a VEN with the VTN.
    CreatePartyRegistration,
    /// VTN reply to a registration query or request.
    CreatedPartyRegistration,
    /// Cancel an existing registration.
    CancelPartyRegistration,
    /// VTN reply to a registration cancel.
    CanceledPartyRegistration,
    /// VEN poll for pending VTN messages.
    Poll,
    /// VTN distributes demand-response events.
    DistributeEvent,
    /// VEN opt responses to distributed events.
    CreatedEvent,
    /// VEN announces the reports it can deliver.
    RegisterReport,
    /// VTN reply selecting which reports it wants.
    RegisteredReport,
    /// VEN delivers report data.
    UpdateReport,
    /// VTN reply to a report update.
    UpdatedReport,
    /// Generic response envelope.
    Response,
}

impl MessageType {
    /// The wire element name of this message type.
    pub fn element_name(&self) -> &'static str {
        match self {
            MessageType::QueryRegistration => "oadrQueryRegistration",
            MessageType::CreatePartyRegistration => "oadrCreatePartyRegistration",
            MessageType::CreatedPartyRegistration => "oadrCreatedPartyRegistration",
            MessageType::CancelPartyRegistration => "oadrCancelPartyRegistration",
            MessageType::CanceledPartyRegistration => "oadrCanceledPartyRegistration",
            MessageType::Poll => "oadrPoll",
            MessageType::DistributeEvent => "oadrDistributeEvent",
            MessageType::CreatedEvent => "oadrCreatedEvent",
            MessageType::RegisterReport => "oadrRegisterReport",
            MessageType::RegisteredReport => "oadrRegisteredReport",
            MessageType::UpdateReport => "oadrUpdateReport",
            MessageType::UpdatedReport => "oadrUpdatedReport",
            MessageType::Response => "oadrResponse",
        }
    }

    /// Resolves a wire element name to a message type, if known.
    pub fn from_element_name(name: &str) -> Option<Self> {
        Some(match name {
            "oadrQueryRegistration" => MessageType::QueryRegistration,
            "oadrCreatePartyRegistration" => MessageType::CreatePartyRegistration,
            "oadrCreatedPartyRegistration" => MessageType::CreatedPartyRegistration,
            "oadrCancelPartyRegistration" => MessageType::CancelPartyRegistration,
            "oadrCanceledPartyRegistration" => MessageType::CanceledPartyRegistration,
            "oadrPoll" => MessageType::Poll,
            "oadrDistributeEvent" => MessageType::DistributeEvent,
            "oadrCreatedEvent" => MessageType::CreatedEvent,
            "oadrRegisterReport" => MessageType::RegisterReport,
            "oadrRegisteredReport" => MessageType::RegisteredReport,
            "oadrUpdateReport" => MessageType::UpdateReport,
            "oadrUpdatedReport" => MessageType::UpdatedReport,
            "oadrResponse" => MessageType::Response,
            _ => return None,
        })
    }

    /// Whether this message type leads with an `eiResponse` block instead
    /// of a bare `requestID`.
    pub fn is_response_structured(&self) -> bool {
        matches!(
            self,
            MessageType::CreatedPartyRegistration
                | MessageType::CanceledPartyRegistration
                | MessageType::CreatedEvent
                | MessageType::RegisteredReport
                | MessageType::UpdatedReport
                | MessageType::Response
        )
    }
}

/// The closed set of protocol response codes.
///
/// Response codes are produced by the dispatch layer, never fabricated
/// by application handlers directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// 200: the request was handled successfully.
    Ok,
    /// 450: the message arrived out of sequence.
    OutOfSequence,
    /// 451: the operation is not allowed.
    NotAllowed,
    /// 452: an identifier in the message is unknown.
    InvalidId,
    /// 453: the message type is not recognized.
    NotRecognized,
    /// 454: the message content is invalid.
    InvalidData,
    /// 459: the message was sent to the wrong service endpoint.
    WrongEndpoint,
    /// 500: an internal error occurred while handling the request.
    ServerError,
}

impl ResponseCode {
    /// The numeric wire value of this code.
    pub fn code(&self) -> u16 {
        match self {
            ResponseCode::Ok => 200,
            ResponseCode::OutOfSequence => 450,
            ResponseCode::NotAllowed => 451,
            ResponseCode::InvalidId => 452,
            ResponseCode::NotRecognized => 453,
            ResponseCode::InvalidData => 454,
            ResponseCode::WrongEndpoint => 459,
            ResponseCode::ServerError => 500,
        }
    }

    /// The human-readable description paired with this code.
    pub fn description(&self) -> &'static str {
        match self {
            ResponseCode::Ok => "OK",
            ResponseCode::OutOfSequence => "OUT OF SEQUENCE",
            ResponseCode::NotAllowed => "NOT ALLOWED",
            ResponseCode::InvalidId => "INVALID ID",
            ResponseCode::NotRecognized => "NOT RECOGNIZED",
            ResponseCode::InvalidData => "INVALID DATA",
            ResponseCode::WrongEndpoint => "WRONG ENDPOINT",
            ResponseCode::ServerError => "SERVER ERROR",
        }
    }

    /// Resolves a numeric wire value to a response code, if known.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            200 => ResponseCode::Ok,
            450 => ResponseCode::OutOfSequence,
            451 => ResponseCode::NotAllowed,
            452 => ResponseCode::InvalidId,
            453 => ResponseCode::NotRecognized,
            454 => ResponseCode::InvalidData,
            459 => ResponseCode::WrongEndpoint,
            500 => ResponseCode::ServerError,
            _ => return None,
        })
    }

    /// Whether this code signals success.
    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseCode::Ok)
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}

/// The well-known service endpoints a VTN exposes.
///
/// Each service admits a fixed set of request types; a request posted
/// to the wrong service is answered with code 459 (WRONG ENDPOINT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Registration lifecycle.
    EiRegisterParty,
    /// Event opt responses.
    EiEvent,
    /// Report registration and delivery.
    EiReport,
    /// VEN polling.
    OadrPoll,
}

impl Service {
    /// The URL path segment of this service under the well-known prefix.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Service::EiRegisterParty => "EiRegisterParty",
            Service::EiEvent => "EiEvent",
            Service::EiReport => "EiReport",
            Service::OadrPoll => "OadrPoll",
        }
    }

    /// Resolves a URL path segment to a service, if known.
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Some(match segment {
            "EiRegisterParty" => Service::EiRegisterParty,
            "EiEvent" => Service::EiEvent,
            "EiReport" => Service::EiReport,
            "OadrPoll" => Service::OadrPoll,
            _ => return None,
        })
    }

    /// Whether this service accepts the given request type.
    pub fn admits(&self, message_type: MessageType) -> bool {
        match self {
            Service::EiRegisterParty => matches!(
                message_type,
                MessageType::QueryRegistration
                    | MessageType::CreatePartyRegistration
                    | MessageType::CancelPartyRegistration
            ),
            Service::EiEvent => matches!(message_type, MessageType::CreatedEvent),
            Service::EiReport => matches!(
                message_type,
                MessageType::RegisterReport | MessageType::UpdateReport
            ),
            Service::OadrPoll => matches!(message_type, MessageType::Poll),
        }
    }
}

/// The well-known URL prefix under which all services are served.
pub const SERVICE_PREFIX: &str = "OpenADR2/Simple/2.0b";

// ============================================================================
// Security block
// ============================================================================

/// Replay-protection data embedded in a message signature.
///
/// Fields are optional because incoming documents may carry a partial
/// block; the replay guard turns each gap into its specific rejection
/// reason rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplayProtect {
    /// When the message was signed.
    pub timestamp: Option<DateTime<Utc>>,
    /// Random single-use token, hex encoded.
    pub nonce: Option<String>,
}

/// The signature block of an envelope.
///
/// All fields are kept as their wire (base64) form; interpretation and
/// verification happen in [`crate::signature`]. Optional fields mirror
/// what an incoming document may omit; a missing piece fails
/// verification, it does not fail decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityBlock {
    /// Base64 SHA-256 digest of the canonical signed object.
    pub digest: Option<String>,
    /// Base64 Ed25519 signature over the SignedInfo block.
    pub signature: Option<String>,
    /// Base64 certificate of the signer.
    pub certificate: Option<String>,
    /// Replay-protection data covered by the signature.
    pub replay_protect: Option<ReplayProtect>,
}

// ============================================================================
// Envelope
// ============================================================================

/// The structured message unit exchanged between roles.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Request identifier, caller supplied or generated.
    pub request_id: String,
    /// The message body.
    pub payload: Payload,
    /// Signature and replay-protection data, when the message is signed.
    pub security: Option<SecurityBlock>,
}

impl Envelope {
    /// Creates an unsigned envelope.
    pub fn new(request_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            request_id: request_id.into(),
            payload,
            security: None,
        }
    }

    /// Generates an opaque request identifier.
    pub fn generate_request_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// The message type of the payload, or `None` for unrecognized
    /// message elements.
    pub fn message_type(&self) -> Option<MessageType> {
        self.payload.message_type()
    }

    /// The trust principal (VEN identity) named by the payload, if any.
    pub fn party_id(&self) -> Option<&str> {
        self.payload.party_id()
    }
}

/// A per-type message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `oadrQueryRegistration`
    QueryRegistration(QueryRegistration),
    /// `oadrCreatePartyRegistration`
    CreatePartyRegistration(CreatePartyRegistration),
    /// `oadrCreatedPartyRegistration`
    CreatedPartyRegistration(CreatedPartyRegistration),
    /// `oadrCancelPartyRegistration`
    CancelPartyRegistration(CancelPartyRegistration),
    /// `oadrCanceledPartyRegistration`
    CanceledPartyRegistration(CanceledPartyRegistration),
    /// `oadrPoll`
    Poll(Poll),
    /// `oadrDistributeEvent`
    DistributeEvent(DistributeEvent),
    /// `oadrCreatedEvent`
    CreatedEvent(CreatedEvent),
    /// `oadrRegisterReport`
    RegisterReport(RegisterReport),
    /// `oadrRegisteredReport`
    RegisteredReport(RegisteredReport),
    /// `oadrUpdateReport`
    UpdateReport(UpdateReport),
    /// `oadrUpdatedReport`
    UpdatedReport(UpdatedReport),
    /// `oadrResponse`
    Response(ResponsePayload),
    /// A well-formed message element the schema does not know.
    ///
    /// Decoding never fails on these; the dispatch layer answers with a
    /// standardized NOT RECOGNIZED response instead of dropping the
    /// connection.
    Unrecognized {
        /// The unknown element's local name.
        element: String,
    },
}

impl Payload {
    /// The message type of this payload, `None` for unrecognized elements.
    pub fn message_type(&self) -> Option<MessageType> {
        Some(match self {
            Payload::QueryRegistration(_) => MessageType::QueryRegistration,
            Payload::CreatePartyRegistration(_) => MessageType::CreatePartyRegistration,
            Payload::CreatedPartyRegistration(_) => MessageType::CreatedPartyRegistration,
            Payload::CancelPartyRegistration(_) => MessageType::CancelPartyRegistration,
            Payload::CanceledPartyRegistration(_) => MessageType::CanceledPartyRegistration,
            Payload::Poll(_) => MessageType::Poll,
            Payload::DistributeEvent(_) => MessageType::DistributeEvent,
            Payload::CreatedEvent(_) => MessageType::CreatedEvent,
            Payload::RegisterReport(_) => MessageType::RegisterReport,
            Payload::RegisteredReport(_) => MessageType::RegisteredReport,
            Payload::UpdateReport(_) => MessageType::UpdateReport,
            Payload::UpdatedReport(_) => MessageType::UpdatedReport,
            Payload::Response(_) => MessageType::Response,
            Payload::Unrecognized { .. } => return None,
        })
    }

    /// The VEN identity named by this payload, if any.
    pub fn party_id(&self) -> Option<&str> {
        match self {
            Payload::QueryRegistration(p) => p.ven_id.as_deref(),
            Payload::CreatePartyRegistration(p) => p.ven_id.as_deref(),
            Payload::CreatedPartyRegistration(p) => p.ven_id.as_deref(),
            Payload::CancelPartyRegistration(p) => Some(&p.ven_id),
            Payload::CanceledPartyRegistration(p) => p.ven_id.as_deref(),
            Payload::Poll(p) => Some(&p.ven_id),
            Payload::DistributeEvent(_) => None,
            Payload::CreatedEvent(p) => Some(&p.ven_id),
            Payload::RegisterReport(p) => Some(&p.ven_id),
            Payload::RegisteredReport(p) => p.ven_id.as_deref(),
            Payload::UpdateReport(p) => Some(&p.ven_id),
            Payload::UpdatedReport(p) => p.ven_id.as_deref(),
            Payload::Response(p) => p.ven_id.as_deref(),
            Payload::Unrecognized { .. } => None,
        }
    }
}

// ============================================================================
// Registration messages
// ============================================================================

/// Query the VTN's registration profile without registering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryRegistration {
    /// VEN identity, when already registered.
    pub ven_id: Option<String>,
}

/// Register a VEN with the VTN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePartyRegistration {
    /// Human-readable VEN name.
    pub ven_name: String,
    /// Protocol profile the VEN speaks.
    pub profile_name: String,
    /// Transport the VEN wants to use.
    pub transport_name: String,
    /// VEN identity, when re-registering.
    pub ven_id: Option<String>,
}

/// VTN reply to a registration query or request.
///
/// A reply without a `ven_id` tells the peer the registration was
/// denied; the VEN must abort its registration flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPartyRegistration {
    /// Outcome of the registration request.
    pub response: EiResponse,
    /// Identity of the answering VTN.
    pub vtn_id: String,
    /// Assigned VEN identity, absent when registration is denied.
    pub ven_id: Option<String>,
    /// Assigned registration identity, absent when denied.
    pub registration_id: Option<String>,
    /// Poll cadence the VTN asks the VEN to use, in seconds.
    pub requested_poll_freq_secs: Option<u64>,
}

/// Cancel an existing registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelPartyRegistration {
    /// The registration to cancel.
    pub registration_id: String,
    /// VEN identity.
    pub ven_id: String,
}

/// VTN reply to a registration cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanceledPartyRegistration {
    /// Outcome of the cancel request.
    pub response: EiResponse,
    /// VEN identity the cancel applied to.
    pub ven_id: Option<String>,
}

// ============================================================================
// Poll and event messages
// ============================================================================

/// VEN poll for pending VTN messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    /// VEN identity.
    pub ven_id: String,
}

/// VTN distributes demand-response events.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributeEvent {
    /// Identity of the sending VTN.
    pub vtn_id: String,
    /// The distributed events.
    pub events: Vec<EventDescriptor>,
}

/// A single demand-response event.
///
/// Event business semantics are the hosting application's concern; the
/// engine only carries the envelope-level fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDescriptor {
    /// Event identity.
    pub event_id: String,
    /// Bumped by the VTN whenever the event changes.
    pub modification_number: u32,
    /// When the event becomes active.
    pub start_time: DateTime<Utc>,
    /// Active duration in seconds.
    pub duration_secs: u64,
    /// Name of the signal the event carries.
    pub signal_name: String,
    /// Current signal value.
    pub current_value: f64,
}

/// VEN opt decision for a distributed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptType {
    /// The VEN will participate.
    OptIn,
    /// The VEN declines.
    OptOut,
}

impl OptType {
    /// The wire text of this opt decision.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptType::OptIn => "optIn",
            OptType::OptOut => "optOut",
        }
    }

    /// Resolves wire text to an opt decision, if known.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "optIn" => Some(OptType::OptIn),
            "optOut" => Some(OptType::OptOut),
            _ => None,
        }
    }
}

/// VEN opt responses to distributed events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    /// Outcome of processing the event distribution.
    pub response: EiResponse,
    /// VEN identity.
    pub ven_id: String,
    /// One response per distributed event.
    pub event_responses: Vec<EventResponse>,
}

/// Per-event opt response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventResponse {
    /// Outcome for this event.
    pub code: ResponseCode,
    /// The event this response refers to.
    pub event_id: String,
    /// The VEN's opt decision.
    pub opt_type: OptType,
}

// ============================================================================
// Report messages
// ============================================================================

/// VEN announces the reports it can deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterReport {
    /// VEN identity.
    pub ven_id: String,
    /// Available reports.
    pub reports: Vec<ReportDescriptor>,
}

/// Description of a report a VEN can deliver.
///
/// Serde-derived so the hosting application can persist selected
/// reports in its own job store; the engine itself never stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDescriptor {
    /// Human-readable report name.
    pub report_name: String,
    /// Stable identity of the report specification.
    pub report_specifier_id: String,
    /// Requested delivery cadence in seconds.
    pub report_back_duration_secs: u64,
    /// Resource identifiers covered by the report.
    pub r_ids: Vec<String>,
}

/// VTN reply selecting which announced reports it wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredReport {
    /// Outcome of the report registration.
    pub response: EiResponse,
    /// VEN identity.
    pub ven_id: Option<String>,
    /// The report subscriptions the VTN created.
    pub report_requests: Vec<ReportRequest>,
}

/// A report subscription created by the VTN.
///
/// Serde-derived for the same reason as [`ReportDescriptor`]: these
/// records cross the scheduling bridge into an external job store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Identity of this subscription.
    pub report_request_id: String,
    /// The report specification being subscribed to.
    pub report_specifier_id: String,
}

/// VEN delivers report data for a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    /// VEN identity.
    pub ven_id: String,
    /// The subscription this data belongs to.
    pub report_request_id: String,
    /// Data points, one per resource.
    pub payloads: Vec<ReportPayload>,
}

/// A single report data point.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPayload {
    /// Resource identifier.
    pub r_id: String,
    /// Measured value.
    pub value: f64,
}

/// VTN reply to a report update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedReport {
    /// Outcome of the update.
    pub response: EiResponse,
    /// VEN identity.
    pub ven_id: Option<String>,
}

// ============================================================================
// Generic response
// ============================================================================

/// Outcome block carried by every response-structured message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EiResponse {
    /// Response code.
    pub code: ResponseCode,
    /// Human-readable description, usually the code's canonical text.
    pub description: String,
}

impl EiResponse {
    /// A success outcome.
    pub fn ok() -> Self {
        Self::from_code(ResponseCode::Ok)
    }

    /// An outcome carrying the code's canonical description.
    pub fn from_code(code: ResponseCode) -> Self {
        Self {
            code,
            description: code.description().to_string(),
        }
    }
}

/// Generic response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePayload {
    /// The outcome being reported.
    pub response: EiResponse,
    /// VEN identity, when addressed to a specific VEN.
    pub ven_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_element_name_roundtrip() {
        let all = [
            MessageType::QueryRegistration,
            MessageType::CreatePartyRegistration,
            MessageType::CreatedPartyRegistration,
            MessageType::CancelPartyRegistration,
            MessageType::CanceledPartyRegistration,
            MessageType::Poll,
            MessageType::DistributeEvent,
            MessageType::CreatedEvent,
            MessageType::RegisterReport,
            MessageType::RegisteredReport,
            MessageType::UpdateReport,
            MessageType::UpdatedReport,
            MessageType::Response,
        ];
        for mt in all {
            assert_eq!(MessageType::from_element_name(mt.element_name()), Some(mt));
        }
        assert_eq!(MessageType::from_element_name("oadrBogus"), None);
    }

    #[test]
    fn test_response_code_display() {
        assert_eq!(ResponseCode::Ok.to_string(), "200: OK");
        assert_eq!(
            ResponseCode::OutOfSequence.to_string(),
            "450: OUT OF SEQUENCE"
        );
        assert_eq!(
            ResponseCode::WrongEndpoint.to_string(),
            "459: WRONG ENDPOINT"
        );
    }

    #[test]
    fn test_response_code_from_code() {
        assert_eq!(ResponseCode::from_code(200), Some(ResponseCode::Ok));
        assert_eq!(
            ResponseCode::from_code(459),
            Some(ResponseCode::WrongEndpoint)
        );
        assert_eq!(ResponseCode::from_code(999), None);
    }

    #[test]
    fn test_service_admission() {
        assert!(Service::EiRegisterParty.admits(MessageType::QueryRegistration));
        assert!(Service::EiRegisterParty.admits(MessageType::CreatePartyRegistration));
        assert!(!Service::OadrPoll.admits(MessageType::QueryRegistration));
        assert!(Service::OadrPoll.admits(MessageType::Poll));
        assert!(Service::EiReport.admits(MessageType::UpdateReport));
        assert!(!Service::EiEvent.admits(MessageType::Poll));
    }

    #[test]
    fn test_service_path_segment_roundtrip() {
        for svc in [
            Service::EiRegisterParty,
            Service::EiEvent,
            Service::EiReport,
            Service::OadrPoll,
        ] {
            assert_eq!(Service::from_path_segment(svc.path_segment()), Some(svc));
        }
        assert_eq!(Service::from_path_segment("EiOpt"), None);
    }

    #[test]
    fn test_envelope_party_id() {
        let env = Envelope::new(
            "req1",
            Payload::Poll(Poll {
                ven_id: "ven123".to_string(),
            }),
        );
        assert_eq!(env.party_id(), Some("ven123"));
        assert_eq!(env.message_type(), Some(MessageType::Poll));
    }

    #[test]
    fn test_unrecognized_payload_has_no_message_type() {
        let env = Envelope::new(
            "req1",
            Payload::Unrecognized {
                element: "oadrBogus".to_string(),
            },
        );
        assert_eq!(env.message_type(), None);
        assert_eq!(env.party_id(), None);
    }

    #[test]
    fn test_generated_request_ids_are_unique() {
        let a = Envelope::generate_request_id();
        let b = Envelope::generate_request_id();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_opt_type_roundtrip() {
        assert_eq!(OptType::from_str_opt("optIn"), Some(OptType::OptIn));
        assert_eq!(OptType::from_str_opt("optOut"), Some(OptType::OptOut));
        assert_eq!(OptType::from_str_opt("maybe"), None);
    }

    #[test]
    fn test_report_request_serde_roundtrip() {
        let req = ReportRequest {
            report_request_id: "rr-1".to_string(),
            report_specifier_id: "telemetry".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: ReportRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
