//! Envelope codec: XML serialization and schema validation.
//!
//! # Document shape
//!
//! ```text
//! <oadrPayload xmlns="..." xmlns:pyld="..." xmlns:ei="..." ...>
//!   <ds:Signature>...</ds:Signature>        (optional, first)
//!   <oadrSignedObject>
//!     <oadrPoll>
//!       <pyld:requestID>...</pyld:requestID>
//!       <ei:venID>...</ei:venID>
//!     </oadrPoll>
//!   </oadrSignedObject>
//! </oadrPayload>
//! ```
//!
//! Encoding is deterministic: fixed element order, fixed prefixes, no
//! whitespace. That deterministic form doubles as the canonical form the
//! signature subsystem digests, so a decoded envelope re-encodes to the
//! exact bytes that were signed.
//!
//! Decoding validates against the structural schema as a hard gate,
//! independent of signature validity: a well-formed document that
//! violates the schema fails with a [`SchemaError`] naming the rule.
//! The one deliberate exception is an unknown message element, which
//! decodes to [`Payload::Unrecognized`] so the dispatch layer can answer
//! with a standardized error instead of dropping the connection.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::SchemaError;
use crate::messages::{
    CancelPartyRegistration, CanceledPartyRegistration, CreatePartyRegistration, CreatedEvent,
    CreatedPartyRegistration, DistributeEvent, EiResponse, Envelope, EventDescriptor,
    EventResponse, MessageType, OptType, Payload, Poll, QueryRegistration, RegisterReport,
    RegisteredReport, ReplayProtect, ReportDescriptor, ReportPayload, ReportRequest,
    ResponseCode, ResponsePayload, SecurityBlock, UpdateReport, UpdatedReport, DSP_XMLNS,
    DS_XMLNS, EI_XMLNS, OADR_XMLNS, PYLD_XMLNS,
};
use crate::signature::{C14N_ALGORITHM, DIGEST_ALGORITHM, SIGNATURE_ALGORITHM};

type XmlWriter = Writer<Vec<u8>>;

// ============================================================================
// Encoding
// ============================================================================

/// Serializes an envelope to a schema-conformant document.
///
/// Pure transform: no I/O, no mutation. Fails only if the payload is
/// not encodable (an [`Payload::Unrecognized`] body).
pub fn encode(envelope: &Envelope) -> Result<String, SchemaError> {
    let mut w = Writer::new(Vec::new());
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|e| SchemaError::Malformed(e.to_string()))?;

    let mut root = BytesStart::new("oadrPayload");
    root.push_attribute(("xmlns", OADR_XMLNS));
    root.push_attribute(("xmlns:pyld", PYLD_XMLNS));
    root.push_attribute(("xmlns:ei", EI_XMLNS));
    root.push_attribute(("xmlns:ds", DS_XMLNS));
    root.push_attribute(("xmlns:dsp", DSP_XMLNS));
    w.write_event(Event::Start(root))
        .map_err(|e| SchemaError::Malformed(e.to_string()))?;

    if let Some(security) = &envelope.security {
        write_signature(&mut w, security)?;
    }
    write_signed_object(&mut w, envelope)?;

    end(&mut w, "oadrPayload")?;
    String::from_utf8(w.into_inner()).map_err(|e| SchemaError::Malformed(e.to_string()))
}

/// The canonical byte form of the signed subtree, as a string.
///
/// This is exactly the `oadrSignedObject` element as [`encode`] writes
/// it; the signature subsystem digests it, so tampering with any part of
/// the payload changes the recomputed digest on the receiving side.
pub fn canonical_signed_object(envelope: &Envelope) -> Result<String, SchemaError> {
    let mut w = Writer::new(Vec::new());
    write_signed_object(&mut w, envelope)?;
    String::from_utf8(w.into_inner()).map_err(|e| SchemaError::Malformed(e.to_string()))
}

fn start(w: &mut XmlWriter, name: &str) -> Result<(), SchemaError> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| SchemaError::Malformed(e.to_string()))
}

fn end(w: &mut XmlWriter, name: &str) -> Result<(), SchemaError> {
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| SchemaError::Malformed(e.to_string()))
}

fn leaf(w: &mut XmlWriter, name: &str, text: &str) -> Result<(), SchemaError> {
    start(w, name)?;
    w.write_event(Event::Text(BytesText::new(text)))
        .map_err(|e| SchemaError::Malformed(e.to_string()))?;
    end(w, name)
}

fn opt_leaf(w: &mut XmlWriter, name: &str, text: Option<&str>) -> Result<(), SchemaError> {
    match text {
        Some(t) => leaf(w, name, t),
        None => Ok(()),
    }
}

fn empty_with_algorithm(w: &mut XmlWriter, name: &str, algorithm: &str) -> Result<(), SchemaError> {
    let mut e = BytesStart::new(name);
    e.push_attribute(("Algorithm", algorithm));
    w.write_event(Event::Empty(e))
        .map_err(|e| SchemaError::Malformed(e.to_string()))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn write_signature(w: &mut XmlWriter, security: &SecurityBlock) -> Result<(), SchemaError> {
    start(w, "ds:Signature")?;

    start(w, "ds:SignedInfo")?;
    empty_with_algorithm(w, "ds:CanonicalizationMethod", C14N_ALGORITHM)?;
    empty_with_algorithm(w, "ds:SignatureMethod", SIGNATURE_ALGORITHM)?;
    let mut reference = BytesStart::new("ds:Reference");
    reference.push_attribute(("URI", "#oadrSignedObject"));
    w.write_event(Event::Start(reference))
        .map_err(|e| SchemaError::Malformed(e.to_string()))?;
    empty_with_algorithm(w, "ds:DigestMethod", DIGEST_ALGORITHM)?;
    opt_leaf(w, "ds:DigestValue", security.digest.as_deref())?;
    end(w, "ds:Reference")?;
    end(w, "ds:SignedInfo")?;

    opt_leaf(w, "ds:SignatureValue", security.signature.as_deref())?;

    if let Some(cert) = &security.certificate {
        start(w, "ds:KeyInfo")?;
        start(w, "ds:X509Data")?;
        leaf(w, "ds:X509Certificate", cert)?;
        end(w, "ds:X509Data")?;
        end(w, "ds:KeyInfo")?;
    }

    if let Some(replay) = &security.replay_protect {
        start(w, "ds:Object")?;
        start(w, "dsp:ReplayProtect")?;
        if let Some(ts) = &replay.timestamp {
            leaf(w, "dsp:timestamp", &format_timestamp(ts))?;
        }
        opt_leaf(w, "dsp:nonce", replay.nonce.as_deref())?;
        end(w, "dsp:ReplayProtect")?;
        end(w, "ds:Object")?;
    }

    end(w, "ds:Signature")
}

fn write_ei_response(
    w: &mut XmlWriter,
    response: &EiResponse,
    request_id: &str,
) -> Result<(), SchemaError> {
    start(w, "ei:eiResponse")?;
    leaf(w, "ei:responseCode", &response.code.code().to_string())?;
    leaf(w, "ei:responseDescription", &response.description)?;
    leaf(w, "pyld:requestID", request_id)?;
    end(w, "ei:eiResponse")
}

fn write_signed_object(w: &mut XmlWriter, envelope: &Envelope) -> Result<(), SchemaError> {
    start(w, "oadrSignedObject")?;
    let rid = envelope.request_id.as_str();

    match &envelope.payload {
        Payload::QueryRegistration(p) => {
            start(w, "oadrQueryRegistration")?;
            leaf(w, "pyld:requestID", rid)?;
            opt_leaf(w, "ei:venID", p.ven_id.as_deref())?;
            end(w, "oadrQueryRegistration")?;
        }
        Payload::CreatePartyRegistration(p) => {
            start(w, "oadrCreatePartyRegistration")?;
            leaf(w, "pyld:requestID", rid)?;
            leaf(w, "oadrProfileName", &p.profile_name)?;
            leaf(w, "oadrTransportName", &p.transport_name)?;
            leaf(w, "oadrVenName", &p.ven_name)?;
            opt_leaf(w, "ei:venID", p.ven_id.as_deref())?;
            end(w, "oadrCreatePartyRegistration")?;
        }
        Payload::CreatedPartyRegistration(p) => {
            start(w, "oadrCreatedPartyRegistration")?;
            write_ei_response(w, &p.response, rid)?;
            leaf(w, "ei:vtnID", &p.vtn_id)?;
            opt_leaf(w, "ei:venID", p.ven_id.as_deref())?;
            opt_leaf(w, "ei:registrationID", p.registration_id.as_deref())?;
            opt_leaf(
                w,
                "oadrRequestedOadrPollFreq",
                p.requested_poll_freq_secs.map(|s| s.to_string()).as_deref(),
            )?;
            end(w, "oadrCreatedPartyRegistration")?;
        }
        Payload::CancelPartyRegistration(p) => {
            start(w, "oadrCancelPartyRegistration")?;
            leaf(w, "pyld:requestID", rid)?;
            leaf(w, "ei:registrationID", &p.registration_id)?;
            leaf(w, "ei:venID", &p.ven_id)?;
            end(w, "oadrCancelPartyRegistration")?;
        }
        Payload::CanceledPartyRegistration(p) => {
            start(w, "oadrCanceledPartyRegistration")?;
            write_ei_response(w, &p.response, rid)?;
            opt_leaf(w, "ei:venID", p.ven_id.as_deref())?;
            end(w, "oadrCanceledPartyRegistration")?;
        }
        Payload::Poll(p) => {
            start(w, "oadrPoll")?;
            leaf(w, "pyld:requestID", rid)?;
            leaf(w, "ei:venID", &p.ven_id)?;
            end(w, "oadrPoll")?;
        }
        Payload::DistributeEvent(p) => {
            start(w, "oadrDistributeEvent")?;
            leaf(w, "pyld:requestID", rid)?;
            leaf(w, "ei:vtnID", &p.vtn_id)?;
            for event in &p.events {
                start(w, "oadrEvent")?;
                leaf(w, "ei:eventID", &event.event_id)?;
                leaf(
                    w,
                    "ei:modificationNumber",
                    &event.modification_number.to_string(),
                )?;
                leaf(w, "ei:dtstart", &format_timestamp(&event.start_time))?;
                leaf(w, "ei:duration", &event.duration_secs.to_string())?;
                leaf(w, "ei:signalName", &event.signal_name)?;
                leaf(w, "ei:currentValue", &event.current_value.to_string())?;
                end(w, "oadrEvent")?;
            }
            end(w, "oadrDistributeEvent")?;
        }
        Payload::CreatedEvent(p) => {
            start(w, "oadrCreatedEvent")?;
            write_ei_response(w, &p.response, rid)?;
            leaf(w, "ei:venID", &p.ven_id)?;
            for er in &p.event_responses {
                start(w, "ei:eventResponse")?;
                leaf(w, "ei:responseCode", &er.code.code().to_string())?;
                leaf(w, "ei:eventID", &er.event_id)?;
                leaf(w, "ei:optType", er.opt_type.as_str())?;
                end(w, "ei:eventResponse")?;
            }
            end(w, "oadrCreatedEvent")?;
        }
        Payload::RegisterReport(p) => {
            start(w, "oadrRegisterReport")?;
            leaf(w, "pyld:requestID", rid)?;
            leaf(w, "ei:venID", &p.ven_id)?;
            for report in &p.reports {
                start(w, "oadrReport")?;
                leaf(w, "ei:reportName", &report.report_name)?;
                leaf(w, "ei:reportSpecifierID", &report.report_specifier_id)?;
                leaf(
                    w,
                    "oadrReportBackDuration",
                    &report.report_back_duration_secs.to_string(),
                )?;
                for r_id in &report.r_ids {
                    leaf(w, "ei:rID", r_id)?;
                }
                end(w, "oadrReport")?;
            }
            end(w, "oadrRegisterReport")?;
        }
        Payload::RegisteredReport(p) => {
            start(w, "oadrRegisteredReport")?;
            write_ei_response(w, &p.response, rid)?;
            opt_leaf(w, "ei:venID", p.ven_id.as_deref())?;
            for rr in &p.report_requests {
                start(w, "oadrReportRequest")?;
                leaf(w, "ei:reportRequestID", &rr.report_request_id)?;
                leaf(w, "ei:reportSpecifierID", &rr.report_specifier_id)?;
                end(w, "oadrReportRequest")?;
            }
            end(w, "oadrRegisteredReport")?;
        }
        Payload::UpdateReport(p) => {
            start(w, "oadrUpdateReport")?;
            leaf(w, "pyld:requestID", rid)?;
            leaf(w, "ei:venID", &p.ven_id)?;
            leaf(w, "ei:reportRequestID", &p.report_request_id)?;
            for payload in &p.payloads {
                start(w, "oadrReportPayload")?;
                leaf(w, "ei:rID", &payload.r_id)?;
                leaf(w, "ei:payloadFloat", &payload.value.to_string())?;
                end(w, "oadrReportPayload")?;
            }
            end(w, "oadrUpdateReport")?;
        }
        Payload::UpdatedReport(p) => {
            start(w, "oadrUpdatedReport")?;
            write_ei_response(w, &p.response, rid)?;
            opt_leaf(w, "ei:venID", p.ven_id.as_deref())?;
            end(w, "oadrUpdatedReport")?;
        }
        Payload::Response(p) => {
            start(w, "oadrResponse")?;
            write_ei_response(w, &p.response, rid)?;
            opt_leaf(w, "ei:venID", p.ven_id.as_deref())?;
            end(w, "oadrResponse")?;
        }
        Payload::Unrecognized { element } => {
            return Err(SchemaError::UnexpectedElement {
                element: element.clone(),
            });
        }
    }

    end(w, "oadrSignedObject")
}

// ============================================================================
// Decoding
// ============================================================================

/// Parses and schema-validates a document into an envelope.
///
/// Schema conformance is a hard gate: a structurally deviant document
/// fails here even if its signature would verify. Unknown message
/// elements are the one tolerated deviation and decode to
/// [`Payload::Unrecognized`].
pub fn decode(xml: &str) -> Result<Envelope, SchemaError> {
    let root = parse_tree(xml)?;
    if root.name != "oadrPayload" {
        return Err(SchemaError::UnexpectedElement { element: root.name });
    }

    let security = root.child("Signature").map(parse_security);

    let signed = root.required("oadrSignedObject")?;
    let message = match signed.children.as_slice() {
        [single] => single,
        [] => {
            return Err(SchemaError::MissingElement {
                element: "oadrSignedObject message".to_string(),
            })
        }
        [_, extra, ..] => {
            return Err(SchemaError::UnexpectedElement {
                element: extra.name.clone(),
            })
        }
    };

    let Some(message_type) = MessageType::from_element_name(&message.name) else {
        // Unknown types still decode, so dispatch can answer 453.
        let request_id = message
            .child("requestID")
            .map(|n| n.text.clone())
            .unwrap_or_default();
        return Ok(Envelope {
            request_id,
            payload: Payload::Unrecognized {
                element: message.name.clone(),
            },
            security,
        });
    };

    let (request_id, payload) = parse_message(message_type, message)?;
    Ok(Envelope {
        request_id,
        payload,
        security,
    })
}

/// A lightweight element tree; names are local (prefixes stripped).
#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn required(&self, name: &str) -> Result<&Node, SchemaError> {
        self.child(name).ok_or_else(|| SchemaError::MissingElement {
            element: name.to_string(),
        })
    }

    fn required_text(&self, name: &str) -> Result<String, SchemaError> {
        Ok(self.required(name)?.text.clone())
    }

    fn optional_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|n| n.text.clone())
    }
}

fn parse_tree(xml: &str) -> Result<Node, SchemaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader
            .read_event()
            .map_err(|e| SchemaError::Malformed(e.to_string()))?
        {
            Event::Start(e) => {
                stack.push(Node {
                    name: local_name(&e),
                    ..Node::default()
                });
            }
            Event::Empty(e) => {
                let node = Node {
                    name: local_name(&e),
                    ..Node::default()
                };
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| SchemaError::Malformed(e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| {
                    SchemaError::Malformed("unbalanced closing tag".to_string())
                })?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Eof => break,
            // Declarations, comments and PIs carry no schema content.
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SchemaError::Malformed(
            "unexpected end of document".to_string(),
        ));
    }
    root.ok_or_else(|| SchemaError::Malformed("empty document".to_string()))
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), SchemaError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        Ok(())
    } else if root.is_none() {
        *root = Some(node);
        Ok(())
    } else {
        Err(SchemaError::Malformed(
            "multiple root elements".to_string(),
        ))
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn parse_security(node: &Node) -> SecurityBlock {
    let digest = node
        .child("SignedInfo")
        .and_then(|si| si.child("Reference"))
        .and_then(|r| r.child("DigestValue"))
        .map(|n| n.text.clone());
    let signature = node.optional_text("SignatureValue");
    let certificate = node
        .child("KeyInfo")
        .and_then(|k| k.child("X509Data"))
        .and_then(|x| x.child("X509Certificate"))
        .map(|n| n.text.clone());
    let replay_protect = node
        .child("Object")
        .and_then(|o| o.child("ReplayProtect"))
        .map(|rp| ReplayProtect {
            timestamp: rp
                .child("timestamp")
                .and_then(|t| DateTime::parse_from_rfc3339(t.text.trim()).ok())
                .map(|d| d.with_timezone(&Utc)),
            nonce: rp.child("nonce").map(|n| n.text.clone()),
        });

    SecurityBlock {
        digest,
        signature,
        certificate,
        replay_protect,
    }
}

/// Extracts the leading `requestID` of a request-structured message.
///
/// The element must exist and be the first child; presence in any other
/// position is an ordering violation, not a missing element.
fn request_id_of(message: &Node) -> Result<String, SchemaError> {
    match message.children.first() {
        Some(first) if first.name == "requestID" => Ok(first.text.clone()),
        _ => {
            if message.child("requestID").is_some() {
                Err(SchemaError::ElementOrder {
                    element: "requestID".to_string(),
                })
            } else {
                Err(SchemaError::MissingElement {
                    element: "requestID".to_string(),
                })
            }
        }
    }
}

/// Extracts the leading `eiResponse` of a response-structured message.
fn ei_response_of(message: &Node) -> Result<(EiResponse, String), SchemaError> {
    let node = match message.children.first() {
        Some(first) if first.name == "eiResponse" => first,
        _ => {
            if message.child("eiResponse").is_some() {
                return Err(SchemaError::ElementOrder {
                    element: "eiResponse".to_string(),
                });
            }
            return Err(SchemaError::MissingElement {
                element: "eiResponse".to_string(),
            });
        }
    };

    let code_node = node.required("responseCode")?;
    let code_num: u16 = parse_num(code_node)?;
    let code = ResponseCode::from_code(code_num).ok_or_else(|| SchemaError::InvalidValue {
        element: "responseCode".to_string(),
        value: code_node.text.clone(),
    })?;
    let description = node
        .optional_text("responseDescription")
        .unwrap_or_default();
    let request_id = node.optional_text("requestID").unwrap_or_default();

    Ok((EiResponse { code, description }, request_id))
}

fn parse_num<T: std::str::FromStr>(node: &Node) -> Result<T, SchemaError> {
    node.text
        .trim()
        .parse()
        .map_err(|_| SchemaError::InvalidValue {
            element: node.name.clone(),
            value: node.text.clone(),
        })
}

fn parse_datetime(node: &Node) -> Result<DateTime<Utc>, SchemaError> {
    DateTime::parse_from_rfc3339(node.text.trim())
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| SchemaError::InvalidValue {
            element: node.name.clone(),
            value: node.text.clone(),
        })
}

fn parse_message(
    message_type: MessageType,
    message: &Node,
) -> Result<(String, Payload), SchemaError> {
    match message_type {
        MessageType::QueryRegistration => {
            let rid = request_id_of(message)?;
            let payload = Payload::QueryRegistration(QueryRegistration {
                ven_id: message.optional_text("venID"),
            });
            Ok((rid, payload))
        }
        MessageType::CreatePartyRegistration => {
            let rid = request_id_of(message)?;
            let payload = Payload::CreatePartyRegistration(CreatePartyRegistration {
                profile_name: message.required_text("oadrProfileName")?,
                transport_name: message.required_text("oadrTransportName")?,
                ven_name: message.required_text("oadrVenName")?,
                ven_id: message.optional_text("venID"),
            });
            Ok((rid, payload))
        }
        MessageType::CreatedPartyRegistration => {
            let (response, rid) = ei_response_of(message)?;
            let requested_poll_freq_secs = message
                .child("oadrRequestedOadrPollFreq")
                .map(parse_num)
                .transpose()?;
            let payload = Payload::CreatedPartyRegistration(CreatedPartyRegistration {
                response,
                vtn_id: message.required_text("vtnID")?,
                ven_id: message.optional_text("venID"),
                registration_id: message.optional_text("registrationID"),
                requested_poll_freq_secs,
            });
            Ok((rid, payload))
        }
        MessageType::CancelPartyRegistration => {
            let rid = request_id_of(message)?;
            let payload = Payload::CancelPartyRegistration(CancelPartyRegistration {
                registration_id: message.required_text("registrationID")?,
                ven_id: message.required_text("venID")?,
            });
            Ok((rid, payload))
        }
        MessageType::CanceledPartyRegistration => {
            let (response, rid) = ei_response_of(message)?;
            let payload = Payload::CanceledPartyRegistration(CanceledPartyRegistration {
                response,
                ven_id: message.optional_text("venID"),
            });
            Ok((rid, payload))
        }
        MessageType::Poll => {
            let rid = request_id_of(message)?;
            let payload = Payload::Poll(Poll {
                ven_id: message.required_text("venID")?,
            });
            Ok((rid, payload))
        }
        MessageType::DistributeEvent => {
            let rid = request_id_of(message)?;
            let events = message
                .children_named("oadrEvent")
                .map(|e| {
                    Ok(EventDescriptor {
                        event_id: e.required_text("eventID")?,
                        modification_number: parse_num(e.required("modificationNumber")?)?,
                        start_time: parse_datetime(e.required("dtstart")?)?,
                        duration_secs: parse_num(e.required("duration")?)?,
                        signal_name: e.required_text("signalName")?,
                        current_value: parse_num(e.required("currentValue")?)?,
                    })
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            let payload = Payload::DistributeEvent(DistributeEvent {
                vtn_id: message.required_text("vtnID")?,
                events,
            });
            Ok((rid, payload))
        }
        MessageType::CreatedEvent => {
            let (response, rid) = ei_response_of(message)?;
            let event_responses = message
                .children_named("eventResponse")
                .map(|er| {
                    let code_node = er.required("responseCode")?;
                    let code = ResponseCode::from_code(parse_num(code_node)?).ok_or_else(|| {
                        SchemaError::InvalidValue {
                            element: "responseCode".to_string(),
                            value: code_node.text.clone(),
                        }
                    })?;
                    let opt_node = er.required("optType")?;
                    let opt_type =
                        OptType::from_str_opt(opt_node.text.trim()).ok_or_else(|| {
                            SchemaError::InvalidValue {
                                element: "optType".to_string(),
                                value: opt_node.text.clone(),
                            }
                        })?;
                    Ok(EventResponse {
                        code,
                        event_id: er.required_text("eventID")?,
                        opt_type,
                    })
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            let payload = Payload::CreatedEvent(CreatedEvent {
                response,
                ven_id: message.required_text("venID")?,
                event_responses,
            });
            Ok((rid, payload))
        }
        MessageType::RegisterReport => {
            let rid = request_id_of(message)?;
            let reports = message
                .children_named("oadrReport")
                .map(|r| {
                    Ok(ReportDescriptor {
                        report_name: r.required_text("reportName")?,
                        report_specifier_id: r.required_text("reportSpecifierID")?,
                        report_back_duration_secs: parse_num(
                            r.required("oadrReportBackDuration")?,
                        )?,
                        r_ids: r.children_named("rID").map(|n| n.text.clone()).collect(),
                    })
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            let payload = Payload::RegisterReport(RegisterReport {
                ven_id: message.required_text("venID")?,
                reports,
            });
            Ok((rid, payload))
        }
        MessageType::RegisteredReport => {
            let (response, rid) = ei_response_of(message)?;
            let report_requests = message
                .children_named("oadrReportRequest")
                .map(|rr| {
                    Ok(ReportRequest {
                        report_request_id: rr.required_text("reportRequestID")?,
                        report_specifier_id: rr.required_text("reportSpecifierID")?,
                    })
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            let payload = Payload::RegisteredReport(RegisteredReport {
                response,
                ven_id: message.optional_text("venID"),
                report_requests,
            });
            Ok((rid, payload))
        }
        MessageType::UpdateReport => {
            let rid = request_id_of(message)?;
            let payloads = message
                .children_named("oadrReportPayload")
                .map(|rp| {
                    Ok(ReportPayload {
                        r_id: rp.required_text("rID")?,
                        value: parse_num(rp.required("payloadFloat")?)?,
                    })
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;
            let payload = Payload::UpdateReport(UpdateReport {
                ven_id: message.required_text("venID")?,
                report_request_id: message.required_text("reportRequestID")?,
                payloads,
            });
            Ok((rid, payload))
        }
        MessageType::UpdatedReport => {
            let (response, rid) = ei_response_of(message)?;
            let payload = Payload::UpdatedReport(UpdatedReport {
                response,
                ven_id: message.optional_text("venID"),
            });
            Ok((rid, payload))
        }
        MessageType::Response => {
            let (response, rid) = ei_response_of(message)?;
            let payload = Payload::Response(ResponsePayload {
                response,
                ven_id: message.optional_text("venID"),
            });
            Ok((rid, payload))
        }
    }
}
