//! VEN client: registration, polling and report flows.
//!
//! The client drives the VEN side of the protocol against one VTN:
//! register, then poll on a cadence and answer whatever the VTN hands
//! back. Every server-side refusal is soft — logged, then retried on
//! the next tick — except a registration denial, which aborts the
//! registration flow cleanly.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use protocol::messages::{
    CancelPartyRegistration, CreatePartyRegistration, CreatedEvent, DistributeEvent, EiResponse,
    EventDescriptor, EventResponse, OptType, Payload, Poll, RegisterReport, ReportDescriptor,
    ReportPayload, ReportRequest, ResponseCode, Service, UpdateReport,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::VenConfig;
use crate::transport::{Transport, TransportError};

/// Protocol profile announced during registration.
const PROFILE_NAME: &str = "2.0b";
/// Transport announced during registration.
const TRANSPORT_NAME: &str = "simpleHttp";

/// Application callback deciding the opt response for distributed
/// events.
pub type EventHandler =
    Arc<dyn Fn(Vec<EventDescriptor>) -> BoxFuture<'static, OptType> + Send + Sync>;

/// A VEN client bound to one VTN.
pub struct VenClient {
    config: VenConfig,
    transport: Arc<Transport>,
    ven_id: Option<String>,
    registration_id: Option<String>,
    poll_interval: Duration,
    event_handler: Option<EventHandler>,
    poller: Option<JoinHandle<()>>,
}

impl VenClient {
    pub fn new(config: VenConfig) -> Result<Self, TransportError> {
        let transport = Transport::new(
            &config.vtn_url,
            config.request_timeout,
            config.signing.clone(),
            config.vtn_fingerprint.clone(),
        )?;
        Ok(Self {
            ven_id: config.ven_id.clone(),
            poll_interval: config.poll_interval,
            transport: Arc::new(transport),
            config,
            registration_id: None,
            event_handler: None,
            poller: None,
        })
    }

    /// Installs the callback invoked for distributed events. Without
    /// one, the client opts out of everything.
    pub fn set_event_handler<F, Fut>(&mut self, handler: F)
    where
        F: Fn(Vec<EventDescriptor>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = OptType> + Send + 'static,
    {
        self.event_handler = Some(Arc::new(move |events| Box::pin(handler(events))));
    }

    /// The VEN identity, once assigned or pre-provisioned.
    pub fn ven_id(&self) -> Option<&str> {
        self.ven_id.as_deref()
    }

    /// The registration identity, once registered.
    pub fn registration_id(&self) -> Option<&str> {
        self.registration_id.as_deref()
    }

    /// Registers this VEN with the VTN.
    ///
    /// Returns the assigned VEN identity, or `None` when the VTN denied
    /// the registration or could not be reached. A denial is final for
    /// this attempt; the caller decides whether to try again.
    pub async fn register(&mut self) -> Option<String> {
        info!(vtn_url = self.config.vtn_url, "registering with the VTN");
        let payload = Payload::CreatePartyRegistration(CreatePartyRegistration {
            ven_name: self.config.ven_name.clone(),
            profile_name: PROFILE_NAME.to_string(),
            transport_name: TRANSPORT_NAME.to_string(),
            ven_id: self.ven_id.clone(),
        });
        let body = match self.transport.create_message(payload) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "could not build the registration message");
                return None;
            }
        };
        let envelope = self
            .transport
            .perform_request(Service::EiRegisterParty, body)
            .await?;

        match envelope.payload {
            Payload::CreatedPartyRegistration(reply) => {
                if reply.response.code != ResponseCode::Ok {
                    log_non_ok(&reply.response);
                    return None;
                }
                let Some(ven_id) = reply.ven_id else {
                    error!("No VEN ID received from the VTN, aborting.");
                    return None;
                };
                if let Some(freq) = reply.requested_poll_freq_secs {
                    self.poll_interval = Duration::from_secs(freq.max(1));
                }
                info!(
                    ven_id,
                    registration_id = ?reply.registration_id,
                    vtn_id = reply.vtn_id,
                    "registered with the VTN"
                );
                self.registration_id = reply.registration_id;
                self.ven_id = Some(ven_id.clone());
                Some(ven_id)
            }
            Payload::Response(reply) => {
                log_non_ok(&reply.response);
                None
            }
            other => {
                warn!(reply = ?other.message_type(), "unexpected reply to a registration request");
                None
            }
        }
    }

    /// Cancels the current registration. Returns whether the VTN
    /// confirmed the cancel. The poll loop is stopped either way.
    pub async fn cancel_registration(&mut self) -> bool {
        self.stop();
        let (Some(ven_id), Some(registration_id)) =
            (self.ven_id.clone(), self.registration_id.clone())
        else {
            warn!("not registered, nothing to cancel");
            return false;
        };
        let payload = Payload::CancelPartyRegistration(CancelPartyRegistration {
            registration_id,
            ven_id,
        });
        let Ok(body) = self.transport.create_message(payload) else {
            return false;
        };
        let Some(envelope) = self
            .transport
            .perform_request(Service::EiRegisterParty, body)
            .await
        else {
            return false;
        };
        match envelope.payload {
            Payload::CanceledPartyRegistration(reply) if reply.response.code == ResponseCode::Ok => {
                info!("registration canceled");
                self.registration_id = None;
                true
            }
            Payload::CanceledPartyRegistration(reply) => {
                log_non_ok(&reply.response);
                false
            }
            Payload::Response(reply) => {
                log_non_ok(&reply.response);
                false
            }
            other => {
                warn!(reply = ?other.message_type(), "unexpected reply to a cancel request");
                false
            }
        }
    }

    /// Announces the reports this VEN can deliver and returns the
    /// subscriptions the VTN created.
    pub async fn register_reports(
        &self,
        reports: Vec<ReportDescriptor>,
    ) -> Option<Vec<ReportRequest>> {
        let ven_id = self.require_registration()?;
        let payload = Payload::RegisterReport(RegisterReport { ven_id, reports });
        let body = self.transport.create_message(payload).ok()?;
        let envelope = self
            .transport
            .perform_request(Service::EiReport, body)
            .await?;
        match envelope.payload {
            Payload::RegisteredReport(reply) if reply.response.code == ResponseCode::Ok => {
                Some(reply.report_requests)
            }
            Payload::RegisteredReport(reply) => {
                log_non_ok(&reply.response);
                None
            }
            Payload::Response(reply) => {
                log_non_ok(&reply.response);
                None
            }
            other => {
                warn!(reply = ?other.message_type(), "unexpected reply to a report registration");
                None
            }
        }
    }

    /// Delivers report data for one subscription. Returns whether the
    /// VTN acknowledged it.
    pub async fn update_report(
        &self,
        report_request_id: impl Into<String>,
        payloads: Vec<ReportPayload>,
    ) -> bool {
        let Some(ven_id) = self.require_registration() else {
            return false;
        };
        let payload = Payload::UpdateReport(UpdateReport {
            ven_id,
            report_request_id: report_request_id.into(),
            payloads,
        });
        let Ok(body) = self.transport.create_message(payload) else {
            return false;
        };
        let Some(envelope) = self
            .transport
            .perform_request(Service::EiReport, body)
            .await
        else {
            return false;
        };
        match envelope.payload {
            Payload::UpdatedReport(reply) if reply.response.code == ResponseCode::Ok => true,
            Payload::UpdatedReport(reply) => {
                log_non_ok(&reply.response);
                false
            }
            Payload::Response(reply) => {
                log_non_ok(&reply.response);
                false
            }
            other => {
                warn!(reply = ?other.message_type(), "unexpected reply to a report update");
                false
            }
        }
    }

    /// Starts the background poll loop. Requires a VEN identity, so
    /// register first (or pre-provision one).
    pub fn start_polling(&mut self) {
        let Some(ven_id) = self.ven_id.clone() else {
            warn!("cannot start polling without a VEN ID");
            return;
        };
        if self.poller.is_some() {
            debug!("poll loop already running");
            return;
        }
        let transport = Arc::clone(&self.transport);
        let handler = self.event_handler.clone();
        let interval = self.poll_interval;
        info!(?interval, "starting poll loop");
        self.poller = Some(tokio::spawn(poll_loop(
            transport, ven_id, handler, interval,
        )));
    }

    /// Sends one poll and handles the reply; the poll loop calls this
    /// on its cadence, and tests call it directly.
    pub async fn poll_once(&self) {
        let Some(ven_id) = self.ven_id.clone() else {
            warn!("cannot poll without a VEN ID");
            return;
        };
        poll_once(&self.transport, &ven_id, self.event_handler.as_ref()).await;
    }

    /// Stops the poll loop; in-flight requests are aborted. Safe to
    /// call when not polling.
    pub fn stop(&mut self) {
        if let Some(task) = self.poller.take() {
            task.abort();
            info!("poll loop stopped");
        }
    }
}

impl Drop for VenClient {
    fn drop(&mut self) {
        self.stop();
    }
}

impl VenClient {
    fn require_registration(&self) -> Option<String> {
        match &self.ven_id {
            Some(ven_id) => Some(ven_id.clone()),
            None => {
                warn!("not registered with the VTN yet");
                None
            }
        }
    }
}

async fn poll_loop(
    transport: Arc<Transport>,
    ven_id: String,
    handler: Option<EventHandler>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick fires immediately; skip it so the cadence starts one
    // interval after registration.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        poll_once(&transport, &ven_id, handler.as_ref()).await;
    }
}

async fn poll_once(transport: &Transport, ven_id: &str, handler: Option<&EventHandler>) {
    let payload = Payload::Poll(Poll {
        ven_id: ven_id.to_string(),
    });
    let body = match transport.create_message(payload) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "could not build the poll message");
            return;
        }
    };
    let Some(envelope) = transport.perform_request(Service::OadrPoll, body).await else {
        return;
    };
    match envelope.payload {
        Payload::Response(reply) => {
            if reply.response.code != ResponseCode::Ok {
                log_non_ok(&reply.response);
            }
        }
        Payload::DistributeEvent(distribute) => {
            answer_events(transport, ven_id, handler, distribute).await;
        }
        other => {
            debug!(reply = ?other.message_type(), "nothing actionable in the poll reply");
        }
    }
}

/// Answers a distributed-event reply with an `oadrCreatedEvent`
/// carrying the application's opt decision for every event.
async fn answer_events(
    transport: &Transport,
    ven_id: &str,
    handler: Option<&EventHandler>,
    distribute: DistributeEvent,
) {
    info!(
        vtn_id = distribute.vtn_id,
        count = distribute.events.len(),
        "received distributed events"
    );
    let opt_type = match handler {
        Some(handler) => handler(distribute.events.clone()).await,
        None => {
            warn!("no event handler installed, opting out");
            OptType::OptOut
        }
    };
    let event_responses = distribute
        .events
        .iter()
        .map(|event| EventResponse {
            code: ResponseCode::Ok,
            event_id: event.event_id.clone(),
            opt_type,
        })
        .collect();
    let payload = Payload::CreatedEvent(CreatedEvent {
        response: EiResponse::ok(),
        ven_id: ven_id.to_string(),
        event_responses,
    });
    let body = match transport.create_message(payload) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "could not build the event response");
            return;
        }
    };
    if let Some(reply) = transport.perform_request(Service::EiEvent, body).await {
        if let Payload::Response(reply) = reply.payload {
            if reply.response.code != ResponseCode::Ok {
                log_non_ok(&reply.response);
            }
        }
    }
}

/// Logs a non-OK protocol outcome. A wrong-endpoint answer gets its own
/// line, since it points at a client-side routing bug.
fn log_non_ok(response: &EiResponse) {
    if response.code == ResponseCode::WrongEndpoint {
        warn!("the VTN says this message was sent to the wrong endpoint");
    }
    warn!(
        "We got a non-OK OpenADR response from the server: {}: {}",
        response.code.code(),
        response.description
    );
}
