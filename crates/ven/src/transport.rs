//! HTTP transport for the client role.
//!
//! One signed (or plaintext) request, one decoded and verified reply.
//! When a VTN fingerprint is pinned, replies additionally pass through
//! a [`ReplayGuard`], so a captured response cannot be fed back to the
//! client. Transport failures, non-OK statuses, undecodable bodies,
//! replayed responses and bad server signatures are all soft: they are
//! logged at `warn` and surface as `None`, so callers retry on their
//! own cadence instead of tearing down.

use std::time::Duration;

use protocol::codec;
use protocol::error::SchemaError;
use protocol::messages::{Envelope, Payload, Service};
use protocol::replay::ReplayGuard;
use protocol::signature::{self, SigningIdentity};
use tracing::{debug, warn};
use url::Url;

/// Errors raised while building the transport or an outgoing message.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured VTN URL is not a valid URL.
    #[error("invalid VTN URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// An outgoing message could not be encoded.
    #[error("could not encode outgoing message: {0}")]
    Encode(#[from] SchemaError),
}

/// Signed request/response round trips against one VTN.
#[derive(Debug)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    signing: Option<SigningIdentity>,
    vtn_fingerprint: Option<String>,
    replay: ReplayGuard,
}

impl Transport {
    pub fn new(
        vtn_url: &str,
        request_timeout: Duration,
        signing: Option<SigningIdentity>,
        vtn_fingerprint: Option<String>,
    ) -> Result<Self, TransportError> {
        Url::parse(vtn_url).map_err(|e| TransportError::InvalidUrl {
            url: vtn_url.to_string(),
            reason: e.to_string(),
        })?;
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: vtn_url.trim_end_matches('/').to_string(),
            signing,
            vtn_fingerprint,
            replay: ReplayGuard::new(),
        })
    }

    /// Wraps a payload in an envelope with a fresh request ID and signs
    /// it when an identity is configured.
    pub fn create_message(&self, payload: Payload) -> Result<String, TransportError> {
        let mut envelope = Envelope::new(Envelope::generate_request_id(), payload);
        if let Some(identity) = &self.signing {
            signature::sign(&mut envelope, identity)?;
        }
        Ok(codec::encode(&envelope)?)
    }

    /// POSTs a document to a service and returns the decoded, verified
    /// reply envelope. Any failure along the way is logged and yields
    /// `None`.
    pub async fn perform_request(&self, service: Service, body: String) -> Option<Envelope> {
        let url = format!("{}/{}", self.base_url, service.path_segment());
        debug!(%url, "performing request");

        let response = match self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "request to the VTN failed");
                return None;
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(
                "Non-OK status {} when performing a request: {}",
                status.as_u16(),
                text
            );
            return None;
        }

        let envelope = match codec::decode(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(%url, error = %e, "could not decode the VTN's response");
                return None;
            }
        };
        if !self.admit_response(&envelope, &url) {
            return None;
        }
        Some(envelope)
    }

    /// Checks a decoded reply against the replay guard and the pinned
    /// VTN fingerprint. Plaintext deployments (no pin) admit as-is.
    fn admit_response(&self, envelope: &Envelope, url: &str) -> bool {
        let Some(expected) = &self.vtn_fingerprint else {
            return true;
        };
        let replay = envelope
            .security
            .as_ref()
            .and_then(|s| s.replay_protect.as_ref());
        if let Err(e) = self.replay.check_and_consume(expected, replay) {
            warn!(%url, error = %e, "discarding stale or replayed VTN response");
            return false;
        }
        if signature::verify_with_fingerprint(envelope, expected).is_err() {
            warn!(%url, "the VTN's response signature did not verify, discarding");
            return false;
        }
        true
    }
}
