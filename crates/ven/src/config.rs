//! VEN client configuration.

use std::time::Duration;

use protocol::signature::SigningIdentity;

/// Default poll cadence until the VTN requests another.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default ceiling on a single HTTP round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// VEN client configuration.
///
/// Explicit values only; nothing is read from the environment. The
/// `vtn_url` is the base URL of the VTN's well-known service prefix,
/// for example `http://vtn.example:8080/OpenADR2/Simple/2.0b`.
#[derive(Debug, Clone)]
pub struct VenConfig {
    /// Human-readable name announced during registration.
    pub ven_name: String,
    /// Base URL of the VTN's service prefix.
    pub vtn_url: String,
    /// Pre-provisioned VEN identity. Required when the VTN verifies
    /// signatures, since the trust lookup is keyed by this identity.
    pub ven_id: Option<String>,
    /// Identity used to sign outgoing messages. `None` sends plaintext.
    pub signing: Option<SigningIdentity>,
    /// Pinned fingerprint of the VTN's certificate. When set, VTN
    /// responses must carry a valid signature matching it.
    pub vtn_fingerprint: Option<String>,
    /// Poll cadence; the VTN's requested frequency overrides it after
    /// registration.
    pub poll_interval: Duration,
    /// Ceiling on a single HTTP round trip.
    pub request_timeout: Duration,
}

impl VenConfig {
    /// Creates a plaintext configuration with default timings.
    pub fn new(ven_name: impl Into<String>, vtn_url: impl Into<String>) -> Self {
        Self {
            ven_name: ven_name.into(),
            vtn_url: vtn_url.into(),
            ven_id: None,
            signing: None,
            vtn_fingerprint: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Enables message signing and response verification.
    pub fn with_signing(
        mut self,
        ven_id: impl Into<String>,
        identity: SigningIdentity,
        vtn_fingerprint: impl Into<String>,
    ) -> Self {
        self.ven_id = Some(ven_id.into());
        self.signing = Some(identity);
        self.vtn_fingerprint = Some(vtn_fingerprint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VenConfig::new("TestVEN", "http://localhost:8080/OpenADR2/Simple/2.0b");
        assert!(config.signing.is_none());
        assert!(config.vtn_fingerprint.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_with_signing() {
        let identity = SigningIdentity::generate("ven123");
        let config = VenConfig::new("TestVEN", "http://localhost:8080/OpenADR2/Simple/2.0b")
            .with_signing("ven123", identity, "AA:BB");
        assert_eq!(config.ven_id.as_deref(), Some("ven123"));
        assert!(config.signing.is_some());
    }
}
