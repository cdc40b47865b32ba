//! VTN server configuration.
//!
//! Everything is an explicit constructor parameter; the engine never
//! reads environment variables or files. The hosting application decides
//! where values come from.

use std::time::Duration;

use protocol::replay::DEFAULT_REPLAY_WINDOW;
use protocol::signature::{FingerprintLookup, SigningIdentity};

/// Default ceiling on a single handler invocation.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default poll cadence the VTN asks registering VENs to use.
pub const DEFAULT_REQUESTED_POLL_FREQ: Duration = Duration::from_secs(10);

/// Message-security settings: the server's signing identity plus the
/// trust source used to verify incoming signatures.
#[derive(Clone)]
pub struct VtnSigning {
    /// Identity used to sign outgoing responses.
    pub identity: SigningIdentity,
    /// Resolves a VEN identity to its pinned certificate fingerprint.
    pub fingerprint_lookup: FingerprintLookup,
}

impl std::fmt::Debug for VtnSigning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VtnSigning")
            .field("identity", &self.identity)
            .field("fingerprint_lookup", &"<fn>")
            .finish()
    }
}

/// VTN server configuration.
#[derive(Debug, Clone)]
pub struct VtnConfig {
    /// Identity string this VTN announces in its messages.
    pub vtn_id: String,
    /// Signing and verification settings. `None` runs the server in
    /// plaintext mode: no signatures on responses, no checks on
    /// requests.
    pub signing: Option<VtnSigning>,
    /// Freshness window for the replay guard.
    pub replay_window: Duration,
    /// Ceiling on a single handler invocation.
    pub handler_timeout: Duration,
    /// Poll cadence announced in registration replies.
    pub requested_poll_freq: Duration,
}

impl VtnConfig {
    /// Creates a plaintext configuration with default timings.
    pub fn new(vtn_id: impl Into<String>) -> Self {
        Self {
            vtn_id: vtn_id.into(),
            signing: None,
            replay_window: DEFAULT_REPLAY_WINDOW,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
            requested_poll_freq: DEFAULT_REQUESTED_POLL_FREQ,
        }
    }

    /// Enables message security with the given identity and trust
    /// source.
    pub fn with_signing(
        mut self,
        identity: SigningIdentity,
        fingerprint_lookup: FingerprintLookup,
    ) -> Self {
        self.signing = Some(VtnSigning {
            identity,
            fingerprint_lookup,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_defaults() {
        let config = VtnConfig::new("VTN_A");
        assert_eq!(config.vtn_id, "VTN_A");
        assert!(config.signing.is_none());
        assert_eq!(config.replay_window, Duration::from_secs(300));
        assert_eq!(config.requested_poll_freq, Duration::from_secs(10));
    }

    #[test]
    fn test_with_signing() {
        let identity = SigningIdentity::generate("VTN_A");
        let config =
            VtnConfig::new("VTN_A").with_signing(identity, Arc::new(|_| None));
        assert!(config.signing.is_some());
    }
}
