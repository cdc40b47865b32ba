//! Signature subsystem: signing identities, certificates and the
//! sign/verify operations over envelopes.
//!
//! Signing digests the canonical form of the signed subtree (as
//! produced by [`crate::codec::canonical_signed_object`]) together with
//! a freshly stamped ReplayProtect block, so the signature covers the
//! replay-protection data. Verification recomputes that digest from the
//! parsed envelope, checks the signature over the embedded `SignedInfo`,
//! and separately confirms the signer's certificate fingerprint against
//! a trust lookup supplied by the hosting application.
//!
//! Verification is deterministic and final: a failed check is never
//! retried with the same bytes, and every failure surfaces as the same
//! uniform [`SecurityError`] so callers cannot tell which check failed.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{SecondsFormat, Timelike, Utc};
use ed25519_dalek::{
    Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH,
    SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::codec;
use crate::error::{SchemaError, SecurityError};
use crate::messages::{Envelope, ReplayProtect, SecurityBlock};

/// Canonicalization algorithm identifier written into `SignedInfo`.
pub const C14N_ALGORITHM: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
/// Signature algorithm identifier written into `SignedInfo`.
pub const SIGNATURE_ALGORITHM: &str =
    "http://www.w3.org/2021/04/xmldsig-more#eddsa-ed25519";
/// Digest algorithm identifier written into `SignedInfo`.
pub const DIGEST_ALGORITHM: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// Number of leading hash bytes in a certificate fingerprint.
const FINGERPRINT_BYTES: usize = 10;

/// Resolves a trust principal (endpoint id) to its expected certificate
/// fingerprint.
///
/// Supplied by the hosting application; the engine queries it per
/// verification and caches nothing.
pub type FingerprintLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

impl ReplayProtect {
    /// Stamps a fresh block: current time plus a new random nonce.
    ///
    /// The timestamp is truncated to microseconds so the in-memory value
    /// matches its wire form exactly and survives a decode round trip.
    pub fn fresh() -> Self {
        let now = Utc::now();
        let timestamp = now
            .with_nanosecond(now.nanosecond() / 1000 * 1000)
            .unwrap_or(now);
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);
        Self {
            timestamp: Some(timestamp),
            nonce: Some(hex::encode(nonce)),
        }
    }
}

// ============================================================================
// Certificates and identities
// ============================================================================

/// A signer's certificate: subject name plus Ed25519 public key.
///
/// Serialized as a compact binary structure and carried base64-encoded
/// in the signature's `X509Certificate` slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    subject: String,
    verifying_key: VerifyingKey,
}

/// Version tag of the certificate byte encoding.
const CERTIFICATE_VERSION: u8 = 1;

impl Certificate {
    /// Creates a certificate for the given subject and public key.
    pub fn new(subject: impl Into<String>, verifying_key: VerifyingKey) -> Self {
        Self {
            subject: subject.into(),
            verifying_key,
        }
    }

    /// The subject name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The public key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// The deterministic byte encoding of this certificate.
    pub fn to_bytes(&self) -> Vec<u8> {
        let subject = self.subject.as_bytes();
        let mut out = Vec::with_capacity(3 + subject.len() + PUBLIC_KEY_LENGTH);
        out.push(CERTIFICATE_VERSION);
        out.extend_from_slice(&(subject.len() as u16).to_be_bytes());
        out.extend_from_slice(subject);
        out.extend_from_slice(self.verifying_key.as_bytes());
        out
    }

    /// Decodes a certificate from its byte encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        if bytes.len() < 3 || bytes[0] != CERTIFICATE_VERSION {
            return Err(SecurityError);
        }
        let subject_len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
        if bytes.len() != 3 + subject_len + PUBLIC_KEY_LENGTH {
            return Err(SecurityError);
        }
        let subject = String::from_utf8(bytes[3..3 + subject_len].to_vec())
            .map_err(|_| SecurityError)?;
        let mut key = [0u8; PUBLIC_KEY_LENGTH];
        key.copy_from_slice(&bytes[3 + subject_len..]);
        let verifying_key = VerifyingKey::from_bytes(&key).map_err(|_| SecurityError)?;
        Ok(Self {
            subject,
            verifying_key,
        })
    }

    /// Base64 wire form.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }

    /// Decodes a certificate from its base64 wire form.
    pub fn from_base64(encoded: &str) -> Result<Self, SecurityError> {
        let bytes = BASE64.decode(encoded.trim()).map_err(|_| SecurityError)?;
        Self::from_bytes(&bytes)
    }

    /// Fingerprint of this certificate: the first ten bytes of the
    /// SHA-256 of the certificate bytes, upper-hex, colon separated
    /// (for example `EE:44:C5:78:7E:4B:B8:DC:84:1F`).
    pub fn fingerprint(&self) -> String {
        let hash = Sha256::digest(self.to_bytes());
        hash[..FINGERPRINT_BYTES]
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// The local party's signing identity: secret key plus certificate.
#[derive(Clone)]
pub struct SigningIdentity {
    signing_key: SigningKey,
    certificate: Certificate,
}

impl SigningIdentity {
    /// Generates a new random identity for the given subject.
    pub fn generate(subject: impl Into<String>) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let certificate = Certificate::new(subject, signing_key.verifying_key());
        Self {
            signing_key,
            certificate,
        }
    }

    /// Restores an identity from raw secret key bytes.
    pub fn from_secret_key_bytes(
        subject: impl Into<String>,
        bytes: &[u8; SECRET_KEY_LENGTH],
    ) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let certificate = Certificate::new(subject, signing_key.verifying_key());
        Self {
            signing_key,
            certificate,
        }
    }

    /// The certificate embedded in outgoing signatures.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The fingerprint peers should pin for this identity.
    pub fn fingerprint(&self) -> String {
        self.certificate.fingerprint()
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("subject", &self.certificate.subject)
            .field("fingerprint", &self.certificate.fingerprint())
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Sign / verify
// ============================================================================

/// The canonical `SignedInfo` string the signature is computed over.
///
/// Embeds the digest, so forging either the payload digest or the
/// signature independently fails verification.
fn signed_info(digest_b64: &str) -> String {
    format!(
        "<ds:SignedInfo>\
         <ds:CanonicalizationMethod Algorithm=\"{C14N_ALGORITHM}\"/>\
         <ds:SignatureMethod Algorithm=\"{SIGNATURE_ALGORITHM}\"/>\
         <ds:Reference URI=\"#oadrSignedObject\">\
         <ds:DigestMethod Algorithm=\"{DIGEST_ALGORITHM}\"/>\
         <ds:DigestValue>{digest_b64}</ds:DigestValue>\
         </ds:Reference>\
         </ds:SignedInfo>"
    )
}

/// The replay-protection suffix appended to the canonical signed object
/// before digesting. Missing parts render empty, which can never match
/// a digest computed over a complete block.
fn canonical_replay(replay: &ReplayProtect) -> String {
    let timestamp = replay
        .timestamp
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_default();
    let nonce = replay.nonce.as_deref().unwrap_or_default();
    format!("{timestamp}|{nonce}")
}

fn digest_material(envelope: &Envelope, replay: &ReplayProtect) -> Result<String, SchemaError> {
    let mut material = codec::canonical_signed_object(envelope)?.into_bytes();
    material.extend_from_slice(canonical_replay(replay).as_bytes());
    Ok(BASE64.encode(Sha256::digest(&material)))
}

/// Signs an envelope in place.
///
/// Stamps a fresh ReplayProtect block, digests the canonical signed
/// object together with it, and embeds digest, signature and certificate
/// in the envelope's security block. Fails only if the payload is not
/// encodable.
pub fn sign(envelope: &mut Envelope, identity: &SigningIdentity) -> Result<(), SchemaError> {
    let replay = ReplayProtect::fresh();
    let digest = digest_material(envelope, &replay)?;
    let signature = identity.signing_key.sign(signed_info(&digest).as_bytes());

    envelope.security = Some(SecurityBlock {
        digest: Some(digest),
        signature: Some(BASE64.encode(signature.to_bytes())),
        certificate: Some(identity.certificate.to_base64()),
        replay_protect: Some(replay),
    });
    Ok(())
}

/// Verifies a signed envelope against a trust lookup.
///
/// Recomputes the canonical digest, verifies the signature with the key
/// from the embedded certificate, and confirms the certificate's
/// fingerprint matches `lookup(party_id)`. All failure modes surface as
/// the same uniform [`SecurityError`]; the specific reason goes to the
/// debug log only.
pub fn verify(envelope: &Envelope, lookup: &FingerprintLookup) -> Result<(), SecurityError> {
    let certificate = check_signature(envelope)?;

    let Some(principal) = envelope.party_id() else {
        return fail("message names no trust principal");
    };
    let Some(expected) = lookup(principal) else {
        return fail("no fingerprint on record for principal");
    };
    if !expected.eq_ignore_ascii_case(&certificate.fingerprint()) {
        return fail("fingerprint mismatch");
    }
    Ok(())
}

/// Verifies a signed envelope against one pinned fingerprint.
///
/// Used where the peer's identity is known out of band (a client
/// checking its server's responses) and the envelope itself names no
/// trust principal. Same uniform failure behavior as [`verify`].
pub fn verify_with_fingerprint(envelope: &Envelope, expected: &str) -> Result<(), SecurityError> {
    let certificate = check_signature(envelope)?;
    if !expected.eq_ignore_ascii_case(&certificate.fingerprint()) {
        return fail("fingerprint mismatch");
    }
    Ok(())
}

/// Digest and signature checks common to both verify entry points.
/// Returns the embedded certificate on success so the caller can pin
/// its fingerprint.
fn check_signature(envelope: &Envelope) -> Result<Certificate, SecurityError> {
    fn fail_cert(reason: &str) -> Result<Certificate, SecurityError> {
        debug!(%reason, "signature verification failed");
        Err(SecurityError)
    }
    let Some(security) = &envelope.security else {
        return fail_cert("message carries no signature");
    };
    let (Some(digest), Some(signature_b64), Some(certificate_b64)) = (
        security.digest.as_deref(),
        security.signature.as_deref(),
        security.certificate.as_deref(),
    ) else {
        return fail_cert("incomplete security block");
    };

    let replay = security.replay_protect.clone().unwrap_or_default();
    let recomputed = match digest_material(envelope, &replay) {
        Ok(d) => d,
        Err(_) => return fail_cert("payload not canonicalizable"),
    };
    if recomputed != digest {
        return fail_cert("digest mismatch");
    }

    let certificate = match Certificate::from_base64(certificate_b64) {
        Ok(c) => c,
        Err(_) => return fail_cert("certificate undecodable"),
    };
    let signature_bytes = match BASE64.decode(signature_b64.trim()) {
        Ok(b) if b.len() == SIGNATURE_LENGTH => b,
        _ => return fail_cert("signature value undecodable"),
    };
    let mut raw = [0u8; SIGNATURE_LENGTH];
    raw.copy_from_slice(&signature_bytes);
    let signature = Ed25519Signature::from_bytes(&raw);
    if certificate
        .verifying_key
        .verify(signed_info(digest).as_bytes(), &signature)
        .is_err()
    {
        return fail_cert("signature mismatch");
    }

    Ok(certificate)
}

fn fail(reason: &str) -> Result<(), SecurityError> {
    debug!(%reason, "signature verification failed");
    Err(SecurityError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Payload, Poll};

    fn poll_envelope() -> Envelope {
        Envelope::new(
            "req-1",
            Payload::Poll(Poll {
                ven_id: "ven123".to_string(),
            }),
        )
    }

    fn lookup_for(identity: &SigningIdentity) -> FingerprintLookup {
        let fingerprint = identity.fingerprint();
        Arc::new(move |_ven_id: &str| Some(fingerprint.clone()))
    }

    #[test]
    fn test_sign_then_verify() {
        let identity = SigningIdentity::generate("ven123");
        let mut envelope = poll_envelope();
        sign(&mut envelope, &identity).unwrap();
        assert!(verify(&envelope, &lookup_for(&identity)).is_ok());
    }

    #[test]
    fn test_verify_with_pinned_fingerprint() {
        let identity = SigningIdentity::generate("vtn-1");
        // A response payload names no party; pin verification still works.
        let mut envelope = Envelope::new(
            "req-1",
            Payload::Response(crate::messages::ResponsePayload {
                response: crate::messages::EiResponse::ok(),
                ven_id: None,
            }),
        );
        sign(&mut envelope, &identity).unwrap();

        assert!(verify_with_fingerprint(&envelope, &identity.fingerprint()).is_ok());
        let other = SigningIdentity::generate("vtn-1");
        assert_eq!(
            verify_with_fingerprint(&envelope, &other.fingerprint()),
            Err(SecurityError)
        );
        // The principal-based entry point fails on the same envelope.
        assert_eq!(
            verify(&envelope, &lookup_for(&identity)),
            Err(SecurityError)
        );
    }

    #[test]
    fn test_verify_survives_wire_roundtrip() {
        let identity = SigningIdentity::generate("ven123");
        let mut envelope = poll_envelope();
        sign(&mut envelope, &identity).unwrap();

        let xml = codec::encode(&envelope).unwrap();
        let decoded = codec::decode(&xml).unwrap();
        assert!(verify(&decoded, &lookup_for(&identity)).is_ok());
    }

    #[test]
    fn test_altered_signature_value_fails() {
        let identity = SigningIdentity::generate("ven123");
        let mut envelope = poll_envelope();
        sign(&mut envelope, &identity).unwrap();

        let security = envelope.security.as_mut().unwrap();
        let mut bytes = BASE64
            .decode(security.signature.as_deref().unwrap())
            .unwrap();
        bytes[0] ^= 0x01; // single bit flip
        security.signature = Some(BASE64.encode(&bytes));

        assert_eq!(
            verify(&envelope, &lookup_for(&identity)),
            Err(SecurityError)
        );
    }

    #[test]
    fn test_tampered_payload_fails() {
        let identity = SigningIdentity::generate("ven123");
        let mut envelope = poll_envelope();
        sign(&mut envelope, &identity).unwrap();

        envelope.payload = Payload::Poll(Poll {
            ven_id: "ven999".to_string(),
        });
        let lookup: FingerprintLookup = {
            let fingerprint = identity.fingerprint();
            Arc::new(move |_| Some(fingerprint.clone()))
        };
        assert_eq!(verify(&envelope, &lookup), Err(SecurityError));
    }

    #[test]
    fn test_tampered_replay_protect_fails() {
        // The signature covers the ReplayProtect block; swapping the
        // nonce after signing must invalidate it.
        let identity = SigningIdentity::generate("ven123");
        let mut envelope = poll_envelope();
        sign(&mut envelope, &identity).unwrap();

        let replay = envelope
            .security
            .as_mut()
            .unwrap()
            .replay_protect
            .as_mut()
            .unwrap();
        replay.nonce = Some("0000000000000000".to_string());

        assert_eq!(
            verify(&envelope, &lookup_for(&identity)),
            Err(SecurityError)
        );
    }

    #[test]
    fn test_fingerprint_mismatch_fails_uniformly() {
        let identity = SigningIdentity::generate("ven123");
        let other = SigningIdentity::generate("ven123");
        let mut envelope = poll_envelope();
        sign(&mut envelope, &identity).unwrap();

        // Valid signature from a real key, but the trust source expects
        // a different certificate.
        let err = verify(&envelope, &lookup_for(&other)).unwrap_err();
        assert_eq!(err.to_string(), "Invalid Signature");
    }

    #[test]
    fn test_unknown_principal_fails() {
        let identity = SigningIdentity::generate("ven123");
        let mut envelope = poll_envelope();
        sign(&mut envelope, &identity).unwrap();

        let lookup: FingerprintLookup = Arc::new(|_| None);
        assert_eq!(verify(&envelope, &lookup), Err(SecurityError));
    }

    #[test]
    fn test_unsigned_envelope_fails() {
        let identity = SigningIdentity::generate("ven123");
        let envelope = poll_envelope();
        assert_eq!(
            verify(&envelope, &lookup_for(&identity)),
            Err(SecurityError)
        );
    }

    #[test]
    fn test_certificate_roundtrip() {
        let identity = SigningIdentity::generate("vtn-1");
        let cert = identity.certificate();
        let restored = Certificate::from_base64(&cert.to_base64()).unwrap();
        assert_eq!(&restored, cert);
        assert_eq!(restored.subject(), "vtn-1");
    }

    #[test]
    fn test_fingerprint_format() {
        let identity = SigningIdentity::generate("ven123");
        let fingerprint = identity.fingerprint();

        // Ten upper-hex byte pairs separated by colons.
        assert_eq!(fingerprint.len(), 29);
        assert_eq!(fingerprint.matches(':').count(), 9);
        for group in fingerprint.split(':') {
            assert_eq!(group.len(), 2);
            assert!(group
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_truncated_certificate_is_rejected() {
        let identity = SigningIdentity::generate("ven123");
        let mut bytes = identity.certificate().to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(Certificate::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let identity = SigningIdentity::generate("ven123");
        let debug = format!("{identity:?}");
        assert!(debug.contains("REDACTED"));
        assert!(debug.contains("ven123"));
    }
}
