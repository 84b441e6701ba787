//! Handshake capture
//!
//! [`HandshakeCapturer`] is installed as the server certificate verifier of
//! the capturing client configuration. It accepts whatever chain the server
//! presents and remembers it, so the retriever can read the chain back after
//! the connection attempt, whether or not the attempt succeeded.
//!
//! One capturer is shared by every retrieval that uses its trust context.
//! A retrieval must therefore hold a [`CaptureSession`] for the whole
//! connect / snapshot window: the session serializes attempts and resets the
//! capture state when it is dropped, on every exit path.

use crate::certificate::Certificate;
use crate::error::{CertStoreError, CertStoreResult};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme};
use tokio::sync::MutexGuard;
use tracing::trace;

/// What the trust decision hook has seen since the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureState {
    /// Leaf-first chain as presented by the server
    pub chain: Vec<Certificate>,
    /// Set once the hook ran, even if the presented chain was empty
    pub recorded: bool,
}

#[derive(Debug)]
pub struct HandshakeCapturer {
    state: parking_lot::Mutex<CaptureState>,
    gate: tokio::sync::Mutex<()>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl HandshakeCapturer {
    /// Handshake signatures are checked with the provider's algorithms
    pub fn new(provider: &CryptoProvider) -> Self {
        Self {
            state: parking_lot::Mutex::new(CaptureState::default()),
            gate: tokio::sync::Mutex::new(()),
            algorithms: provider.signature_verification_algorithms,
        }
    }

    /// Record `chain` and trust it. Never fails.
    pub fn decide(&self, chain: &[CertificateDer<'_>]) -> ServerCertVerified {
        let chain: Vec<Certificate> = chain.iter().cloned().map(Certificate::from).collect();
        trace!(chain_len = chain.len(), "recorded server certificate chain");

        let mut state = self.state.lock();
        state.chain = chain;
        state.recorded = true;
        ServerCertVerified::assertion()
    }

    /// Client certificates are never evaluated by a capturer.
    pub fn decide_client(&self, _chain: &[CertificateDer<'_>]) -> CertStoreResult<ClientCertVerified> {
        Err(CertStoreError::Unsupported("client certificate trust decisions"))
    }

    pub fn snapshot(&self) -> CaptureState {
        self.state.lock().clone()
    }

    pub fn reset(&self) {
        *self.state.lock() = CaptureState::default();
    }

    /// A capturer is not a trust anchor and names no issuers.
    pub fn accepted_issuers(&self) -> &[DistinguishedName] {
        &[]
    }

    /// Wait for exclusive use of the capture state.
    ///
    /// The state is cleared on entry and again when the session drops.
    pub async fn begin(&self) -> CaptureSession<'_> {
        let gate = self.gate.lock().await;
        self.reset();
        CaptureSession {
            capturer: self,
            _gate: gate,
        }
    }

    fn verify_tls12(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }
}

impl Default for HandshakeCapturer {
    fn default() -> Self {
        Self::new(&rustls::crypto::ring::default_provider())
    }
}

/// Exclusive hold on a capturer for one retrieval attempt
pub struct CaptureSession<'a> {
    capturer: &'a HandshakeCapturer,
    _gate: MutexGuard<'a, ()>,
}

impl CaptureSession<'_> {
    pub fn snapshot(&self) -> CaptureState {
        self.capturer.snapshot()
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        // Runs before the gate guard is released.
        self.capturer.reset();
    }
}

impl ServerCertVerifier for HandshakeCapturer {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let mut chain = Vec::with_capacity(intermediates.len() + 1);
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());
        Ok(self.decide(&chain))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.verify_tls12(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.verify_tls13(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

impl ClientCertVerifier for HandshakeCapturer {
    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        self.accepted_issuers()
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        let mut chain = Vec::with_capacity(intermediates.len() + 1);
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());
        self.decide_client(&chain)
            .map_err(|e| rustls::Error::General(e.to_string()))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.verify_tls12(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.verify_tls13(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
