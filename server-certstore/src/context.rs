//! Capturing trust context
//!
//! Bundles a [`HandshakeCapturer`] with the client configuration that routes
//! every server certificate decision through it. The process-wide context is
//! built on first use from [`CertStoreConfig::from_env`] and never changes
//! afterwards; if building it fails, every retrieval that relies on it fails
//! with [`CertStoreError::TrustContextUnavailable`].

use crate::capture::HandshakeCapturer;
use crate::config::CertStoreConfig;
use crate::error::{CertStoreError, CertStoreResult};
use lazy_static::lazy_static;
use rustls::client::Resumption;
use rustls::ClientConfig;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

lazy_static! {
    static ref GLOBAL_CONTEXT: Result<Arc<TrustContext>, String> = CertStoreConfig::from_env()
        .and_then(TrustContext::new)
        .map(Arc::new)
        .map_err(|e| e.to_string());
}

pub struct TrustContext {
    capturer: Arc<HandshakeCapturer>,
    connector: TlsConnector,
    config: CertStoreConfig,
}

impl TrustContext {
    /// Build a context with its own capturer
    pub fn new(config: CertStoreConfig) -> CertStoreResult<Self> {
        config.validate()?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let capturer = Arc::new(HandshakeCapturer::new(&provider));

        let mut client_config = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(config.protocol_versions.rustls_versions())
            .map_err(|e| CertStoreError::TrustContextUnavailable(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(capturer.clone())
            .with_no_client_auth();

        // A resumed session skips certificate verification, so nothing would be captured.
        client_config.resumption = Resumption::disabled();
        client_config.enable_sni = config.enable_sni;

        Ok(Self {
            capturer,
            connector: TlsConnector::from(Arc::new(client_config)),
            config,
        })
    }

    /// The lazily built process-wide context
    pub fn global() -> CertStoreResult<Arc<TrustContext>> {
        match &*GLOBAL_CONTEXT {
            Ok(context) => Ok(Arc::clone(context)),
            Err(reason) => Err(CertStoreError::TrustContextUnavailable(reason.clone())),
        }
    }

    pub fn capturer(&self) -> &HandshakeCapturer {
        &self.capturer
    }

    pub fn config(&self) -> &CertStoreConfig {
        &self.config
    }

    pub(crate) fn connector(&self) -> &TlsConnector {
        &self.connector
    }
}

impl std::fmt::Debug for TrustContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustContext")
            .field("capturer", &self.capturer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
