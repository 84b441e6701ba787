//! Chain retrieval
//!
//! A [`ChainRetriever`] is bound to one [`Target`] and performs one TLS
//! connection attempt per [`fetch`](ChainRetriever::fetch). The outcome is
//! resolved against the capture state:
//!
//! - handshake completed: the captured chain is returned
//! - attempt failed after the chain was captured: the failure is dropped and
//!   the captured chain is returned
//! - attempt failed before any chain was seen: the failure is returned

use crate::capture::CaptureState;
use crate::certificate::Certificate;
use crate::context::TrustContext;
use crate::error::{CertStoreError, CertStoreResult, TimeoutStage};
use crate::selector::{select, CertSelector, CrlSelector};
use crate::target::{Endpoint, Target};
use rustls::pki_types::CertificateRevocationListDer;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
enum ContextSource {
    Global,
    Dedicated(Arc<TrustContext>),
}

#[derive(Debug, Clone)]
pub struct ChainRetriever {
    target: Target,
    context: ContextSource,
}

impl ChainRetriever {
    /// Retriever using the process-wide trust context
    pub fn new(target: Target) -> Self {
        Self {
            target,
            context: ContextSource::Global,
        }
    }

    /// Retriever using a caller-owned trust context
    pub fn with_context(target: Target, context: Arc<TrustContext>) -> Self {
        Self {
            target,
            context: ContextSource::Dedicated(context),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn context(&self) -> CertStoreResult<Arc<TrustContext>> {
        match &self.context {
            ContextSource::Global => TrustContext::global(),
            ContextSource::Dedicated(context) => Ok(Arc::clone(context)),
        }
    }

    /// Connect to the target and return the presented chain, leaf first,
    /// filtered by `selector` (`None` keeps every certificate).
    ///
    /// Attempts sharing a trust context run one at a time.
    #[instrument(skip_all, fields(target = %self.target))]
    pub async fn fetch(&self, selector: Option<&dyn CertSelector>) -> CertStoreResult<Vec<Certificate>> {
        let Some(endpoint) = self.target.endpoint() else {
            debug!("not a TLS target, no certificate chain to offer");
            return Ok(Vec::new());
        };

        let context = self.context()?;
        let state = {
            let session = context.capturer().begin().await;
            let attempt = self.attempt(&context, endpoint).await;
            (attempt, session.snapshot())
        };

        match state {
            (Ok(()), CaptureState { chain, .. }) => Ok(select(&chain, selector)),
            (Err(err), CaptureState { chain, recorded: true }) => {
                debug!(error = %err, chain_len = chain.len(), "attempt failed after the chain was captured");
                Ok(select(&chain, selector))
            }
            (Err(err), CaptureState { recorded: false, .. }) => Err(err),
        }
    }

    /// Revocation lists are never served by this store.
    pub fn fetch_revocations(
        &self,
        _selector: Option<&dyn CrlSelector>,
    ) -> CertStoreResult<Vec<CertificateRevocationListDer<'static>>> {
        Err(CertStoreError::Unsupported("CRL retrieval"))
    }

    async fn attempt(&self, context: &TrustContext, endpoint: &Endpoint) -> CertStoreResult<()> {
        let config = context.config();

        let tcp = timeout(
            config.connect_timeout,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        .map_err(|_| CertStoreError::Timeout {
            stage: TimeoutStage::Connect,
            after: config.connect_timeout,
        })?
        .map_err(|source| CertStoreError::ConnectionFailed {
            target: self.target.to_string(),
            source,
        })?;

        let handshake = async {
            let mut tls = context
                .connector()
                .connect(endpoint.server_name.clone(), tcp)
                .await
                .map_err(|source| CertStoreError::HandshakeFailed {
                    target: self.target.to_string(),
                    source,
                })?;
            debug!("handshake complete");

            tls.shutdown()
                .await
                .map_err(|source| CertStoreError::ConnectionFailed {
                    target: self.target.to_string(),
                    source,
                })
        };

        timeout(config.handshake_timeout, handshake)
            .await
            .map_err(|_| CertStoreError::Timeout {
                stage: TimeoutStage::Handshake,
                after: config.handshake_timeout,
            })?
    }
}
