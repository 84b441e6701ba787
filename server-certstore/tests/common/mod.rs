//! Test utilities: a throwaway PKI and local TLS servers presenting its chain.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, SanType};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use server_certstore::{CertStoreConfig, Certificate, ChainRetriever, Target, TrustContext};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// Root, intermediate and leaf generated for one test
pub struct TestPki {
    pub root: CertificateDer<'static>,
    pub intermediate: CertificateDer<'static>,
    pub leaf: CertificateDer<'static>,
    pub leaf_key: PrivateKeyDer<'static>,
}

impl TestPki {
    pub fn generate(label: &str) -> Self {
        let mut root_params = CertificateParams::default();
        root_params
            .distinguished_name
            .push(DnType::CommonName, format!("{} Root CA", label));
        root_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let root_key = KeyPair::generate().expect("root key generation should succeed");
        let root = root_params
            .self_signed(&root_key)
            .expect("root self-signing should succeed");

        let mut intermediate_params = CertificateParams::default();
        intermediate_params
            .distinguished_name
            .push(DnType::CommonName, format!("{} Intermediate CA", label));
        intermediate_params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
        let intermediate_key = KeyPair::generate().expect("intermediate key generation should succeed");
        let intermediate = intermediate_params
            .signed_by(&intermediate_key, &root, &root_key)
            .expect("intermediate signing should succeed");

        let mut leaf_params = CertificateParams::default();
        leaf_params
            .distinguished_name
            .push(DnType::CommonName, "localhost");
        leaf_params.subject_alt_names = vec![SanType::DnsName(
            "localhost".try_into().expect("valid DNS name"),
        )];
        let leaf_key = KeyPair::generate().expect("leaf key generation should succeed");
        let leaf = leaf_params
            .signed_by(&leaf_key, &intermediate, &intermediate_key)
            .expect("leaf signing should succeed");

        Self {
            root: root.der().clone(),
            intermediate: intermediate.der().clone(),
            leaf: leaf.der().clone(),
            leaf_key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der())),
        }
    }

    /// Chain as the servers below present it, leaf first
    pub fn presented_chain(&self) -> Vec<Certificate> {
        vec![
            Certificate::from(self.leaf.clone()),
            Certificate::from(self.intermediate.clone()),
        ]
    }

    fn server_config(&self, require_client_auth: bool) -> ServerConfig {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ServerConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .expect("protocol versions should be supported");

        let builder = if require_client_auth {
            let mut roots = RootCertStore::empty();
            roots.add(self.root.clone()).expect("root should be accepted");
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .expect("client verifier should build");
            builder.with_client_cert_verifier(verifier)
        } else {
            builder.with_no_client_auth()
        };

        builder
            .with_single_cert(vec![self.leaf.clone(), self.intermediate.clone()], self.leaf_key.clone_key())
            .expect("server certificate should be accepted")
    }
}

/// TLS server presenting `pki`'s chain until the test ends
pub async fn spawn_tls_server(pki: &TestPki) -> SocketAddr {
    spawn_acceptor(TlsAcceptor::from(Arc::new(pki.server_config(false)))).await
}

/// TLS server that insists on a client certificate the capturing client never sends
pub async fn spawn_client_auth_server(pki: &TestPki) -> SocketAddr {
    spawn_acceptor(TlsAcceptor::from(Arc::new(pki.server_config(true)))).await
}

async fn spawn_acceptor(acceptor: TlsAcceptor) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let mut sink = Vec::new();
                    let _ = tls.read_to_end(&mut sink).await;
                }
            });
        }
    });

    addr
}

/// Plain TCP server answering every connection with an HTTP error
pub async fn spawn_plaintext_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = stream
                    .write_all(b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = stream.shutdown().await;
            });
        }
    });

    addr
}

/// TCP server that accepts connections and never says anything
pub async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

/// Port nobody listens on
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn test_config() -> CertStoreConfig {
    CertStoreConfig::default()
        .with_connect_timeout(Duration::from_secs(5))
        .with_handshake_timeout(Duration::from_secs(5))
}

pub fn context(config: CertStoreConfig) -> Arc<TrustContext> {
    Arc::new(TrustContext::new(config).expect("trust context should build"))
}

pub fn retriever(addr: SocketAddr, context: &Arc<TrustContext>) -> ChainRetriever {
    let target = Target::secure(&addr.ip().to_string(), addr.port()).expect("valid target");
    ChainRetriever::with_context(target, Arc::clone(context))
}
