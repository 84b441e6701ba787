#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic))]

//! Server certificate store
//!
//! Captures the certificate chain a TLS server presents during the handshake
//! and serves it through a certificate store interface. No trust is ever
//! established: every presented chain is accepted, recorded and returned.
//!
//! # Components
//!
//! - [`capture`]: the trust decision hook that records the presented chain
//! - [`context`]: client configuration routing handshakes through a capturer
//! - [`retriever`]: one connection attempt per query, with capture state reset
//! - [`selector`]: certificate and CRL predicates
//! - [`provider`]: provider metadata and store lookup
//!
//! # Example
//!
//! ```rust,no_run
//! use server_certstore::{ChainRetriever, Target, X509Selector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let retriever = ChainRetriever::new(Target::parse("https://example.com")?);
//!
//!     let chain = retriever.fetch(None).await?;
//!     println!("server presented {} certificates", chain.len());
//!
//!     let cas = retriever.fetch(Some(&X509Selector::new().ca(true))).await?;
//!     println!("{} of them are CAs", cas.len());
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod certificate;
pub mod config;
pub mod context;
pub mod error;
pub mod provider;
pub mod retriever;
pub mod selector;
pub mod target;

pub use capture::{CaptureSession, CaptureState, HandshakeCapturer};
pub use certificate::{Certificate, CertificateInfo};
pub use config::{CertStoreConfig, ProtocolVersions};
pub use context::TrustContext;
pub use error::*;
pub use provider::{
    CertStore, CertStoreParameters, ProviderDescriptor, Service, ServiceType, SslServerProvider,
    PROVIDER_INFO, PROVIDER_NAME, PROVIDER_VERSION, STORE_TYPE,
};
pub use retriever::ChainRetriever;
pub use selector::{select, CertSelector, CrlSelector, X509Selector};
pub use target::{Endpoint, Target, SECURE_SCHEMES};
