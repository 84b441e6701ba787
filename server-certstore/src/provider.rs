//! Provider metadata
//!
//! Describes the certificate store the way a security-provider registry
//! expects: a named, versioned provider offering exactly one service, the
//! `SSLServer` certificate store. How a registry discovers the provider is
//! up to the registry; this module only answers lookups by type and
//! algorithm.

use crate::certificate::Certificate;
use crate::error::{CertStoreError, CertStoreResult};
use crate::retriever::ChainRetriever;
use crate::selector::{CertSelector, CrlSelector};
use crate::target::Target;
use async_trait::async_trait;
use rustls::pki_types::CertificateRevocationListDer;
use serde::{Deserialize, Serialize};

/// Name of the provider
pub const PROVIDER_NAME: &str = "SSLServer";

pub const PROVIDER_VERSION: &str = "1.0.1";

pub const PROVIDER_INFO: &str = "SSLServer (CertStore)";

/// Algorithm name of the certificate store service
pub const STORE_TYPE: &str = "SSLServer";

// ============================================================================
// SERVICE DESCRIPTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    CertStore,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::CertStore => "CertStore",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub service_type: ServiceType,
    pub algorithm: String,
    pub implementation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub version: String,
    pub info: String,
    pub services: Vec<Service>,
}

/// Parameters a store instance is created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertStoreParameters {
    /// URI of the server whose chain is captured
    Uri(String),
    /// Directory server parameters, as used by LDAP-backed stores
    Ldap { server_name: String, port: u16 },
}

// ============================================================================
// CERTIFICATE STORE TRAIT
// ============================================================================

/// Certificate store as seen through a provider lookup
#[async_trait]
pub trait CertStore: Send + Sync {
    /// Algorithm the store was created for
    fn store_type(&self) -> &str;

    /// Certificates matching `selector`, or all of them for `None`
    async fn get_certificates(
        &self,
        selector: Option<&dyn CertSelector>,
    ) -> CertStoreResult<Vec<Certificate>>;

    /// Revocation lists matching `selector`
    async fn get_crls(
        &self,
        selector: Option<&dyn CrlSelector>,
    ) -> CertStoreResult<Vec<CertificateRevocationListDer<'static>>>;
}

#[async_trait]
impl CertStore for ChainRetriever {
    fn store_type(&self) -> &str {
        STORE_TYPE
    }

    async fn get_certificates(
        &self,
        selector: Option<&dyn CertSelector>,
    ) -> CertStoreResult<Vec<Certificate>> {
        self.fetch(selector).await
    }

    async fn get_crls(
        &self,
        selector: Option<&dyn CrlSelector>,
    ) -> CertStoreResult<Vec<CertificateRevocationListDer<'static>>> {
        self.fetch_revocations(selector)
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SslServerProvider;

impl SslServerProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn descriptor(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            name: PROVIDER_NAME.to_string(),
            version: PROVIDER_VERSION.to_string(),
            info: PROVIDER_INFO.to_string(),
            services: vec![Service {
                service_type: ServiceType::CertStore,
                algorithm: STORE_TYPE.to_string(),
                implementation: std::any::type_name::<ChainRetriever>().to_string(),
            }],
        }
    }

    /// Instantiate the service registered under `service_type` / `algorithm`
    pub fn get_instance(
        &self,
        service_type: &str,
        algorithm: &str,
        parameters: CertStoreParameters,
    ) -> CertStoreResult<Box<dyn CertStore>> {
        if !algorithm.eq_ignore_ascii_case(STORE_TYPE) {
            return Err(CertStoreError::NoSuchAlgorithm(format!(
                "{}.{} is not provided by {}",
                service_type, algorithm, PROVIDER_NAME
            )));
        }

        match service_type {
            "CertStore" => {
                let CertStoreParameters::Uri(uri) = parameters else {
                    return Err(CertStoreError::InvalidParameters(
                        "parameters must be a URI".to_string(),
                    ));
                };
                let target = Target::parse(&uri)?;
                Ok(Box::new(ChainRetriever::new(target)))
            }
            "CRL" => Err(CertStoreError::Unsupported("CRL lookup")),
            other => Err(CertStoreError::NoSuchAlgorithm(format!(
                "{}.{} is not provided by {}",
                other, algorithm, PROVIDER_NAME
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_advertises_one_cert_store() {
        let descriptor = SslServerProvider::new().descriptor();
        assert_eq!(descriptor.name, "SSLServer");
        assert_eq!(descriptor.version, "1.0.1");
        assert_eq!(descriptor.info, "SSLServer (CertStore)");
        assert_eq!(descriptor.services.len(), 1);
        assert_eq!(descriptor.services[0].service_type, ServiceType::CertStore);
        assert_eq!(descriptor.services[0].algorithm, STORE_TYPE);
    }

    #[test]
    fn test_get_instance_binds_uri() {
        let store = SslServerProvider::new()
            .get_instance("CertStore", "SSLServer", CertStoreParameters::Uri("https://example.com".into()))
            .unwrap();
        assert_eq!(store.store_type(), STORE_TYPE);
    }

    #[test]
    fn test_get_instance_rejects_non_uri_parameters() {
        let result = SslServerProvider::new().get_instance(
            "CertStore",
            "SSLServer",
            CertStoreParameters::Ldap {
                server_name: "ldap.example.com".into(),
                port: 389,
            },
        );
        assert!(matches!(result, Err(CertStoreError::InvalidParameters(_))));
    }

    #[test]
    fn test_unknown_lookups() {
        let provider = SslServerProvider::new();
        let params = || CertStoreParameters::Uri("https://example.com".into());

        assert!(matches!(
            provider.get_instance("CertStore", "LDAP", params()),
            Err(CertStoreError::NoSuchAlgorithm(_))
        ));
        assert!(matches!(
            provider.get_instance("KeyStore", "SSLServer", params()),
            Err(CertStoreError::NoSuchAlgorithm(_))
        ));
        assert!(matches!(
            provider.get_instance("CRL", "SSLServer", params()),
            Err(CertStoreError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_store_crls_are_unsupported() {
        let store = SslServerProvider::new()
            .get_instance("CertStore", "SSLServer", CertStoreParameters::Uri("https://example.com".into()))
            .unwrap();
        assert!(matches!(store.get_crls(None).await, Err(CertStoreError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_store_over_plain_http_is_empty() {
        let store = SslServerProvider::new()
            .get_instance("CertStore", "SSLServer", CertStoreParameters::Uri("http://example.com".into()))
            .unwrap();
        assert!(store.get_certificates(None).await.unwrap().is_empty());
    }
}
