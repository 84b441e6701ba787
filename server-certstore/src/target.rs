//! Retrieval targets
//!
//! A target is the URI a certificate store is bound to. Only `https` URIs
//! describe an endpoint that presents a certificate chain; every other
//! scheme is accepted and simply has nothing to offer.

use crate::error::{CertStoreError, CertStoreResult};
use rustls::pki_types::ServerName;
use std::fmt;
use std::net::IpAddr;
use url::{Host, Url};

/// Schemes that run over TLS
pub const SECURE_SCHEMES: &[&str] = &["https"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    uri: Url,
    endpoint: Option<Endpoint>,
}

/// Where to open the TCP connection and which name to present in the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub server_name: ServerName<'static>,
}

impl Target {
    pub fn parse(uri: &str) -> CertStoreResult<Self> {
        let url = Url::parse(uri)
            .map_err(|e| CertStoreError::InvalidTarget(format!("{}: {}", uri, e)))?;
        Self::from_url(url)
    }

    pub fn from_url(uri: Url) -> CertStoreResult<Self> {
        if !SECURE_SCHEMES.contains(&uri.scheme()) {
            return Ok(Self { uri, endpoint: None });
        }

        let port = uri.port_or_known_default().ok_or_else(|| {
            CertStoreError::InvalidTarget(format!("{}: no port for scheme {}", uri, uri.scheme()))
        })?;

        let (host, server_name) = match uri.host() {
            Some(Host::Domain(domain)) => {
                let server_name = ServerName::try_from(domain.to_string()).map_err(|e| {
                    CertStoreError::InvalidTarget(format!("{}: invalid server name: {}", uri, e))
                })?;
                (domain.to_string(), server_name)
            }
            Some(Host::Ipv4(ip)) => (ip.to_string(), ServerName::from(IpAddr::V4(ip))),
            Some(Host::Ipv6(ip)) => (ip.to_string(), ServerName::from(IpAddr::V6(ip))),
            None => {
                return Err(CertStoreError::InvalidTarget(format!("{}: missing host", uri)));
            }
        };

        Ok(Self {
            endpoint: Some(Endpoint {
                host,
                port,
                server_name,
            }),
            uri,
        })
    }

    /// `https://host:port`
    pub fn secure(host: &str, port: u16) -> CertStoreResult<Self> {
        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        Self::parse(&format!("https://{}", authority))
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn is_secure(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Present exactly when the target is secure
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri.as_str())
    }
}

impl std::str::FromStr for Target {
    type Err = CertStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
