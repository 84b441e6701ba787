//! Retrieval configuration
//!
//! Controls how the capturing client reaches a server:
//! - Connect and handshake time bounds
//! - Offered TLS protocol versions
//! - Server Name Indication

use crate::error::{CertStoreError, CertStoreResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

static TLS12_ONLY: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS12];
static TLS13_ONLY: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// TLS protocol versions offered by the capturing client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersions {
    /// TLS 1.2 and TLS 1.3
    #[default]
    All,
    /// TLS 1.2 only
    Tls12,
    /// TLS 1.3 only
    Tls13,
}

impl ProtocolVersions {
    pub(crate) fn rustls_versions(self) -> &'static [&'static rustls::SupportedProtocolVersion] {
        match self {
            ProtocolVersions::All => rustls::ALL_VERSIONS,
            ProtocolVersions::Tls12 => TLS12_ONLY,
            ProtocolVersions::Tls13 => TLS13_ONLY,
        }
    }
}

impl FromStr for ProtocolVersions {
    type Err = CertStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "any" | "default" => Ok(ProtocolVersions::All),
            "tls12" | "tls1.2" | "tlsv1.2" => Ok(ProtocolVersions::Tls12),
            "tls13" | "tls1.3" | "tlsv1.3" => Ok(ProtocolVersions::Tls13),
            _ => Err(CertStoreError::Configuration(format!(
                "Unknown TLS protocol versions: {}. Valid options: all, tls12, tls13",
                s
            ))),
        }
    }
}

fn parse_flag(name: &str, value: &str) -> CertStoreResult<bool> {
    value.trim().parse().map_err(|_| {
        CertStoreError::Configuration(format!("Invalid {}: {}. Valid options: true, false", name, value))
    })
}

/// Certificate store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertStoreConfig {
    /// Upper bound for establishing the TCP connection
    pub connect_timeout: Duration,

    /// Upper bound for the TLS handshake and the closing exchange
    pub handshake_timeout: Duration,

    /// Protocol versions offered in the ClientHello
    pub protocol_versions: ProtocolVersions,

    /// Send SNI for DNS-named targets. IP targets never carry SNI.
    pub enable_sni: bool,
}

impl Default for CertStoreConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(30),
            protocol_versions: ProtocolVersions::All,
            enable_sni: true,
        }
    }
}

impl CertStoreConfig {
    /// Create a configuration from environment variables
    pub fn from_env() -> CertStoreResult<Self> {
        let mut config = Self::default();

        if let Ok(seconds) = std::env::var("SSLSERVER_CONNECT_TIMEOUT_SECONDS") {
            config.connect_timeout = Duration::from_secs(seconds.parse().map_err(|e| {
                CertStoreError::Configuration(format!("Invalid connect timeout: {}", e))
            })?);
        }

        if let Ok(seconds) = std::env::var("SSLSERVER_HANDSHAKE_TIMEOUT_SECONDS") {
            config.handshake_timeout = Duration::from_secs(seconds.parse().map_err(|e| {
                CertStoreError::Configuration(format!("Invalid handshake timeout: {}", e))
            })?);
        }

        if let Ok(versions) = std::env::var("SSLSERVER_TLS_VERSIONS") {
            config.protocol_versions = versions.parse()?;
        }

        if let Ok(flag) = std::env::var("SSLSERVER_ENABLE_SNI") {
            config.enable_sni = parse_flag("SSLSERVER_ENABLE_SNI", &flag)?;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> CertStoreResult<()> {
        if self.connect_timeout.is_zero() {
            return Err(CertStoreError::Configuration(
                "Connect timeout must be greater than zero".to_string(),
            ));
        }

        if self.handshake_timeout.is_zero() {
            return Err(CertStoreError::Configuration(
                "Handshake timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_protocol_versions(mut self, versions: ProtocolVersions) -> Self {
        self.protocol_versions = versions;
        self
    }
}
