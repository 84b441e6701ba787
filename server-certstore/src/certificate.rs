//! Certificate values
//!
//! The capture path treats certificates as opaque DER blobs. Parsing only
//! happens on demand, for attribute selectors and for display.

use crate::error::{CertStoreError, CertStoreResult};
use chrono::{DateTime, Utc};
use rustls::pki_types::CertificateDer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::{FromDer, X509Certificate};

const PEM_TAG: &str = "CERTIFICATE";

/// A DER-encoded X.509 certificate as presented by a peer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Certificate(CertificateDer<'static>);

impl Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self(CertificateDer::from(der.into()))
    }

    /// Parse a single PEM `CERTIFICATE` block
    pub fn from_pem(input: &str) -> CertStoreResult<Self> {
        let block = pem::parse(input)
            .map_err(|e| CertStoreError::CertificateParse(format!("Invalid PEM: {}", e)))?;
        Self::from_pem_block(block)
    }

    /// Parse every `CERTIFICATE` block of a PEM bundle, keeping file order
    pub fn parse_pem_bundle(input: &str) -> CertStoreResult<Vec<Self>> {
        pem::parse_many(input)
            .map_err(|e| CertStoreError::CertificateParse(format!("Invalid PEM bundle: {}", e)))?
            .into_iter()
            .map(Self::from_pem_block)
            .collect()
    }

    fn from_pem_block(block: pem::Pem) -> CertStoreResult<Self> {
        if block.tag() != PEM_TAG {
            return Err(CertStoreError::CertificateParse(format!(
                "Expected a {} PEM block, found {}",
                PEM_TAG,
                block.tag()
            )));
        }
        Ok(Self::from_der(block.into_contents()))
    }

    pub fn as_der(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new(PEM_TAG, self.as_der().to_vec()))
    }

    /// Lowercase hex SHA-256 over the DER encoding
    pub fn fingerprint_sha256(&self) -> String {
        hex::encode(Sha256::digest(self.as_der()))
    }

    /// Decode the X.509 fields used for selection and display
    pub fn info(&self) -> CertStoreResult<CertificateInfo> {
        let (_rem, cert) = X509Certificate::from_der(self.as_der())
            .map_err(|e| CertStoreError::CertificateParse(format!("Invalid X.509 certificate: {}", e)))?;

        let not_before = DateTime::<Utc>::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .ok_or_else(|| CertStoreError::CertificateParse("Invalid notBefore timestamp".to_string()))?;
        let not_after = DateTime::<Utc>::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| CertStoreError::CertificateParse("Invalid notAfter timestamp".to_string()))?;

        let mut dns_names = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    dns_names.push((*dns).to_string());
                }
            }
        }

        let is_ca = matches!(cert.basic_constraints(), Ok(Some(bc)) if bc.value.ca);

        Ok(CertificateInfo {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: hex::encode(cert.raw_serial()),
            not_before,
            not_after,
            is_ca,
            dns_names,
            fingerprint_sha256: self.fingerprint_sha256(),
        })
    }
}

impl From<CertificateDer<'_>> for Certificate {
    fn from(der: CertificateDer<'_>) -> Self {
        Self(der.into_owned())
    }
}

impl From<Certificate> for CertificateDer<'static> {
    fn from(cert: Certificate) -> Self {
        cert.0
    }
}

impl AsRef<[u8]> for Certificate {
    fn as_ref(&self) -> &[u8] {
        self.as_der()
    }
}

/// Decoded view of a certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    /// Big-endian serial number as lowercase hex
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub is_ca: bool,
    pub dns_names: Vec<String>,
    pub fingerprint_sha256: String,
}

impl CertificateInfo {
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}
