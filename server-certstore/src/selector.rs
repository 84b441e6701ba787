//! Certificate and CRL selectors
//!
//! A selector is a pure predicate over one value. Passing `None` wherever an
//! `Option<&dyn CertSelector>` is expected means "match everything".

use crate::certificate::{Certificate, CertificateInfo};
use rustls::pki_types::CertificateRevocationListDer;

/// Predicate deciding whether a certificate is returned to the caller
pub trait CertSelector: Send + Sync {
    fn matches(&self, cert: &Certificate) -> bool;
}

impl<F> CertSelector for F
where
    F: Fn(&Certificate) -> bool + Send + Sync,
{
    fn matches(&self, cert: &Certificate) -> bool {
        self(cert)
    }
}

/// Predicate over revocation lists
pub trait CrlSelector: Send + Sync {
    fn matches(&self, crl: &CertificateRevocationListDer<'_>) -> bool;
}

impl<F> CrlSelector for F
where
    F: Fn(&CertificateRevocationListDer<'_>) -> bool + Send + Sync,
{
    fn matches(&self, crl: &CertificateRevocationListDer<'_>) -> bool {
        self(crl)
    }
}

/// Keep, in chain order, the certificates accepted by `selector`
pub fn select(chain: &[Certificate], selector: Option<&dyn CertSelector>) -> Vec<Certificate> {
    match selector {
        None => chain.to_vec(),
        Some(selector) => chain
            .iter()
            .filter(|cert| selector.matches(cert))
            .cloned()
            .collect(),
    }
}

/// Attribute selector for X.509 certificates
///
/// Every criterion that is set must match. A selector with no criteria
/// matches every certificate. Certificates that cannot be decoded never
/// satisfy an attribute criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct X509Selector {
    certificate: Option<Certificate>,
    fingerprint_sha256: Option<String>,
    subject: Option<String>,
    issuer: Option<String>,
    serial: Option<String>,
    ca: Option<bool>,
}

impl X509Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match exactly this certificate
    pub fn certificate(mut self, cert: Certificate) -> Self {
        self.certificate = Some(cert);
        self
    }

    /// Match the SHA-256 fingerprint; accepts `AB:CD:..` or plain hex
    pub fn fingerprint_sha256(mut self, fingerprint: &str) -> Self {
        self.fingerprint_sha256 = Some(normalize_hex(fingerprint));
        self
    }

    /// Match the subject in RFC 4514 form, e.g. `CN=example.com, O=Example`
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Match the serial number given as hex, with or without separators
    pub fn serial(mut self, serial: &str) -> Self {
        self.serial = Some(normalize_serial(serial));
        self
    }

    /// `true` keeps only CA certificates, `false` only end-entity ones
    pub fn ca(mut self, ca: bool) -> Self {
        self.ca = Some(ca);
        self
    }

    fn needs_decoding(&self) -> bool {
        self.subject.is_some() || self.issuer.is_some() || self.serial.is_some() || self.ca.is_some()
    }

    fn matches_info(&self, info: &CertificateInfo) -> bool {
        if let Some(subject) = &self.subject {
            if !names_equal(subject, &info.subject) {
                return false;
            }
        }
        if let Some(issuer) = &self.issuer {
            if !names_equal(issuer, &info.issuer) {
                return false;
            }
        }
        if let Some(serial) = &self.serial {
            if *serial != normalize_serial(&info.serial) {
                return false;
            }
        }
        if let Some(ca) = self.ca {
            if ca != info.is_ca {
                return false;
            }
        }
        true
    }
}

impl CertSelector for X509Selector {
    fn matches(&self, cert: &Certificate) -> bool {
        if let Some(expected) = &self.certificate {
            if expected != cert {
                return false;
            }
        }
        if let Some(fingerprint) = &self.fingerprint_sha256 {
            if *fingerprint != cert.fingerprint_sha256() {
                return false;
            }
        }
        if !self.needs_decoding() {
            return true;
        }
        match cert.info() {
            Ok(info) => self.matches_info(&info),
            Err(_) => false,
        }
    }
}

fn normalize_hex(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ':' | ' ' | '-'))
        .collect::<String>()
        .to_lowercase()
}

fn normalize_serial(value: &str) -> String {
    let hex = normalize_hex(value);
    let trimmed = hex.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

// Distinguished names compare attribute by attribute, ignoring spacing
// around separators and attribute-type case.
fn names_equal(expected: &str, actual: &str) -> bool {
    fn canonical(name: &str) -> Vec<String> {
        name.split(',')
            .map(|rdn| match rdn.split_once('=') {
                Some((ty, value)) => format!("{}={}", ty.trim().to_uppercase(), value.trim()),
                None => rdn.trim().to_string(),
            })
            .collect()
    }
    canonical(expected) == canonical(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};

    fn cert(cn: &str, ca: bool) -> Certificate {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.distinguished_name.push(DnType::OrganizationName, "Selector Tests");
        params.serial_number = Some(vec![0x1f, 0xa0].into());
        if ca {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        }
        let key = KeyPair::generate().unwrap();
        Certificate::from(params.self_signed(&key).unwrap().der().clone())
    }

    #[test]
    fn test_absent_selector_returns_whole_chain_in_order() {
        let chain = vec![cert("a", false), cert("b", true)];
        assert_eq!(select(&chain, None), chain);
    }

    #[test]
    fn test_closure_selector_keeps_order() {
        let a = cert("a", false);
        let b = cert("b", true);
        let c = cert("c", true);
        let chain = vec![a.clone(), b.clone(), c.clone()];

        let not_a = |candidate: &Certificate| candidate != &a;
        assert_eq!(select(&chain, Some(&not_a)), vec![b, c]);
    }

    #[test]
    fn test_selector_matching_nothing_is_empty() {
        let chain = vec![cert("a", false), cert("b", true)];
        let nothing = |_: &Certificate| false;
        assert!(select(&chain, Some(&nothing)).is_empty());
    }

    #[test]
    fn test_x509_selector_by_subject_and_ca() {
        let leaf = cert("leaf.example", false);
        let root = cert("Example Root", true);
        let chain = vec![leaf.clone(), root.clone()];

        let by_subject = X509Selector::new().subject("cn=Example Root,  O=Selector Tests");
        assert_eq!(select(&chain, Some(&by_subject)), vec![root.clone()]);

        let end_entities = X509Selector::new().ca(false);
        assert_eq!(select(&chain, Some(&end_entities)), vec![leaf]);

        let issued_by_root = X509Selector::new().issuer("CN=Example Root, O=Selector Tests");
        assert_eq!(select(&chain, Some(&issued_by_root)), vec![root]);
    }

    #[test]
    fn test_x509_selector_by_serial_and_fingerprint() {
        let leaf = cert("leaf", false);
        let other = cert("other", false);

        let by_serial = X509Selector::new().serial("1F:A0");
        assert!(by_serial.matches(&leaf));

        let by_fingerprint = X509Selector::new().fingerprint_sha256(&leaf.fingerprint_sha256().to_uppercase());
        assert!(by_fingerprint.matches(&leaf));
        assert!(!by_fingerprint.matches(&other));
    }

    #[test]
    fn test_x509_selector_exact_certificate() {
        let leaf = cert("leaf", false);
        let selector = X509Selector::new().certificate(leaf.clone());
        assert!(selector.matches(&leaf));
        assert!(!selector.matches(&cert("leaf", false)));
    }

    #[test]
    fn test_undecodable_certificate_never_matches_attributes() {
        let garbage = Certificate::from_der(vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(!X509Selector::new().subject("CN=x").matches(&garbage));
        assert!(X509Selector::new().matches(&garbage));
    }

    #[test]
    fn test_normalize_serial() {
        assert_eq!(normalize_serial("00:1F:a0"), "1fa0");
        assert_eq!(normalize_serial("000"), "0");
    }
}
