use time::OffsetDateTime;
use tracing::{debug, info, warn};
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, ExtendedKeyUsage, SubjectKeyIdentifier, ToAndFromX509Extension,
};
use crate::cert::params::{ExtensionParam, Validity};
use crate::csr::CertificateRequest;
use crate::error::DevCertError;
use crate::key::{KeyPair, PublicKey};
use crate::policy::IssuancePolicy;
use crate::serial::{EncodedDates, MAX_SERIAL_SIZE};
use crate::tbs_certificate::TbsCertificate;

pub type Result<T> = std::result::Result<T, DevCertError>;

/// Represents an entity capable of issuing device certificates.
pub trait Issuer {
    /// Returns the name placed in the issuer field, the subject of the CA
    /// certificate.
    fn issuer_name(&self) -> &Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the key identifier that issued certificates chain to.
    fn authority_key_identifier(&self) -> Result<Vec<u8>>;

    /// Issues a certificate for a certificate signing request.
    ///
    /// # Arguments
    /// * `csr` - The request. Its self-signature is verified first; nothing is
    ///   issued for a request that fails verification.
    /// * `now` - The issuance time. The validity starts at the top of its hour.
    /// * `policy` - Serial, validity and extension settings.
    ///
    /// The certificate carries the requested extensions allowed by `policy`,
    /// followed by a Subject Key Identifier and an Authority Key Identifier,
    /// both non-critical. Key identifier extensions in the request are
    /// replaced, and only the first instance of a repeated extension is kept.
    fn issue(
        &self,
        csr: &CertificateRequest,
        now: OffsetDateTime,
        policy: &IssuancePolicy,
    ) -> Result<Certificate> {
        let request = csr.verify().inspect_err(|err| {
            warn!(error = %err, "rejecting certificate request");
        })?;

        let validity = Validity::starting_at_hour(now, policy.not_after)?;

        if policy.serial_size == 0 || policy.serial_size > MAX_SERIAL_SIZE {
            return Err(DevCertError::InvalidArgument(format!(
                "serial size must be 1..={MAX_SERIAL_SIZE} bytes, got {}",
                policy.serial_size
            )));
        }
        let point = request.public_key().point()?;
        let dates = EncodedDates::from_datetime(validity.not_before, policy.expire_years);
        let serial_number = policy
            .serial_source
            .derive(&point, &dates, policy.serial_size)?;
        debug!(serial = %serial_number, not_before = %validity.not_before, "derived serial number");

        let authority_key_id = self.authority_key_identifier()?;

        let mut extensions = Vec::with_capacity(request.extensions().len() + 2);
        for ext in request.extensions() {
            if ext.oid == SubjectKeyIdentifier::OID || ext.oid == AuthorityKeyIdentifier::OID {
                warn!(oid = %ext.oid, "replacing requested key identifier extension");
                continue;
            }
            if !policy.extensions.permits(&ext.oid) {
                warn!(oid = %ext.oid, critical = ext.critical, "dropping extension not allowed by policy");
                continue;
            }
            // RFC 5280 4.2: at most one instance of each extension
            if extensions.iter().any(|kept: &ExtensionParam| kept.oid == ext.oid) {
                warn!(oid = %ext.oid, "dropping repeated requested extension");
                continue;
            }
            if ext.oid == ExtendedKeyUsage::OID {
                match ext.to_extension::<ExtendedKeyUsage>() {
                    Ok(eku) => debug!(usages = ?eku.usage, "copying requested extended key usage"),
                    Err(err) => warn!(error = %err, "copying extended key usage with unrecognized purposes"),
                }
            } else {
                debug!(oid = %ext.oid, critical = ext.critical, "copying requested extension");
            }
            extensions.push(ext.clone());
        }
        extensions.push(ExtensionParam::from_extension(
            SubjectKeyIdentifier::from_public_key_info(request.public_key_info()),
            false,
        )?);
        extensions.push(ExtensionParam::from_extension(
            AuthorityKeyIdentifier {
                key_identifier: authority_key_id,
            },
            false,
        )?);

        let tbs_cert = TbsCertificate {
            serial_number,
            signature_algorithm: self.signing_key().signature_algorithm(),
            issuer: self.issuer_name().clone(),
            validity,
            subject: request.subject().clone(),
            subject_public_key_info: request.public_key_info().clone(),
            extensions,
        };

        let cert = tbs_cert.sign(self.signing_key())?;

        let device_id = match cert.subject_key_identifier() {
            Ok(Some(ski)) => hex::encode(ski.key_identifier),
            Ok(None) | Err(_) => {
                return Err(DevCertError::InternalInvariantViolation(
                    "issued certificate must carry exactly one subject key identifier".to_string(),
                ));
            }
        };

        info!(
            device_id = %device_id,
            subject = %cert.subject(),
            serial = %hex::encode(cert.serial_number()),
            "issued device certificate"
        );
        Ok(cert)
    }
}

/// A CA certificate together with its private key.
#[derive(Debug, Clone)]
pub struct IssuerIdentity {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl IssuerIdentity {
    /// Pairs a CA certificate with its key, checking that they belong together.
    pub fn new(cert: Certificate, key: KeyPair) -> Result<Self> {
        check_key_matches(&cert, &key)?;
        Ok(Self { cert, key })
    }
}

impl Issuer for IssuerIdentity {
    fn issuer_name(&self) -> &Name {
        self.cert.subject()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn authority_key_identifier(&self) -> Result<Vec<u8>> {
        chained_key_identifier(&self.cert)
    }
}

// Borrowed form used by the free functions below
struct BorrowedIssuer<'a> {
    cert: &'a Certificate,
    key: &'a KeyPair,
}

impl Issuer for BorrowedIssuer<'_> {
    fn issuer_name(&self) -> &Name {
        self.cert.subject()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn authority_key_identifier(&self) -> Result<Vec<u8>> {
        chained_key_identifier(self.cert)
    }
}

fn chained_key_identifier(ca_cert: &Certificate) -> Result<Vec<u8>> {
    let ski = ca_cert.subject_key_identifier()?.ok_or_else(|| {
        DevCertError::MissingExtension(format!(
            "CA certificate {} has no subject key identifier",
            ca_cert.subject()
        ))
    })?;
    Ok(ski.key_identifier)
}

fn check_key_matches(cert: &Certificate, key: &KeyPair) -> Result<()> {
    if cert.public_key()? != PublicKey::from_key_pair(key) {
        return Err(DevCertError::InvalidKeyMaterial(
            "private key does not match the CA certificate".to_string(),
        ));
    }
    Ok(())
}

/// Issues a device certificate with the default [`IssuancePolicy`].
pub fn issue_certificate(
    csr: &CertificateRequest,
    ca_cert: &Certificate,
    ca_key: &KeyPair,
    now: OffsetDateTime,
) -> Result<Certificate> {
    check_key_matches(ca_cert, ca_key)?;
    BorrowedIssuer {
        cert: ca_cert,
        key: ca_key,
    }
    .issue(csr, now, &IssuancePolicy::default())
}

/// Decodes a PEM or DER CSR, issues a certificate with the default policy and
/// returns it as PEM.
pub fn issue_certificate_pem(
    csr_bytes: &[u8],
    ca_cert: &Certificate,
    ca_key: &KeyPair,
    now: OffsetDateTime,
) -> Result<String> {
    let csr = CertificateRequest::from_bytes(csr_bytes)?;
    issue_certificate(&csr, ca_cert, ca_key, now)?.to_pem()
}
