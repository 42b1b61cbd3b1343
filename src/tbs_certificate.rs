use der::Encode;
use der::asn1::{BitString, GeneralizedTime, UtcTime};
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::{CertificateInner, TbsCertificateInner};
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::params::{ExtensionParam, Validity};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::error::DevCertError;
use crate::key::KeyPair;
use crate::serial::SerialNumber;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The name of the certificate issuer, copied verbatim.
/// * `validity` - The certificate's validity period.
/// * `subject` - The name of the certificate subject, copied verbatim.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions in the order they are encoded.
pub struct TbsCertificate {
    pub serial_number: SerialNumber,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner, DevCertError> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>, _>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: self.serial_number.to_x509()?,
            signature: self.signature_algorithm.clone().into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(extensions),
        })
    }

    /// Signs the DER encoding of the TBS structure with `key`.
    pub fn sign(&self, key: &KeyPair) -> Result<Certificate, DevCertError> {
        let tbs_certificate = self.to_tbs_certificate_inner()?;
        let signature = key.sign_data(&tbs_certificate.to_der()?)?;

        let inner = CertificateInner {
            tbs_certificate,
            signature_algorithm: self.signature_algorithm.clone().into(),
            signature: BitString::from_bytes(&signature)?,
        };

        Ok(Certificate { inner })
    }
}

/// RFC 5280 4.1.2.5: UTCTime through 2049, GeneralizedTime from 2050 on.
fn to_x509_time(at: OffsetDateTime) -> Result<x509_cert::time::Time, DevCertError> {
    let system_time = std::time::SystemTime::from(at);
    let time = if at.year() < 2050 {
        x509_cert::time::Time::UtcTime(UtcTime::from_system_time(system_time)?)
    } else {
        x509_cert::time::Time::GeneralTime(GeneralizedTime::from_system_time(system_time)?)
    };
    Ok(time)
}
