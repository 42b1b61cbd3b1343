pub mod extensions;
pub mod params;

use crate::error::DevCertError;
pub type Result<T> = std::result::Result<T, DevCertError>;
use der::flagset::FlagSet;
use der::{Decode, Encode, EncodePem};
use extensions::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectKeyIdentifier,
    ToAndFromX509Extension,
};
use params::{CertificationRequestInfo, ExtensionParam, Validity};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::key::{KeyPair, PublicKey};
use crate::serial::{self, DEFAULT_SERIAL_SIZE, EncodedDates, SerialSource};
use crate::tbs_certificate::TbsCertificate;

/// Represents the supported signature algorithms for certificates.
///
/// Both use SHA-256 as the message digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            // RFC 4055 requires explicit NULL parameters for RSA.
            SignatureAlgorithm::Sha256WithRSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(der::asn1::AnyRef::NULL.into()),
            },
            SignatureAlgorithm::Sha256WithECDSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
        }
    }
}

impl TryFrom<&x509_cert::spki::AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = DevCertError;

    fn try_from(value: &x509_cert::spki::AlgorithmIdentifierOwned) -> Result<Self> {
        match value.oid {
            const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION => Ok(Self::Sha256WithRSA),
            const_oid::db::rfc5912::ECDSA_WITH_SHA_256 => Ok(Self::Sha256WithECDSA),
            oid => Err(DevCertError::InvalidSignature(format!(
                "unsupported signature algorithm: {oid}"
            ))),
        }
    }
}

/// Represents an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| DevCertError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| DevCertError::EncodingError(e.to_string()))
    }

    /// Decodes a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)?;
        Ok(Self { inner })
    }

    /// Decodes a certificate from PEM (`CERTIFICATE` block) or DER bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match pem::parse(bytes) {
            Ok(block) if block.tag() == "CERTIFICATE" => Self::from_der(block.contents()),
            Ok(block) => Err(DevCertError::DecodingError(format!(
                "expected CERTIFICATE, found {}",
                block.tag()
            ))),
            Err(_) => Self::from_der(bytes),
        }
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    /// Serial number as encoded, big-endian.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(self.public_key_info())
    }

    pub fn not_before(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_certificate.validity.not_before.to_system_time())
    }

    pub fn not_after(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_certificate.validity.not_after.to_system_time())
    }

    /// All extensions, in encoded order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ExtensionParam::from)
            .collect()
    }

    /// Returns the Subject Key Identifier, if the certificate carries exactly
    /// one.
    pub fn subject_key_identifier(&self) -> Result<Option<SubjectKeyIdentifier>> {
        let mut found = self
            .extensions()
            .into_iter()
            .filter(|ext| ext.oid == SubjectKeyIdentifier::OID);

        match (found.next(), found.next()) {
            (None, _) => Ok(None),
            (Some(ext), None) => Ok(Some(ext.to_extension()?)),
            (Some(_), Some(_)) => Err(DevCertError::DecodingError(
                "certificate has more than one subject key identifier".to_string(),
            )),
        }
    }

    /// The device identifier: lowercase hex of the Subject Key Identifier.
    pub fn device_id(&self) -> Result<String> {
        let ski = self.subject_key_identifier()?.ok_or_else(|| {
            DevCertError::MissingExtension("subject key identifier".to_string())
        })?;
        Ok(hex::encode(ski.key_identifier))
    }

    /// Verifies the certificate signature with the issuer's public key.
    pub fn verify_signature(&self, issuer_key: &PublicKey) -> Result<()> {
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)?;
        let tbs = self.inner.tbs_certificate.to_der()?;
        issuer_key.verify(&tbs, self.inner.signature.raw_bytes())
    }

    /// Creates a new self-signed certificate.
    ///
    /// The certificate carries basic constraints, a subject key identifier and,
    /// for CAs, key usage `keyCertSign | cRLSign`, so it can act as an issuer.
    /// The serial is derived the same way as for device certificates.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
    ) -> Result<Self> {
        let name = cert_info.subject.as_x509_name()?;
        let public_key_info = key.as_spki()?;

        let dates = EncodedDates::from_datetime(validity.not_before, 0);
        let serial_number = match PublicKey::from_key_pair(key) {
            public @ PublicKey::EcdsaP256(_) => {
                SerialSource::PublicKeyHash.derive(&public.point()?, &dates, DEFAULT_SERIAL_SIZE)?
            }
            // RSA keys have no curve point; hash the encoded key instead.
            PublicKey::Rsa(_) => {
                serial::hash_derived(&public_key_info.to_der()?, &dates, DEFAULT_SERIAL_SIZE)?
            }
        };

        let mut extensions = cert_info.extensions.clone();
        extensions.push(ExtensionParam::from_extension(
            BasicConstraints {
                is_ca: cert_info.is_ca,
                max_path_length: None,
            },
            true,
        )?);

        let mut key_usage_flags: FlagSet<KeyUsages> = FlagSet::default();
        if cert_info.is_ca {
            key_usage_flags |= KeyUsages::KeyCertSign;
            key_usage_flags |= KeyUsages::CRLSign;
        }
        if !cert_info.usages.is_empty() {
            key_usage_flags |= KeyUsages::DigitalSignature;
        }
        if !key_usage_flags.is_empty() {
            extensions.push(ExtensionParam::from_extension(KeyUsage(key_usage_flags), true)?);
        }

        if !cert_info.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_info.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        extensions.push(ExtensionParam::from_extension(
            SubjectKeyIdentifier::from_public_key_info(&public_key_info),
            false,
        )?);

        let tbs = TbsCertificate {
            serial_number,
            signature_algorithm: key.signature_algorithm(),
            issuer: name.clone(),
            validity,
            subject: name,
            subject_public_key_info: public_key_info,
            extensions,
        };

        tbs.sign(key)
    }
}
