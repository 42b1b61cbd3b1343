//! PKCS#10 certificate signing requests.
//!
//! A [`CertificateRequest`] is untrusted input. Its fields only become
//! available through [`VerifiedRequest`], which can only be obtained by
//! checking the request's self-signature.

use const_oid::AssociatedOid;
use der::asn1::{Any, BitString, SetOfVec};
use der::{Decode, Encode, EncodePem};
use tracing::debug;
use x509_cert::attr::Attribute;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{ExtendedKeyUsage, ToAndFromX509Extension};
use crate::cert::params::{CertificationRequestInfo, ExtensionParam};
use crate::error::DevCertError;
use crate::key::{KeyPair, PublicKey};

pub type Result<T> = std::result::Result<T, DevCertError>;

/// A decoded, not yet verified, certificate signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub inner: CertReq,
}

impl CertificateRequest {
    /// Decodes a DER request.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner =
            CertReq::from_der(der).map_err(|e| DevCertError::MalformedRequest(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Decodes a request from PEM (`CERTIFICATE REQUEST`) or DER bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match pem::parse(bytes) {
            Ok(block) if matches!(block.tag(), "CERTIFICATE REQUEST" | "NEW CERTIFICATE REQUEST") => {
                Self::from_der(block.contents())
            }
            Ok(block) => Err(DevCertError::MalformedRequest(format!(
                "expected CERTIFICATE REQUEST, found {}",
                block.tag()
            ))),
            Err(_) => Self::from_der(bytes),
        }
    }

    /// Creates a request for `key` and signs it with the same key.
    ///
    /// Extended key usages in `info` are added as an extension after
    /// `info.extensions`.
    pub fn build(info: &CertificationRequestInfo, key: &KeyPair) -> Result<Self> {
        let mut extensions = info
            .extensions
            .iter()
            .map(ExtensionParam::to_x509)
            .collect::<Result<Vec<_>>>()?;
        if !info.usages.is_empty() {
            let eku = ExtendedKeyUsage {
                usage: info.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(eku, false)?.to_x509()?);
        }

        let mut attributes = Vec::new();
        if !extensions.is_empty() {
            let value = Any::encode_from(&ExtensionReq(extensions))?;
            attributes.push(Attribute {
                oid: ExtensionReq::OID,
                values: SetOfVec::try_from(vec![value])?,
            });
        }

        let info = CertReqInfo {
            version: x509_cert::request::Version::V1,
            subject: info.subject.as_x509_name()?,
            public_key: key.as_spki()?,
            attributes: SetOfVec::try_from(attributes)?,
        };

        let signature = key.sign_data(&info.to_der()?)?;
        let inner = CertReq {
            info,
            algorithm: key.signature_algorithm().into(),
            signature: BitString::from_bytes(&signature)?,
        };

        Ok(Self { inner })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| DevCertError::EncodingError(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| DevCertError::EncodingError(e.to_string()))
    }

    /// Checks the self-signature against the embedded public key.
    ///
    /// The signature algorithm must be SHA-256 based and match the key type.
    pub fn verify(&self) -> Result<VerifiedRequest> {
        let public_key = PublicKey::from_x509spki(&self.inner.info.public_key)
            .map_err(|e| DevCertError::InvalidSignature(e.to_string()))?;

        let algorithm = SignatureAlgorithm::try_from(&self.inner.algorithm)?;
        let matches_key = matches!(
            (&algorithm, &public_key),
            (SignatureAlgorithm::Sha256WithECDSA, PublicKey::EcdsaP256(_))
                | (SignatureAlgorithm::Sha256WithRSA, PublicKey::Rsa(_))
        );
        if !matches_key {
            return Err(DevCertError::InvalidSignature(format!(
                "signature algorithm {} does not match the request key",
                self.inner.algorithm.oid
            )));
        }

        let tbs = self.inner.info.to_der()?;
        public_key.verify(&tbs, self.inner.signature.raw_bytes())?;

        let extensions = requested_extensions(&self.inner.info)?;
        debug!(
            subject = %self.inner.info.subject,
            extensions = extensions.len(),
            "certificate request signature verified"
        );

        Ok(VerifiedRequest {
            subject: self.inner.info.subject.clone(),
            public_key_info: self.inner.info.public_key.clone(),
            public_key,
            extensions,
        })
    }
}

/// Collects the extensions of every PKCS#9 extensionRequest attribute, in
/// order.
fn requested_extensions(info: &CertReqInfo) -> Result<Vec<ExtensionParam>> {
    let mut extensions = Vec::new();

    for attribute in info.attributes.iter() {
        if attribute.oid != ExtensionReq::OID {
            continue;
        }
        for value in attribute.values.iter() {
            let request = ExtensionReq::from_der(&value.to_der()?)
                .map_err(|e| DevCertError::MalformedRequest(e.to_string()))?;
            extensions.extend(request.0.iter().map(ExtensionParam::from));
        }
    }

    Ok(extensions)
}

/// A request whose self-signature has been checked.
#[derive(Debug, Clone)]
pub struct VerifiedRequest {
    subject: Name,
    public_key_info: SubjectPublicKeyInfoOwned,
    public_key: PublicKey,
    extensions: Vec<ExtensionParam>,
}

impl VerifiedRequest {
    pub fn subject(&self) -> &Name {
        &self.subject
    }

    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.public_key_info
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Requested extensions in request order.
    pub fn extensions(&self) -> &[ExtensionParam] {
        &self.extensions
    }
}
