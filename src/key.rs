use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::signature::SignatureEncoding;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::DevCertError;

pub type Result<T> = std::result::Result<T, DevCertError>;

/// Width in bytes of one P-256 coordinate.
pub const P256_COORDINATE_SIZE: usize = 32;

/// Supported signing keys.
///
/// Device keys are always P-256. CA keys may be P-256 or RSA; both sign with a
/// SHA-256 based scheme.
#[derive(Debug, Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        Ok(Self::from_rsa(private))
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        Self::from_p256(signing_key)
    }

    fn from_rsa(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }

    fn from_p256(signing_key: P256SigningKey) -> Self {
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Loads a private key from PEM or DER bytes.
    ///
    /// Accepted encodings: PKCS#8 (`PRIVATE KEY`), encrypted PKCS#8
    /// (`ENCRYPTED PRIVATE KEY`), SEC1 (`EC PRIVATE KEY`) and PKCS#1
    /// (`RSA PRIVATE KEY`). Bare DER is read as PKCS#8, or as encrypted PKCS#8
    /// when a passphrase is given.
    pub fn load(bytes: &[u8], passphrase: Option<&str>) -> Result<Self> {
        match pem::parse(bytes) {
            Ok(block) => {
                debug!(label = block.tag(), "loading PEM private key");
                match block.tag() {
                    "PRIVATE KEY" => Self::from_pkcs8_der(block.contents()),
                    "ENCRYPTED PRIVATE KEY" => {
                        let passphrase = passphrase.ok_or(DevCertError::WrongPassphrase)?;
                        Self::from_encrypted_pkcs8_der(block.contents(), passphrase)
                    }
                    "EC PRIVATE KEY" => {
                        let secret = p256::SecretKey::from_sec1_der(block.contents())
                            .map_err(|e| DevCertError::InvalidKeyMaterial(e.to_string()))?;
                        Ok(Self::from_p256(P256SigningKey::from(secret)))
                    }
                    "RSA PRIVATE KEY" => {
                        let private = RsaPrivateKey::from_pkcs1_der(block.contents())
                            .map_err(|e| DevCertError::InvalidKeyMaterial(e.to_string()))?;
                        Ok(Self::from_rsa(private))
                    }
                    other => Err(DevCertError::InvalidKeyMaterial(format!(
                        "unsupported PEM label: {other}"
                    ))),
                }
            }
            Err(_) => match passphrase {
                Some(passphrase) => Self::from_encrypted_pkcs8_der(bytes, passphrase),
                None => Self::from_pkcs8_der(bytes),
            },
        }
    }

    /// Imports an unencrypted PKCS#8 PEM private key.
    pub fn import_from_pkcs8_pem(pem_str: &str) -> Result<Self> {
        let block = pem::parse(pem_str)?;
        if block.tag() != "PRIVATE KEY" {
            return Err(DevCertError::InvalidKeyMaterial(format!(
                "expected PRIVATE KEY, found {}",
                block.tag()
            )));
        }
        Self::from_pkcs8_der(block.contents())
    }

    fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(der)
            .map_err(|e| DevCertError::InvalidKeyMaterial(e.to_string()))?;

        match info.algorithm.oid {
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                let signing_key = P256SigningKey::from_pkcs8_der(der)
                    .map_err(|e| DevCertError::InvalidKeyMaterial(e.to_string()))?;
                Ok(Self::from_p256(signing_key))
            }
            const_oid::db::rfc5912::RSA_ENCRYPTION => {
                let private = <RsaPrivateKey as rsa::pkcs8::DecodePrivateKey>::from_pkcs8_der(der)
                    .map_err(|e| DevCertError::InvalidKeyMaterial(e.to_string()))?;
                Ok(Self::from_rsa(private))
            }
            oid => Err(DevCertError::InvalidKeyMaterial(format!(
                "unsupported key algorithm: {oid}"
            ))),
        }
    }

    fn from_encrypted_pkcs8_der(der: &[u8], passphrase: &str) -> Result<Self> {
        let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(der)
            .map_err(|e| DevCertError::InvalidKeyMaterial(e.to_string()))?;
        let document = encrypted
            .decrypt(passphrase)
            .map_err(|_| DevCertError::WrongPassphrase)?;
        Self::from_pkcs8_der(document.as_bytes())
    }

    /// Exports the private key as unencrypted PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        let pem = match self {
            KeyPair::Rsa { private, .. } => {
                rsa::pkcs8::EncodePrivateKey::to_pkcs8_pem(&**private, pkcs8::LineEnding::LF)
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                p256::SecretKey::from(signing_key).to_pkcs8_pem(pkcs8::LineEnding::LF)
            }
        }
        .map_err(|e| DevCertError::EncodingError(e.to_string()))?;
        Ok(pem.to_string())
    }

    /// Returns the SubjectPublicKeyInfo for the public half of this key.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        PublicKey::from_key_pair(self).to_spki()
    }

    /// The SHA-256 based algorithm this key signs certificates with.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
        }
    }

    /// Signs `data` and returns the signature in its X.509 encoding
    /// (DER `Ecdsa-Sig-Value` for ECDSA, raw octets for RSA).
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(*private.clone());
                let signature = signing_key
                    .try_sign(data)
                    .map_err(|e| DevCertError::EncodingError(e.to_string()))?;
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: p256::ecdsa::Signature = signing_key
                    .try_sign(data)
                    .map_err(|e| DevCertError::EncodingError(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

/// Public key of a certificate subject or issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
        }
    }

    /// Parses a SubjectPublicKeyInfo. Only P-256 and RSA keys are accepted.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        match spki.algorithm.oid {
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .and_then(|p| p.decode_as::<const_oid::ObjectIdentifier>().ok());
                if curve != Some(const_oid::db::rfc5912::SECP_256_R_1) {
                    return Err(DevCertError::InvalidKeyMaterial(
                        "only P-256 EC keys are supported".to_string(),
                    ));
                }
                let verifying_key =
                    P256VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())
                        .map_err(|e| DevCertError::InvalidKeyMaterial(e.to_string()))?;
                Ok(PublicKey::EcdsaP256(verifying_key))
            }
            const_oid::db::rfc5912::RSA_ENCRYPTION => {
                let public = RsaPublicKey::from_pkcs1_der(spki.subject_public_key.raw_bytes())
                    .map_err(|e| DevCertError::InvalidKeyMaterial(e.to_string()))?;
                Ok(PublicKey::Rsa(public))
            }
            oid => Err(DevCertError::InvalidKeyMaterial(format!(
                "unsupported public key algorithm: {oid}"
            ))),
        }
    }

    /// Converts the key to SubjectPublicKeyInfo.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)
            }
        }
        .map_err(|e| DevCertError::EncodingError(e.to_string()))
    }

    /// Returns the affine coordinates of an EC key.
    pub fn point(&self) -> Result<PublicKeyPoint> {
        match self {
            PublicKey::EcdsaP256(verifying_key) => {
                let encoded = p256::PublicKey::from(verifying_key).to_encoded_point(false);
                match (encoded.x(), encoded.y()) {
                    (Some(x), Some(y)) => PublicKeyPoint::from_coordinates(x, y),
                    _ => Err(DevCertError::InvalidKeyMaterial(
                        "public key is the identity point".to_string(),
                    )),
                }
            }
            PublicKey::Rsa(_) => Err(DevCertError::InvalidArgument(
                "RSA keys have no curve point".to_string(),
            )),
        }
    }

    /// Verifies a signature in X.509 encoding over `message` using SHA-256.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        match self {
            PublicKey::EcdsaP256(verifying_key) => {
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|e| DevCertError::InvalidSignature(e.to_string()))?;
                verifying_key
                    .verify(message, &signature)
                    .map_err(|e| DevCertError::InvalidSignature(e.to_string()))
            }
            PublicKey::Rsa(public) => {
                let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public.clone());
                let signature = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|e| DevCertError::InvalidSignature(e.to_string()))?;
                verifying_key
                    .verify(message, &signature)
                    .map_err(|e| DevCertError::InvalidSignature(e.to_string()))
            }
        }
    }
}

/// Affine coordinates of a P-256 public key, big-endian and fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKeyPoint {
    pub x: [u8; P256_COORDINATE_SIZE],
    pub y: [u8; P256_COORDINATE_SIZE],
}

impl PublicKeyPoint {
    /// Builds a point from big-endian coordinates, each exactly 32 bytes.
    pub fn from_coordinates(x: &[u8], y: &[u8]) -> Result<Self> {
        let x = x.try_into().map_err(|_| {
            DevCertError::InvalidArgument(format!("x coordinate must be 32 bytes, got {}", x.len()))
        })?;
        let y = y.try_into().map_err(|_| {
            DevCertError::InvalidArgument(format!("y coordinate must be 32 bytes, got {}", y.len()))
        })?;
        Ok(Self { x, y })
    }

    /// `x || y`, the 64-byte raw public key.
    pub fn to_bytes(&self) -> [u8; 2 * P256_COORDINATE_SIZE] {
        let mut out = [0u8; 2 * P256_COORDINATE_SIZE];
        out[..P256_COORDINATE_SIZE].copy_from_slice(&self.x);
        out[P256_COORDINATE_SIZE..].copy_from_slice(&self.y);
        out
    }
}
