//! # DevCert - Deterministic Device Certificate Issuance
//!
//! DevCert turns PKCS#10 certificate signing requests from devices into X.509
//! certificates signed by a CA. It is built entirely with rustcrypto libraries.
//!
//! Issuance is deterministic: the serial number is derived from the device's
//! public key and the hour the certificate becomes valid, so the same request
//! issued within the same hour by the same CA always yields the same
//! certificate. No serial counter or database is needed.
//!
//! ## Supported Key Types
//!
//! - **Devices**: ECDSA P-256
//! - **CAs**: ECDSA P-256 and RSA (signing with SHA-256)
//!
//! ## Key Features
//!
//! - **Deterministic serials**: SHA-256 of the device key and a packed issue
//!   date, see [`serial`]
//! - **Verified requests**: a CSR's fields are only used after its
//!   self-signature checks out
//! - **Key identifiers**: every certificate gets a Subject Key Identifier and an
//!   Authority Key Identifier chained to the CA
//! - **Extension policy**: copy all requested extensions or only an allow-list
//! - **Format Flexibility**: PEM or DER for requests, certificates and keys
//!
//! ## Quick Start
//!
//! ### Issuing a Device Certificate
//!
//! ```rust,no_run
//! use devcert::{
//!     cert::{Certificate, params::{CertificationRequestInfo, DistinguishedName, Validity}},
//!     csr::CertificateRequest,
//!     issuer::{Issuer, IssuerIdentity},
//!     key::KeyPair,
//!     policy::IssuancePolicy,
//! };
//! use time::OffsetDateTime;
//!
//! # fn main() -> Result<(), devcert::error::DevCertError> {
//! // CA
//! let ca_key = KeyPair::generate_ecdsa_p256();
//! let ca_info = CertificationRequestInfo::builder()
//!     .subject(
//!         DistinguishedName::builder()
//!             .common_name("Example Signer".to_string())
//!             .organization("Example Corp".to_string())
//!             .build(),
//!     )
//!     .is_ca(true)
//!     .build();
//! let ca_cert = Certificate::new_self_signed(&ca_info, &ca_key, Validity::for_days(3650))?;
//! let ca = IssuerIdentity::new(ca_cert, ca_key)?;
//!
//! // Device
//! let device_key = KeyPair::generate_ecdsa_p256();
//! let device_info = CertificationRequestInfo::builder()
//!     .subject(
//!         DistinguishedName::builder()
//!             .common_name("Example Device".to_string())
//!             .build(),
//!     )
//!     .build();
//! let csr = CertificateRequest::build(&device_info, &device_key)?;
//!
//! let cert = ca.issue(&csr, OffsetDateTime::now_utc(), &IssuancePolicy::default())?;
//! println!("device {}:\n{}", cert.device_id()?, cert.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing from PEM
//!
//! ```rust,no_run
//! use devcert::{cert::Certificate, issuer::issue_certificate_pem, key::KeyPair};
//! use time::OffsetDateTime;
//!
//! # fn main() -> Result<(), devcert::error::DevCertError> {
//! let ca_cert = Certificate::from_bytes(&std::fs::read("ca.pem").unwrap())?;
//! let ca_key = KeyPair::load(&std::fs::read("ca.key").unwrap(), None)?;
//! let csr = std::fs::read("device.csr").unwrap();
//!
//! let pem = issue_certificate_pem(&csr, &ca_cert, &ca_key, OffsetDateTime::now_utc())?;
//! println!("{pem}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`error::DevCertError`]:
//!
//! ```rust
//! use devcert::{csr::CertificateRequest, error::DevCertError};
//!
//! match CertificateRequest::from_bytes(b"not a request") {
//!     Ok(_) => println!("Request decoded"),
//!     Err(DevCertError::MalformedRequest(msg)) => println!("Bad request: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`serial`]: Date packing and serial number derivation
//! - [`issuer`]: Certificate issuance from verified requests
//! - [`csr`]: Request decoding, building and signature verification
//! - [`cert`]: Certificate encoding/decoding, extensions and self-signed CAs
//! - [`policy`]: Issuance settings
//! - [`key`]: Key generation, loading and signing
//! - [`error`]: Error type
//! - [`tbs_certificate`]: Low-level certificate structure

pub mod cert;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod policy;
pub mod serial;
pub mod tbs_certificate;
