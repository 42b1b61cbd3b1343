#![allow(dead_code)]

use devcert::cert::Certificate;
use devcert::cert::params::{
    CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity,
};
use devcert::csr::CertificateRequest;
use devcert::issuer::IssuerIdentity;
use devcert::key::KeyPair;
use time::macros::datetime;

pub const CA_COMMON_NAME: &str = "Example Signer FFFF";
pub const DEVICE_COMMON_NAME: &str = "Example Device";

fn ca_info() -> CertificationRequestInfo {
    CertificationRequestInfo::builder()
        .subject(
            DistinguishedName::builder()
                .common_name(CA_COMMON_NAME.to_string())
                .organization("Example Inc".to_string())
                .build(),
        )
        .is_ca(true)
        .build()
}

fn ca_validity() -> Validity {
    Validity {
        not_before: datetime!(2020-01-01 00:00 UTC),
        not_after: datetime!(9999-12-31 23:59:59 UTC),
    }
}

pub fn generate_ca() -> IssuerIdentity {
    let ca_key = KeyPair::generate_ecdsa_p256();
    let ca_cert = Certificate::new_self_signed(&ca_info(), &ca_key, ca_validity()).unwrap();
    IssuerIdentity::new(ca_cert, ca_key).unwrap()
}

pub fn generate_rsa_ca() -> IssuerIdentity {
    let ca_key = KeyPair::generate_rsa(2048).unwrap();
    let ca_cert = Certificate::new_self_signed(&ca_info(), &ca_key, ca_validity()).unwrap();
    IssuerIdentity::new(ca_cert, ca_key).unwrap()
}

pub fn device_csr_with(extensions: Vec<ExtensionParam>) -> (CertificateRequest, KeyPair) {
    let device_key = KeyPair::generate_ecdsa_p256();
    let info = CertificationRequestInfo::builder()
        .subject(
            DistinguishedName::builder()
                .common_name(DEVICE_COMMON_NAME.to_string())
                .organization("Example Inc".to_string())
                .build(),
        )
        .extensions(extensions)
        .build();
    let csr = CertificateRequest::build(&info, &device_key).unwrap();
    (csr, device_key)
}

pub fn device_csr() -> (CertificateRequest, KeyPair) {
    device_csr_with(vec![])
}
