//! Issues a device certificate.
//!
//! With no arguments a throwaway CA and device key are generated. Otherwise:
//!
//! ```text
//! cargo run --example issue -- <device.csr> <ca.pem> <ca.key> [passphrase]
//! ```

use anyhow::Context;
use devcert::cert::Certificate;
use devcert::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
use devcert::csr::CertificateRequest;
use devcert::issuer::issue_certificate_pem;
use devcert::key::KeyPair;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn generated_inputs() -> anyhow::Result<(Vec<u8>, Certificate, KeyPair)> {
    let ca_key = KeyPair::generate_ecdsa_p256();
    let ca_info = CertificationRequestInfo::builder()
        .subject(
            DistinguishedName::builder()
                .common_name("Demo Signer".to_string())
                .organization("Demo Inc".to_string())
                .build(),
        )
        .is_ca(true)
        .build();
    let ca_cert = Certificate::new_self_signed(&ca_info, &ca_key, Validity::for_days(3650))?;
    println!("CA Certificate PEM:\n{}", ca_cert.to_pem()?);

    let device_key = KeyPair::generate_ecdsa_p256();
    let device_info = CertificationRequestInfo::builder()
        .subject(
            DistinguishedName::builder()
                .common_name("demo-device-0001".to_string())
                .build(),
        )
        .build();
    let csr = CertificateRequest::build(&device_info, &device_key)?;

    Ok((csr.to_pem()?.into_bytes(), ca_cert, ca_key))
}

fn file_inputs(args: &[String]) -> anyhow::Result<(Vec<u8>, Certificate, KeyPair)> {
    let csr = std::fs::read(&args[0]).with_context(|| format!("reading {}", args[0]))?;
    let ca_cert_bytes = std::fs::read(&args[1]).with_context(|| format!("reading {}", args[1]))?;
    let ca_key_bytes = std::fs::read(&args[2]).with_context(|| format!("reading {}", args[2]))?;

    let ca_cert = Certificate::from_bytes(&ca_cert_bytes)?;
    let ca_key = KeyPair::load(&ca_key_bytes, args.get(3).map(String::as_str))?;
    Ok((csr, ca_cert, ca_key))
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (csr, ca_cert, ca_key) = match args.len() {
        0 => generated_inputs()?,
        3 | 4 => file_inputs(&args)?,
        _ => anyhow::bail!("usage: issue [<device.csr> <ca.pem> <ca.key> [passphrase]]"),
    };

    let pem = issue_certificate_pem(&csr, &ca_cert, &ca_key, OffsetDateTime::now_utc())?;
    let cert = Certificate::from_bytes(pem.as_bytes())?;

    println!("Device Certificate PEM:\n{pem}");
    println!("Device ID: {}", cert.device_id()?);
    Ok(())
}
