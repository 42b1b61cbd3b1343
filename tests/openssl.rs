mod util;

use devcert::issuer::Issuer;
use devcert::key::PublicKey;
use devcert::policy::IssuancePolicy;
use devcert::serial::derive_serial;
use regex::Regex;
use std::fs;
use std::process::Command;
use time::macros::datetime;

#[test]
fn test_openssl_validate_cert() {
    let ca = util::generate_ca();
    let (csr, _) = util::device_csr();
    let cert = ca
        .issue(&csr, datetime!(2024-06-15 10:42 UTC), &IssuancePolicy::default())
        .unwrap();

    let dir = std::env::temp_dir();
    let ca_path = dir.join(format!("devcert_ca_{}.pem", std::process::id()));
    let cert_path = dir.join(format!("devcert_device_{}.pem", std::process::id()));
    fs::write(&ca_path, ca.cert.to_pem().unwrap()).expect("Failed to write CA certificate");
    fs::write(&cert_path, cert.to_pem().unwrap()).expect("Failed to write device certificate");

    let output = Command::new("openssl")
        .arg("x509")
        .arg("-in")
        .arg(&cert_path)
        .arg("-noout")
        .arg("-text")
        .output()
        .expect("Failed to execute OpenSSL command");
    assert!(
        output.status.success(),
        "OpenSSL command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let output_text = String::from_utf8_lossy(&output.stdout);
    assert!(
        output_text.contains("Version: 3 (0x2)"),
        "Version field is incorrect"
    );
    assert!(
        output_text.contains("Signature Algorithm: ecdsa-with-SHA256"),
        "Signature Algorithm field is incorrect"
    );
    assert!(
        output_text.contains("X509v3 Subject Key Identifier"),
        "Missing subject key identifier"
    );
    assert!(
        output_text.contains("X509v3 Authority Key Identifier"),
        "Missing authority key identifier"
    );

    let issuer_regex = Regex::new(r"Issuer: .*CN\s?=\s?Example Signer FFFF").unwrap();
    let subject_regex = Regex::new(r"Subject: .*CN\s?=\s?Example Device").unwrap();
    let not_before_regex = Regex::new(r"Not Before: Jun 15 10:00:00 2024 GMT").unwrap();
    let not_after_regex = Regex::new(r"Not After : Dec 31 23:59:59 9999 GMT").unwrap();
    assert!(issuer_regex.is_match(&output_text), "Issuer field is incorrect");
    assert!(subject_regex.is_match(&output_text), "Subject field is incorrect");
    assert!(
        not_before_regex.is_match(&output_text),
        "Missing or incorrect Not Before field"
    );
    assert!(
        not_after_regex.is_match(&output_text),
        "Missing or incorrect Not After field"
    );

    let verify = Command::new("openssl")
        .arg("verify")
        .arg("-CAfile")
        .arg(&ca_path)
        .arg(&cert_path)
        .output()
        .expect("Failed to execute OpenSSL command");
    assert!(
        verify.status.success(),
        "OpenSSL verify failed: {}{}",
        String::from_utf8_lossy(&verify.stdout),
        String::from_utf8_lossy(&verify.stderr)
    );

    fs::remove_file(&ca_path).expect("Failed to remove CA certificate");
    fs::remove_file(&cert_path).expect("Failed to remove device certificate");
}

#[test]
fn test_openssl_crate_validate_cert() {
    let ca = util::generate_ca();
    let (csr, device_key) = util::device_csr();
    let cert = ca
        .issue(&csr, datetime!(2024-06-15 10:42 UTC), &IssuancePolicy::default())
        .unwrap();
    let cert_pem = cert.to_pem().unwrap();

    use openssl::x509::X509;
    let x509 = X509::from_pem(cert_pem.as_bytes()).expect("Failed to parse PEM");
    let ca_x509 = X509::from_pem(ca.cert.to_pem().unwrap().as_bytes()).unwrap();

    let subject = x509
        .subject_name()
        .entries_by_nid(openssl::nid::Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap();
    assert_eq!(subject.to_string(), util::DEVICE_COMMON_NAME, "Subject CN mismatch");

    let issuer = x509
        .issuer_name()
        .entries_by_nid(openssl::nid::Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap();
    assert_eq!(issuer.to_string(), util::CA_COMMON_NAME, "Issuer CN mismatch");

    assert_eq!(
        x509.version(),
        2,
        "X509 version should be 3 (0-based index)"
    );

    // Positive 16-byte serial with no padding byte
    let serial = x509.serial_number().to_bn().unwrap();
    assert!(!serial.is_negative());
    assert_eq!(serial.num_bytes(), 16);
    let point = PublicKey::from_key_pair(&device_key).point().unwrap();
    let expected = derive_serial(&point, datetime!(2024-06-15 10:00 UTC), 16).unwrap();
    assert_eq!(serial.to_vec(), expected.as_bytes());

    let sig_alg = x509.signature_algorithm().object().nid();
    assert_eq!(
        sig_alg,
        openssl::nid::Nid::ECDSA_WITH_SHA256,
        "Signature algorithm should be ecdsa-with-SHA256"
    );

    let ca_public_key = ca_x509.public_key().unwrap();
    assert!(x509.verify(&ca_public_key).unwrap(), "Signature does not verify");

    let ski = x509.subject_key_id().unwrap().as_slice().to_vec();
    let aki = x509.authority_key_id().unwrap().as_slice().to_vec();
    assert_eq!(hex::encode(&ski), cert.device_id().unwrap());
    assert_eq!(aki, ca_x509.subject_key_id().unwrap().as_slice());
}

#[test]
fn test_openssl_parses_request() {
    let (csr, _) = util::device_csr();
    let req = openssl::x509::X509Req::from_pem(csr.to_pem().unwrap().as_bytes())
        .expect("Failed to parse CSR");
    let public_key = req.public_key().unwrap();
    assert!(req.verify(&public_key).unwrap(), "CSR self-signature does not verify");
}

#[test]
fn test_openssl_rsa_ca() {
    let ca = util::generate_rsa_ca();
    let (csr, _) = util::device_csr();
    let cert = ca
        .issue(&csr, datetime!(2024-06-15 10:42 UTC), &IssuancePolicy::default())
        .unwrap();

    let x509 = openssl::x509::X509::from_der(&cert.to_der().unwrap()).unwrap();
    let ca_x509 = openssl::x509::X509::from_der(&ca.cert.to_der().unwrap()).unwrap();
    assert_eq!(
        x509.signature_algorithm().object().nid(),
        openssl::nid::Nid::SHA256WITHRSAENCRYPTION
    );
    assert!(x509.verify(&ca_x509.public_key().unwrap()).unwrap());
}
