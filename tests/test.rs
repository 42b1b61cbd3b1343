mod util;

use const_oid::ObjectIdentifier;
use der::asn1::BitString;
use devcert::cert::Certificate;
use devcert::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, SubjectKeyIdentifier, ToAndFromX509Extension,
};
use devcert::cert::params::ExtensionParam;
use devcert::error::DevCertError;
use devcert::issuer::{Issuer, issue_certificate, issue_certificate_pem};
use devcert::key::PublicKey;
use devcert::policy::{ExtensionPolicy, IssuancePolicy, NO_EXPIRATION};
use devcert::serial::derive_serial;
use time::macros::datetime;
pub type Result<T> = std::result::Result<T, DevCertError>;

const OID_A: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.1");
const OID_B: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.2");

fn extension(oid: ObjectIdentifier, critical: bool) -> ExtensionParam {
    // UTF8String "device"
    ExtensionParam {
        oid,
        critical,
        value: vec![0x0C, 0x06, b'd', b'e', b'v', b'i', b'c', b'e'],
    }
}

/// Issues a device certificate and saves it with its CA as PEM files for
/// manual inspection.
#[test]
fn issue_device_cert() -> Result<()> {
    let ca = util::generate_ca();
    let (csr, _) = util::device_csr();

    let cert = ca.issue(&csr, datetime!(2024-06-15 10:17:03 UTC), &IssuancePolicy::default())?;

    use std::io::Write;
    std::fs::create_dir_all(".debug_certs").unwrap();
    std::fs::File::create(".debug_certs/ca_cert.pem")
        .unwrap()
        .write_all(ca.cert.to_pem()?.as_bytes())
        .unwrap();
    std::fs::File::create(".debug_certs/device_cert.pem")
        .unwrap()
        .write_all(cert.to_pem()?.as_bytes())
        .unwrap();

    eprintln!("Device Certificate: {:?}", cert);
    Ok(())
}

#[test]
fn end_to_end_issuance() -> Result<()> {
    let ca = util::generate_ca();
    let (csr, device_key) = util::device_csr();
    let now = datetime!(2024-06-15 10:42:31 UTC);

    let cert = ca.issue(&csr, now, &IssuancePolicy::default())?;

    assert_eq!(cert.issuer(), ca.cert.subject());
    assert_eq!(cert.subject(), &csr.inner.info.subject);
    assert_eq!(cert.public_key_info(), &csr.inner.info.public_key);
    assert_eq!(cert.not_before(), datetime!(2024-06-15 10:00 UTC));
    assert_eq!(cert.not_after(), NO_EXPIRATION);

    let serial = cert.serial_number();
    assert_eq!(serial.len(), 16);
    assert_eq!(serial[0] & 0xC0, 0x40);

    let point = PublicKey::from_key_pair(&device_key).point()?;
    let expected = derive_serial(&point, datetime!(2024-06-15 10:00 UTC), 16)?;
    assert_eq!(serial, expected.as_bytes());

    cert.verify_signature(&ca.cert.public_key()?)?;
    assert!(matches!(
        cert.verify_signature(&PublicKey::from_key_pair(&device_key)),
        Err(DevCertError::InvalidSignature(_))
    ));
    Ok(())
}

#[test]
fn issuance_within_the_same_hour_is_reproducible() -> Result<()> {
    let ca = util::generate_ca();
    let (csr, _) = util::device_csr();
    let policy = IssuancePolicy::default();

    let first = ca.issue(&csr, datetime!(2024-06-15 10:00:00 UTC), &policy)?;
    let second = ca.issue(&csr, datetime!(2024-06-15 10:59:59 UTC), &policy)?;
    let next_hour = ca.issue(&csr, datetime!(2024-06-15 11:00:00 UTC), &policy)?;

    assert_eq!(first.serial_number(), second.serial_number());
    assert_eq!(first.to_der()?, second.to_der()?);
    assert_ne!(first.serial_number(), next_hour.serial_number());
    Ok(())
}

#[test]
fn tampered_request_is_rejected() {
    let ca = util::generate_ca();
    let (mut csr, _) = util::device_csr();

    let mut signature = csr.inner.signature.raw_bytes().to_vec();
    let last = signature.len() - 1;
    signature[last] ^= 0x01;
    csr.inner.signature = BitString::from_bytes(&signature).unwrap();

    let result = ca.issue(&csr, datetime!(2024-06-15 10:00 UTC), &IssuancePolicy::default());
    assert!(matches!(result, Err(DevCertError::InvalidSignature(_))));
}

#[test]
fn requested_extensions_are_propagated() -> Result<()> {
    let ca = util::generate_ca();
    let (csr, device_key) =
        util::device_csr_with(vec![extension(OID_A, true), extension(OID_B, false)]);

    let cert = ca.issue(&csr, datetime!(2024-06-15 10:00 UTC), &IssuancePolicy::default())?;
    let extensions = cert.extensions();

    assert_eq!(extensions.len(), 4);
    assert_eq!(extensions[0], extension(OID_A, true));
    assert_eq!(extensions[1], extension(OID_B, false));

    let skis: Vec<_> = extensions
        .iter()
        .filter(|ext| ext.oid == SubjectKeyIdentifier::OID)
        .collect();
    assert_eq!(skis.len(), 1);
    assert!(!skis[0].critical);
    let ski: SubjectKeyIdentifier = skis[0].to_extension()?;
    let expected_ski = SubjectKeyIdentifier::from_public_key_info(&device_key.as_spki()?);
    assert_eq!(ski, expected_ski);

    let akis: Vec<_> = extensions
        .iter()
        .filter(|ext| ext.oid == AuthorityKeyIdentifier::OID)
        .collect();
    assert_eq!(akis.len(), 1);
    assert!(!akis[0].critical);
    let aki: AuthorityKeyIdentifier = akis[0].to_extension()?;
    let ca_ski = ca.cert.subject_key_identifier()?.unwrap();
    assert_eq!(aki.key_identifier, ca_ski.key_identifier);

    assert_eq!(cert.device_id()?, hex::encode(ski.key_identifier));
    Ok(())
}

#[test]
fn copy_all_policy_keeps_ca_only_extensions() -> Result<()> {
    let ca = util::generate_ca();
    let basic_constraints = ExtensionParam::from_extension(
        BasicConstraints {
            is_ca: true,
            max_path_length: None,
        },
        true,
    )?;
    let (csr, _) = util::device_csr_with(vec![basic_constraints.clone()]);

    let cert = ca.issue(&csr, datetime!(2024-06-15 10:00 UTC), &IssuancePolicy::default())?;
    assert!(cert.extensions().contains(&basic_constraints));

    let hardened = IssuancePolicy::builder()
        .extensions(ExtensionPolicy::AllowList(vec![OID_A]))
        .build();
    let cert = ca.issue(&csr, datetime!(2024-06-15 10:00 UTC), &hardened)?;
    assert!(!cert.extensions().contains(&basic_constraints));
    assert_eq!(cert.extensions().len(), 2);
    Ok(())
}

#[test]
fn rsa_ca_issues_device_cert() -> Result<()> {
    let ca = util::generate_rsa_ca();
    let (csr, _) = util::device_csr();

    let cert = ca.issue(&csr, datetime!(2024-06-15 10:00 UTC), &IssuancePolicy::default())?;
    assert_eq!(
        cert.inner.signature_algorithm.oid,
        const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION
    );
    cert.verify_signature(&ca.cert.public_key()?)?;
    Ok(())
}

#[test]
fn ca_without_subject_key_identifier() {
    let ca = util::generate_ca();
    let mut ca_cert = ca.cert.clone();
    if let Some(extensions) = ca_cert.inner.tbs_certificate.extensions.as_mut() {
        extensions.retain(|ext| ext.extn_id != SubjectKeyIdentifier::OID);
    }
    let (csr, _) = util::device_csr();

    let result = issue_certificate(&csr, &ca_cert, &ca.key, datetime!(2024-06-15 10:00 UTC));
    assert!(matches!(result, Err(DevCertError::MissingExtension(_))));
}

#[test]
fn issue_from_pem_request() -> Result<()> {
    let ca = util::generate_ca();
    let (csr, _) = util::device_csr();
    let now = datetime!(2024-06-15 10:30 UTC);

    let pem = issue_certificate_pem(csr.to_pem()?.as_bytes(), &ca.cert, &ca.key, now)?;
    assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));

    let from_pem = Certificate::from_bytes(pem.as_bytes())?;
    let direct = issue_certificate(&csr, &ca.cert, &ca.key, now)?;
    assert_eq!(from_pem.serial_number(), direct.serial_number());
    assert_eq!(from_pem.subject(), direct.subject());

    let from_der = issue_certificate_pem(&csr.to_der()?, &ca.cert, &ca.key, now)?;
    assert_eq!(
        Certificate::from_bytes(from_der.as_bytes())?.serial_number(),
        direct.serial_number()
    );
    Ok(())
}

#[test]
fn concurrent_issuance_is_consistent() -> Result<()> {
    let ca = util::generate_ca();
    let (csr, _) = util::device_csr();
    let now = datetime!(2024-06-15 10:00 UTC);
    let policy = IssuancePolicy::default();

    let serials = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| ca.issue(&csr, now, &policy)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().map(|cert| cert.serial_number().to_vec()))
            .collect::<Result<Vec<_>>>()
    })?;

    assert!(serials.windows(2).all(|pair| pair[0] == pair[1]));
    Ok(())
}
