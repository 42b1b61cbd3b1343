use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::{Ia5StringRef, OctetString, PrintableStringRef, Utf8StringRef};
use time::{Duration, OffsetDateTime, UtcOffset};
use x509_cert::name::RdnSequence;

use super::extensions::ToAndFromX509Extension;
pub use crate::cert::extensions::ExtendedKeyUsage;
pub use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::error::DevCertError;

/// Parameters for a certificate or certificate request built by this crate.
///
/// Used to create self-signed CA certificates and device CSRs.
///
/// # Fields
/// * `subject` - The distinguished name of the subject.
/// * `usages` - A list of extended key usage options.
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `extensions` - Additional X.509 extensions.
#[derive(Clone, Debug, Builder)]
pub struct CertificationRequestInfo {
    pub subject: DistinguishedName,
    #[builder(default)]
    pub usages: Vec<ExtendedKeyUsageOption>,
    #[builder(default)]
    pub is_ca: bool,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Distinguished name parameters.
///
/// # Fields
/// * `common_name` - The common name (CN).
/// * `country` - The country (C).
/// * `state` - The state or province (ST).
/// * `locality` - The locality or city (L).
/// * `organization` - The organization (O).
/// * `organization_unit` - The organizational unit (OU).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
}

const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_STATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const OID_LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const OID_ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_ORGANIZATION_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");

impl DistinguishedName {
    /// Converts the distinguished name to an X.509 name. Absent attributes are
    /// left out.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName, DevCertError> {
        use core::str::FromStr;

        let attributes = [
            ("CN", Some(&self.common_name)),
            ("OU", self.organization_unit.as_ref()),
            ("O", self.organization.as_ref()),
            ("L", self.locality.as_ref()),
            ("ST", self.state.as_ref()),
            ("C", self.country.as_ref()),
        ];
        let rfc4514_name = attributes
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| format!("{key}={}", escape_rfc4514(v))))
            .collect::<Vec<_>>()
            .join(",");

        RdnSequence::from_str(&rfc4514_name)
            .map_err(|e| DevCertError::InvalidArgument(format!("invalid name {rfc4514_name}: {e}")))
    }

    /// Creates a `DistinguishedName` from an X.509 name.
    ///
    /// Attributes this type has no field for are ignored.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Self {
        let mut dn = DistinguishedName::default();

        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let Some(value) = attribute_string(&attr.value) else {
                    continue;
                };
                match attr.oid {
                    OID_COMMON_NAME => dn.common_name = value,
                    OID_COUNTRY => dn.country = Some(value),
                    OID_STATE => dn.state = Some(value),
                    OID_LOCALITY => dn.locality = Some(value),
                    OID_ORGANIZATION => dn.organization = Some(value),
                    OID_ORGANIZATION_UNIT => dn.organization_unit = Some(value),
                    _ => {}
                }
            }
        }

        dn
    }
}

fn attribute_string(value: &der::asn1::Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<Utf8StringRef<'_>>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<PrintableStringRef<'_>>() {
        return Some(s.to_string());
    }
    value
        .decode_as::<Ia5StringRef<'_>>()
        .ok()
        .map(|s| s.to_string())
}

fn escape_rfc4514(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Certificate validity period.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period starting now for the given number of days.
    pub fn for_days(days: i64) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            not_before: now,
            not_after: now + Duration::days(days),
        }
    }

    /// Creates a validity period starting at the top of the hour containing
    /// `now` (in UTC) and ending at `not_after`.
    ///
    /// Issuances within the same hour get identical start times, and so
    /// identical derived serials.
    pub fn starting_at_hour(
        now: OffsetDateTime,
        not_after: OffsetDateTime,
    ) -> Result<Self, DevCertError> {
        let utc = now.to_offset(UtcOffset::UTC);
        let not_before =
            utc.replace_time(time::Time::MIDNIGHT + Duration::hours(i64::from(utc.hour())));

        if not_after <= not_before {
            return Err(DevCertError::InvalidArgument(format!(
                "not_after {not_after} is not after not_before {not_before}"
            )));
        }

        let not_after = not_after.checked_to_offset(UtcOffset::UTC).ok_or_else(|| {
            DevCertError::InvalidArgument(format!("not_after {not_after} is past year 9999 in UTC"))
        })?;

        Ok(Self {
            not_before,
            not_after,
        })
    }
}

/// Represents an X.509 extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: E,
        critical: bool,
    ) -> Result<Self, DevCertError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, DevCertError> {
        E::from_x509_extension_value(&self.value)
    }

    /// Converts to the `x509_cert` extension type.
    pub fn to_x509(&self) -> Result<x509_cert::ext::Extension, DevCertError> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())?,
        })
    }
}

impl From<&x509_cert::ext::Extension> for ExtensionParam {
    fn from(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}
