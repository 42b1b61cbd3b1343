use bon::Builder;
use const_oid::ObjectIdentifier;
use time::OffsetDateTime;
use time::macros::datetime;

use crate::serial::{DEFAULT_SERIAL_SIZE, SerialSource};

/// RFC 5280 4.1.2.5 value for "no well-defined expiration date".
pub const NO_EXPIRATION: OffsetDateTime = datetime!(9999-12-31 23:59:59 UTC);

/// Which requested extensions are copied into an issued certificate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExtensionPolicy {
    /// Copy every requested extension verbatim. The CSR signature is the only
    /// gate, so a request can carry CA-only extensions such as basic
    /// constraints.
    #[default]
    CopyAll,
    /// Copy only extensions whose OID is listed.
    AllowList(Vec<ObjectIdentifier>),
}

impl ExtensionPolicy {
    pub fn permits(&self, oid: &ObjectIdentifier) -> bool {
        match self {
            ExtensionPolicy::CopyAll => true,
            ExtensionPolicy::AllowList(allowed) => allowed.contains(oid),
        }
    }
}

/// Issuance settings.
///
/// `IssuancePolicy::default()` issues 16-byte public-key-hash serials,
/// `expire_years = 0`, a validity ending at [`NO_EXPIRATION`], and copies all
/// requested extensions.
///
/// # Example
/// ```
/// use devcert::policy::{ExtensionPolicy, IssuancePolicy};
///
/// let policy = IssuancePolicy::builder()
///     .extensions(ExtensionPolicy::AllowList(vec![
///         const_oid::db::rfc5280::ID_CE_SUBJECT_ALT_NAME,
///     ]))
///     .build();
/// assert_eq!(policy.serial_size, 16);
/// ```
#[derive(Clone, Debug, Builder, PartialEq, Eq)]
pub struct IssuancePolicy {
    /// Serial length in bytes, `1..=20` (the RFC 5280 limit). Ignored by
    /// [`SerialSource::DeviceSerial`].
    #[builder(default = DEFAULT_SERIAL_SIZE)]
    pub serial_size: usize,
    #[builder(default)]
    pub serial_source: SerialSource,
    /// Packed into the serial's date encoding; 0 means no expiry offset.
    #[builder(default)]
    pub expire_years: u8,
    #[builder(default = NO_EXPIRATION)]
    pub not_after: OffsetDateTime,
    #[builder(default)]
    pub extensions: ExtensionPolicy,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = IssuancePolicy::default();
        assert_eq!(policy.serial_size, 16);
        assert_eq!(policy.serial_source, SerialSource::PublicKeyHash);
        assert_eq!(policy.expire_years, 0);
        assert_eq!(policy.not_after, NO_EXPIRATION);
        assert_eq!(policy.extensions, ExtensionPolicy::CopyAll);
    }

    #[test]
    fn test_allow_list() {
        let san = const_oid::db::rfc5280::ID_CE_SUBJECT_ALT_NAME;
        let bc = const_oid::db::rfc5280::ID_CE_BASIC_CONSTRAINTS;
        let policy = ExtensionPolicy::AllowList(vec![san]);
        assert!(policy.permits(&san));
        assert!(!policy.permits(&bc));
        assert!(ExtensionPolicy::CopyAll.permits(&bc));
    }
}
