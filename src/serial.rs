//! Deterministic certificate serial numbers.
//!
//! Serial numbers are derived by hashing the subject's public key (or a device
//! serial number) together with a 3-byte packed encoding of the validity start.
//! No counter is kept, so any number of issuers can derive serials in parallel
//! without coordinating.

use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::error::DevCertError;
use crate::key::PublicKeyPoint;

pub type Result<T> = std::result::Result<T, DevCertError>;

/// Length of the SHA-256 digest the serial is cut from.
pub const DIGEST_SIZE: usize = 32;

/// Serial length used for issued device certificates.
pub const DEFAULT_SERIAL_SIZE: usize = 16;

/// RFC 5280 caps serial numbers at 20 octets.
pub const MAX_SERIAL_SIZE: usize = 20;

/// Size of the packed date buffer.
pub const ENCODED_DATES_SIZE: usize = 3;

/// Validity start packed into 24 bits.
///
/// Layout, most significant bit of byte 0 first:
///
/// | byte | bits  | field                         |
/// |------|-------|-------------------------------|
/// | 0    | 7..3  | year - 2000 (5 bits)          |
/// | 0    | 2..0  | month, upper 3 bits           |
/// | 1    | 7     | month, lowest bit             |
/// | 1    | 6..2  | day (5 bits)                  |
/// | 1    | 1..0  | hour, upper 2 bits            |
/// | 2    | 7..5  | hour, lower 3 bits            |
/// | 2    | 4..0  | expire years (5 bits)         |
///
/// Every field is masked to its width. Years outside 2000..=2031 wrap around
/// silently, so 2032 packs the same as 2000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodedDates([u8; ENCODED_DATES_SIZE]);

/// Fields recovered from an [`EncodedDates`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedDates {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub expire_years: u8,
}

impl EncodedDates {
    pub fn encode(year: i32, month: u8, day: u8, hour: u8, expire_years: u8) -> Self {
        let year = (year.wrapping_sub(2000) & 0x1F) as u8;
        let month = month & 0x0F;
        let day = day & 0x1F;
        let hour = hour & 0x1F;
        let expire_years = expire_years & 0x1F;

        Self([
            (year << 3) | (month >> 1),
            ((month & 0x01) << 7) | (day << 2) | (hour >> 3),
            ((hour & 0x07) << 5) | expire_years,
        ])
    }

    /// Packs the calendar fields of `issue_date`, which is expected in UTC.
    pub fn from_datetime(issue_date: OffsetDateTime, expire_years: u8) -> Self {
        Self::encode(
            issue_date.year(),
            u8::from(issue_date.month()),
            issue_date.day(),
            issue_date.hour(),
            expire_years,
        )
    }

    pub fn decode(&self) -> DecodedDates {
        let [b0, b1, b2] = self.0;
        DecodedDates {
            year: 2000 + i32::from(b0 >> 3),
            month: ((b0 & 0x07) << 1) | (b1 >> 7),
            day: (b1 >> 2) & 0x1F,
            hour: ((b1 & 0x03) << 3) | (b2 >> 5),
            expire_years: b2 & 0x1F,
        }
    }

    pub fn as_bytes(&self) -> &[u8; ENCODED_DATES_SIZE] {
        &self.0
    }
}

impl From<[u8; ENCODED_DATES_SIZE]> for EncodedDates {
    fn from(bytes: [u8; ENCODED_DATES_SIZE]) -> Self {
        Self(bytes)
    }
}

/// A certificate serial number as big-endian unsigned bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber(Vec<u8>);

impl SerialNumber {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts to the X.509 INTEGER representation.
    pub fn to_x509(&self) -> Result<x509_cert::serial_number::SerialNumber> {
        x509_cert::serial_number::SerialNumber::new(&self.0)
            .map_err(|e| DevCertError::EncodingError(e.to_string()))
    }
}

impl std::fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Where the bytes of a serial number come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SerialSource {
    /// SHA-256(public key || encoded dates), top two bits forced to `01`.
    #[default]
    PublicKeyHash,
    /// SHA-256(device serial || encoded dates), top two bits forced to `01`.
    DeviceSerialHash(Vec<u8>),
    /// `0x40` followed by the device serial number.
    DeviceSerial(Vec<u8>),
    /// Legacy: SHA-256(public key || encoded dates) with only the top bit
    /// cleared. A leading zero byte makes the DER encoding shorter than the
    /// requested size.
    PublicKeyHashPositive,
    /// Legacy: SHA-256(public key || encoded dates) as-is. A set top bit
    /// makes the DER encoding one byte longer than the requested size.
    PublicKeyHashRaw,
}

impl SerialSource {
    /// Derives a serial of `size` bytes for the subject `point` issued at `dates`.
    pub fn derive(
        &self,
        point: &PublicKeyPoint,
        dates: &EncodedDates,
        size: usize,
    ) -> Result<SerialNumber> {
        match self {
            SerialSource::PublicKeyHash => hash_derived(&point.to_bytes(), dates, size),
            SerialSource::DeviceSerialHash(device_sn) => {
                if device_sn.is_empty() {
                    return Err(DevCertError::InvalidArgument(
                        "device serial number is empty".to_string(),
                    ));
                }
                hash_derived(device_sn, dates, size)
            }
            SerialSource::DeviceSerial(device_sn) => {
                if device_sn.is_empty() || device_sn.len() + 1 > MAX_SERIAL_SIZE {
                    return Err(DevCertError::InvalidArgument(format!(
                        "device serial number must be 1..={} bytes, got {}",
                        MAX_SERIAL_SIZE - 1,
                        device_sn.len()
                    )));
                }
                let mut serial = Vec::with_capacity(device_sn.len() + 1);
                serial.push(0x40);
                serial.extend_from_slice(device_sn);
                Ok(SerialNumber(serial))
            }
            SerialSource::PublicKeyHashPositive => {
                let mut serial = hash_prefix(&point.to_bytes(), dates, size)?;
                serial[0] &= 0x7F;
                Ok(SerialNumber(serial))
            }
            SerialSource::PublicKeyHashRaw => {
                let serial = hash_prefix(&point.to_bytes(), dates, size)?;
                Ok(SerialNumber(serial))
            }
        }
    }
}

/// Derives the serial number for a device certificate.
///
/// Same inputs always give the same serial. The first byte always has its top
/// bit clear and the next bit set, so the value is positive and its minimal DER
/// encoding is exactly `size` bytes. `size` must be in `1..=32`.
pub fn derive_serial(
    point: &PublicKeyPoint,
    not_before: OffsetDateTime,
    size: usize,
) -> Result<SerialNumber> {
    let dates = EncodedDates::from_datetime(not_before, 0);
    SerialSource::PublicKeyHash.derive(point, &dates, size)
}

/// SHA-256(`material` || `dates`) cut to `size` bytes, with the top two bits
/// of the first byte forced to `01`.
pub fn hash_derived(material: &[u8], dates: &EncodedDates, size: usize) -> Result<SerialNumber> {
    let mut serial = hash_prefix(material, dates, size)?;
    serial[0] &= 0x7F;
    serial[0] |= 0x40;
    Ok(SerialNumber(serial))
}

fn hash_prefix(material: &[u8], dates: &EncodedDates, size: usize) -> Result<Vec<u8>> {
    if size == 0 || size > DIGEST_SIZE {
        return Err(DevCertError::InvalidArgument(format!(
            "serial size must be 1..={DIGEST_SIZE} bytes, got {size}"
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(material);
    hasher.update(dates.as_bytes());
    let digest = hasher.finalize();

    Ok(digest[..size].to_vec())
}
