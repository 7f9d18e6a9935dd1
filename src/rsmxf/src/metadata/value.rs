use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{MxfError, Result};
use crate::klv::{ber, Id16, Umid};
use crate::model::TypeId;

/// A rational number, encoded on the wire as `int32 numerator, int32
/// denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub numerator: i32,
    pub denominator: i32,
}

/// Major/minor version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRecord {
    pub major: u16,
    pub minor: u16,
}

/// Five-field product-version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductVersionRecord {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build: u16,
    pub release: u16,
}

/// Quarter-millisecond-resolution UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub qmsec: u8,
}

/// A decoded item value, tagged by the type kind that produced it.
/// Unknown item types are preserved as `Raw` so a writer can round-trip a
/// file it did not fully understand.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Rational(Rational),
    VersionRecord(VersionRecord),
    ProductVersionRecord(ProductVersionRecord),
    Timestamp(Timestamp),
    Boolean(bool),
    Ul(Id16),
    Uuid(Id16),
    Umid(Umid),
    Utf16String(String),
    Utf8String(String),
    Iso7String(String),
    Raw(Vec<u8>),
    StrongRef(Id16),
    WeakRef(Id16),
    Array(Vec<ItemValue>),
}

impl ItemValue {
    /// Decodes `bytes` per `type_id`. Unknown or malformed array element
    /// encodings fall back to `Raw` rather than failing the whole read,
    /// matching the permissive "preserve unknown as bytes" design note.
    pub fn decode(type_id: &TypeId, bytes: &[u8]) -> Result<ItemValue> {
        let mut c = Cursor::new(bytes);
        match type_id {
            TypeId::UInt8 => Ok(ItemValue::UInt8(ber::read_u8(&mut c)?)),
            TypeId::UInt16 => Ok(ItemValue::UInt16(ber::read_u16(&mut c)?)),
            TypeId::UInt32 => Ok(ItemValue::UInt32(ber::read_u32(&mut c)?)),
            TypeId::UInt64 => Ok(ItemValue::UInt64(ber::read_u64(&mut c)?)),
            TypeId::Int8 => Ok(ItemValue::Int8(ber::read_i8(&mut c)?)),
            TypeId::Int16 => Ok(ItemValue::Int16(ber::read_i16(&mut c)?)),
            TypeId::Int32 => Ok(ItemValue::Int32(ber::read_i32(&mut c)?)),
            TypeId::Int64 => Ok(ItemValue::Int64(ber::read_i64(&mut c)?)),
            TypeId::Rational => Ok(ItemValue::Rational(Rational {
                numerator: ber::read_i32(&mut c)?,
                denominator: ber::read_i32(&mut c)?,
            })),
            TypeId::VersionRecord => Ok(ItemValue::VersionRecord(VersionRecord {
                major: ber::read_u16(&mut c)?,
                minor: ber::read_u16(&mut c)?,
            })),
            TypeId::ProductVersionRecord => Ok(ItemValue::ProductVersionRecord(ProductVersionRecord {
                major: ber::read_u16(&mut c)?,
                minor: ber::read_u16(&mut c)?,
                patch: ber::read_u16(&mut c)?,
                build: ber::read_u16(&mut c)?,
                release: ber::read_u16(&mut c)?,
            })),
            TypeId::Timestamp => Ok(ItemValue::Timestamp(Timestamp {
                year: c.read_i16::<BigEndian>()?,
                month: ber::read_u8(&mut c)?,
                day: ber::read_u8(&mut c)?,
                hour: ber::read_u8(&mut c)?,
                minute: ber::read_u8(&mut c)?,
                second: ber::read_u8(&mut c)?,
                qmsec: ber::read_u8(&mut c)?,
            })),
            TypeId::Boolean => {
                // Permissive: any nonzero octet is true.
                let b = ber::read_u8(&mut c)?;
                Ok(ItemValue::Boolean(b != 0))
            }
            TypeId::Ul => Ok(ItemValue::Ul(Id16::read(&mut c)?)),
            TypeId::Uuid => Ok(ItemValue::Uuid(Id16::read(&mut c)?)),
            TypeId::Umid => Ok(ItemValue::Umid(Umid::read(&mut c)?)),
            TypeId::Utf16String => {
                if bytes.len() % 2 != 0 {
                    return Err(MxfError::format("UTF-16BE item has odd byte length"));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Ok(ItemValue::Utf16String(String::from_utf16_lossy(&units)))
            }
            TypeId::Utf8String => Ok(ItemValue::Utf8String(
                String::from_utf8_lossy(bytes).into_owned(),
            )),
            TypeId::Iso7String => Ok(ItemValue::Iso7String(
                bytes.iter().map(|&b| b as char).collect(),
            )),
            TypeId::RawBytes => Ok(ItemValue::Raw(bytes.to_vec())),
            TypeId::StrongRef => Ok(ItemValue::StrongRef(Id16::read(&mut c)?)),
            TypeId::WeakRef => Ok(ItemValue::WeakRef(Id16::read(&mut c)?)),
            TypeId::Array(elem) | TypeId::Batch(elem) => {
                let count = ber::read_u32(&mut c)? as usize;
                let elem_len = ber::read_u32(&mut c)? as usize;
                let remaining = bytes.len() - c.position() as usize;
                if count.checked_mul(elem_len).map_or(true, |total| total > remaining) {
                    return Err(MxfError::format(format!(
                        "array declares {count} elements of {elem_len} bytes but only {remaining} remain"
                    )));
                }
                let mut out = Vec::with_capacity(count);
                for _ in 0..count {
                    let mut elem_bytes = vec![0u8; elem_len];
                    std::io::Read::read_exact(&mut c, &mut elem_bytes)?;
                    out.push(ItemValue::decode(elem, &elem_bytes)?);
                }
                Ok(ItemValue::Array(out))
            }
        }
    }

    /// Encodes this value back to its wire representation.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            ItemValue::UInt8(v) => ber::write_u8(&mut out, *v)?,
            ItemValue::UInt16(v) => ber::write_u16(&mut out, *v)?,
            ItemValue::UInt32(v) => ber::write_u32(&mut out, *v)?,
            ItemValue::UInt64(v) => ber::write_u64(&mut out, *v)?,
            ItemValue::Int8(v) => ber::write_i8(&mut out, *v)?,
            ItemValue::Int16(v) => ber::write_i16(&mut out, *v)?,
            ItemValue::Int32(v) => ber::write_i32(&mut out, *v)?,
            ItemValue::Int64(v) => ber::write_i64(&mut out, *v)?,
            ItemValue::Rational(r) => {
                ber::write_i32(&mut out, r.numerator)?;
                ber::write_i32(&mut out, r.denominator)?;
            }
            ItemValue::VersionRecord(v) => {
                ber::write_u16(&mut out, v.major)?;
                ber::write_u16(&mut out, v.minor)?;
            }
            ItemValue::ProductVersionRecord(v) => {
                ber::write_u16(&mut out, v.major)?;
                ber::write_u16(&mut out, v.minor)?;
                ber::write_u16(&mut out, v.patch)?;
                ber::write_u16(&mut out, v.build)?;
                ber::write_u16(&mut out, v.release)?;
            }
            ItemValue::Timestamp(t) => {
                out.write_i16::<BigEndian>(t.year)?;
                ber::write_u8(&mut out, t.month)?;
                ber::write_u8(&mut out, t.day)?;
                ber::write_u8(&mut out, t.hour)?;
                ber::write_u8(&mut out, t.minute)?;
                ber::write_u8(&mut out, t.second)?;
                ber::write_u8(&mut out, t.qmsec)?;
            }
            ItemValue::Boolean(b) => ber::write_u8(&mut out, if *b { 1 } else { 0 })?,
            ItemValue::Ul(id) | ItemValue::Uuid(id) | ItemValue::StrongRef(id) | ItemValue::WeakRef(id) => {
                id.write(&mut out)?
            }
            ItemValue::Umid(u) => u.write(&mut out)?,
            ItemValue::Utf16String(s) => {
                for unit in s.encode_utf16() {
                    out.write_u16::<BigEndian>(unit)?;
                }
            }
            ItemValue::Utf8String(s) => out.extend_from_slice(s.as_bytes()),
            ItemValue::Iso7String(s) => out.extend(s.chars().map(|c| c as u8)),
            ItemValue::Raw(bytes) => out.extend_from_slice(bytes),
            ItemValue::Array(items) => {
                let elem_len = items.first().map(|v| v.encode()).transpose()?.map(|b| b.len()).unwrap_or(0);
                ber::write_u32(&mut out, items.len() as u32)?;
                ber::write_u32(&mut out, elem_len as u32)?;
                for item in items {
                    let bytes = item.encode()?;
                    if bytes.len() != elem_len {
                        return Err(MxfError::schema("array elements have inconsistent encoded length"));
                    }
                    out.extend_from_slice(&bytes);
                }
            }
        }
        Ok(out)
    }
}

/// Pads or truncates a UTF-16BE string encoding to a fixed byte size, for
/// the "fixed-size padded" setter variant.
pub fn utf16_fixed(s: &str, byte_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(byte_len);
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
        if out.len() >= byte_len {
            break;
        }
    }
    out.resize(byte_len, 0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_roundtrip() {
        let v = ItemValue::Rational(Rational { numerator: 25, denominator: 1 });
        let bytes = v.encode().unwrap();
        let back = ItemValue::decode(&TypeId::Rational, &bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn boolean_is_permissive() {
        let v = ItemValue::decode(&TypeId::Boolean, &[0x42]).unwrap();
        assert_eq!(v, ItemValue::Boolean(true));
    }

    #[test]
    fn utf16_roundtrip() {
        let v = ItemValue::Utf16String("clip01".to_string());
        let bytes = v.encode().unwrap();
        let back = ItemValue::decode(&TypeId::Utf16String, &bytes).unwrap();
        assert_eq!(v, back);
    }
}
