use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{MxfError, Result};

/// Minimum number of bytes the short-form length byte may be expanded to
/// (1 means "use short form when it fits"; 9 means "always emit the BER
/// long form with 8 big-endian octets").
///
/// Throughout this module `llen` is the *total* on-wire size of the BER
/// length field, marker byte included (matching `mxf_get_llen`/
/// `mxf_write_fixed_l` in the reference C implementation) — not the count
/// of trailing value octets.
pub type Llen = u8;

/// The number of trailing big-endian octets needed to hold `n`.
fn min_value_octets(n: u64) -> u8 {
    let mut octets = 1;
    let mut v = n >> 8;
    while v > 0 {
        octets += 1;
        v >>= 8;
    }
    octets
}

/// The minimum total `llen` (marker byte included) needed to encode `n`:
/// 1 if `n` fits the short form, otherwise one more than the number of
/// big-endian value octets `n` needs.
pub fn min_ber_llen(n: u64) -> u8 {
    if n < 0x80 {
        1
    } else {
        min_value_octets(n) + 1
    }
}

/// Reads a BER length: a single byte < 0x80 gives the length directly;
/// otherwise the low 7 bits give the number of following big-endian octets.
pub fn read_ber_length(r: &mut impl Read) -> Result<u64> {
    let first = r.read_u8()?;
    if first < 0x80 {
        return Ok(first as u64);
    }
    let n = first & 0x7f;
    if n == 0 || n > 8 {
        return Err(MxfError::format(format!("bad BER length: {n} continuation octets")));
    }
    let mut value: u64 = 0;
    for _ in 0..n {
        value = (value << 8) | r.read_u8()? as u64;
    }
    Ok(value)
}

/// Writes `n` using the minimum `llen` (total field size) needed for `n`,
/// bumped up to at least `min_llen` if the caller reserved more room.
/// Never fails for a valid `min_llen`, since the result always grows to
/// fit `n` (up to 9, which holds all of `u64`).
pub fn write_ber_length_variable(w: &mut impl Write, n: u64, min_llen: Llen) -> Result<()> {
    if !(1..=9).contains(&min_llen) {
        return Err(MxfError::format(format!("invalid minimum llen {min_llen}")));
    }
    let llen = min_ber_llen(n).max(min_llen);
    write_ber_length_fixed(w, n, llen)
}

/// Writes `n` using exactly `llen` total bytes (marker byte included):
/// `llen == 1` is the BER short form and fails if `n >= 0x80`; otherwise
/// the marker is followed by `llen - 1` big-endian value octets, and the
/// call fails if `n` does not fit in them (except at `llen == 9`, which
/// always fits any `u64`).
pub fn write_ber_length_fixed(w: &mut impl Write, n: u64, llen: Llen) -> Result<()> {
    if !(1..=9).contains(&llen) {
        return Err(MxfError::format(format!("invalid llen {llen}")));
    }
    if llen == 1 {
        if n >= 0x80 {
            return Err(MxfError::format(format!("length {n} does not fit in short form")));
        }
        w.write_u8(n as u8)?;
        return Ok(());
    }
    let value_octets = llen - 1;
    if llen != 9 && (n >> (8 * value_octets as u32)) != 0 {
        return Err(MxfError::format(format!("length {n} does not fit in {llen} total bytes")));
    }
    w.write_u8(0x80 | value_octets)?;
    for i in (0..value_octets).rev() {
        w.write_u8(((n >> (8 * i as u32)) & 0xff) as u8)?;
    }
    Ok(())
}

pub fn read_u8(r: &mut impl Read) -> Result<u8> {
    Ok(r.read_u8()?)
}
pub fn read_u16(r: &mut impl Read) -> Result<u16> {
    Ok(r.read_u16::<BigEndian>()?)
}
pub fn read_u32(r: &mut impl Read) -> Result<u32> {
    Ok(r.read_u32::<BigEndian>()?)
}
pub fn read_u64(r: &mut impl Read) -> Result<u64> {
    Ok(r.read_u64::<BigEndian>()?)
}
pub fn read_i8(r: &mut impl Read) -> Result<i8> {
    Ok(r.read_i8()?)
}
pub fn read_i16(r: &mut impl Read) -> Result<i16> {
    Ok(r.read_i16::<BigEndian>()?)
}
pub fn read_i32(r: &mut impl Read) -> Result<i32> {
    Ok(r.read_i32::<BigEndian>()?)
}
pub fn read_i64(r: &mut impl Read) -> Result<i64> {
    Ok(r.read_i64::<BigEndian>()?)
}

pub fn write_u8(w: &mut impl Write, v: u8) -> Result<()> {
    w.write_u8(v)?;
    Ok(())
}
pub fn write_u16(w: &mut impl Write, v: u16) -> Result<()> {
    w.write_u16::<BigEndian>(v)?;
    Ok(())
}
pub fn write_u32(w: &mut impl Write, v: u32) -> Result<()> {
    w.write_u32::<BigEndian>(v)?;
    Ok(())
}
pub fn write_u64(w: &mut impl Write, v: u64) -> Result<()> {
    w.write_u64::<BigEndian>(v)?;
    Ok(())
}
pub fn write_i8(w: &mut impl Write, v: i8) -> Result<()> {
    w.write_i8(v)?;
    Ok(())
}
pub fn write_i16(w: &mut impl Write, v: i16) -> Result<()> {
    w.write_i16::<BigEndian>(v)?;
    Ok(())
}
pub fn write_i32(w: &mut impl Write, v: i32) -> Result<()> {
    w.write_i32::<BigEndian>(v)?;
    Ok(())
}
pub fn write_i64(w: &mut impl Write, v: i64) -> Result<()> {
    w.write_i64::<BigEndian>(v)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn scenario_s2_short_form() {
        let mut buf = Vec::new();
        write_ber_length_variable(&mut buf, 0x7f, 1).unwrap();
        assert_eq!(buf, vec![0x7f]);
        let mut c = Cursor::new(buf);
        assert_eq!(read_ber_length(&mut c).unwrap(), 0x7f);
    }

    #[test]
    fn scenario_s3_short_form_overflow_errors() {
        // S3 is fixed-llen semantics: the caller pinned llen=1 and 0x80
        // does not fit in it. `write_ber_length_variable` would instead
        // grow llen to fit, which is a different (valid) operation.
        let mut buf = Vec::new();
        assert!(write_ber_length_fixed(&mut buf, 0x80, 1).is_err());
    }

    #[test]
    fn scenario_s4_fixed_llen_four() {
        let mut buf = Vec::new();
        write_ber_length_variable(&mut buf, 0x1234, 4).unwrap();
        assert_eq!(buf, vec![0x83, 0x00, 0x12, 0x34]);
    }

    #[test]
    fn roundtrip_all_llens() {
        for llen in 1u8..=9 {
            let max = if llen == 1 {
                0x7f
            } else if llen >= 9 {
                u64::MAX
            } else {
                (1u64 << (8 * (llen - 1) as u32)) - 1
            };
            let n = max.min(0x1020304);
            let mut buf = Vec::new();
            write_ber_length_variable(&mut buf, n, llen).unwrap();
            let mut c = Cursor::new(buf);
            assert_eq!(read_ber_length(&mut c).unwrap(), n);
        }
    }

    #[test]
    fn min_ber_llen_matches_fixed_boundaries() {
        assert_eq!(min_ber_llen(0x7f), 1);
        assert_eq!(min_ber_llen(0x80), 2);
        assert_eq!(min_ber_llen(0xff), 2);
        assert_eq!(min_ber_llen(0x1234), 3);
        assert_eq!(min_ber_llen(u64::MAX), 9);
    }
}
