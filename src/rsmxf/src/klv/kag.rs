use std::io::Write;

use crate::error::{MxfError, Result};
use crate::klv::ber::{min_ber_llen, write_ber_length_variable};
use crate::klv::ids::Id16;

/// Two registry versions of the fill key exist on the wire; readers accept
/// either one (modulo the registry-version octet), writers pick one per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillKeyVariant {
    /// SMPTE-377-2004 fill key (registry version octet 0x01).
    Legacy,
    /// SMPTE-377-2011 "compliant" fill key (registry version octet 0x02).
    Compliant,
}

impl FillKeyVariant {
    pub fn key(self) -> Id16 {
        match self {
            FillKeyVariant::Legacy => Id16::new([
                0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00,
                0x00, 0x00,
            ]),
            FillKeyVariant::Compliant => Id16::new([
                0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00,
                0x00, 0x00,
            ]),
        }
    }
}

/// `true` if `key` matches either fill-key registry version, ignoring
/// octet 7.
pub fn is_fill_key(key: &Id16) -> bool {
    use crate::klv::ids::ids_eq_mod_regver;
    ids_eq_mod_regver(key, &FillKeyVariant::Legacy.key())
}

/// Byte length of a KLV-Fill record (key + BER length + zero payload) that
/// pads `pos` up to the next multiple of `kag`, using at least `min_llen`
/// value octets for the length field. `None` if `pos` is already aligned.
fn fill_len_at(pos: u64, kag: u32) -> Option<u64> {
    if kag <= 1 {
        return None;
    }
    let kag = kag as u64;
    let remainder = pos % kag;
    if remainder == 0 {
        return None;
    }
    Some(kag - remainder)
}

/// The maximum number of KAG steps `fill_to_kag` will grow its target by
/// while hunting for a payload length that exactly fills `total` bytes.
const MAX_KAG_GROWTH_STEPS: u32 = 8;

/// Solves for the payload length of a KLV-Fill whose total on-wire size
/// (16-octet key, BER length field, zero payload) is exactly `total`
/// bytes: the length field's own size depends on the payload length it
/// encodes, so this iterates to a fixed point rather than assuming
/// `total - 16 - min_llen` directly, which can be one byte short once the
/// payload length crosses a BER short/long-form boundary.
pub fn fill_payload_for_total(total: u64, min_llen: u8) -> Result<u64> {
    if total < 17 {
        return Err(MxfError::format("target too small to hold a KLV-Fill"));
    }
    let mut payload = total - 16 - 1;
    for _ in 0..4 {
        let llen = min_ber_llen(payload).max(min_llen) as u64;
        let header = 16 + llen;
        let candidate = total.saturating_sub(header);
        if candidate == payload {
            return Ok(payload);
        }
        payload = candidate;
    }
    Err(MxfError::format("could not converge on a KLV-Fill payload length for the target size"))
}

/// Emits a KLV-Fill so that the next write begins at the next KAG-aligned
/// offset, growing the target by a further KAG step whenever the gap is
/// too small to hold even an empty Fill's own key-and-length overhead.
pub fn fill_to_kag(
    w: &mut impl Write,
    pos: u64,
    kag: u32,
    min_llen: u8,
    variant: FillKeyVariant,
) -> Result<u64> {
    let Some(mut total) = fill_len_at(pos, kag) else {
        return Ok(0);
    };
    let mut steps = 0;
    let payload_len = loop {
        match fill_payload_for_total(total, min_llen) {
            Ok(p) => break p,
            Err(e) => {
                steps += 1;
                if steps > MAX_KAG_GROWTH_STEPS {
                    return Err(e);
                }
                total += kag as u64;
            }
        }
    };
    write_fill(w, payload_len, min_llen, variant)?;
    Ok(total)
}

/// Writes a fill KLV whose payload is exactly `payload_len` zero bytes.
pub fn write_fill(
    w: &mut impl Write,
    payload_len: u64,
    min_llen: u8,
    variant: FillKeyVariant,
) -> Result<()> {
    variant.key().write(w)?;
    write_ber_length_variable(w, payload_len, min_llen)?;
    let zeros = vec![0u8; payload_len as usize];
    w.write_all(&zeros)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_aligned_emits_nothing() {
        let mut buf = Vec::new();
        let written = fill_to_kag(&mut buf, 0x100, 0x100, 4, FillKeyVariant::Compliant).unwrap();
        assert_eq!(written, 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn misaligned_pads_to_boundary() {
        let mut buf = Vec::new();
        let written = fill_to_kag(&mut buf, 10, 0x100, 1, FillKeyVariant::Compliant).unwrap();
        assert_eq!(written, 0x100 - 10);
        // The Fill KLV's own key-and-length overhead is part of the gap,
        // not added on top of it: writing `written` bytes must land
        // exactly on the KAG boundary.
        assert_eq!(buf.len() as u64, written);
        assert_eq!((10 + buf.len() as u64) % 0x100, 0);
    }

    #[test]
    fn fill_payload_for_total_round_trips_through_write_fill() {
        for total in [17u64, 18, 100, 128, 129, 255, 256, 257, 70_000] {
            let payload = fill_payload_for_total(total, 1).unwrap();
            let mut buf = Vec::new();
            write_fill(&mut buf, payload, 1, FillKeyVariant::Compliant).unwrap();
            assert_eq!(buf.len() as u64, total);
        }
    }
}
