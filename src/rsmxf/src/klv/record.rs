use std::io::{Read, Write};

use crate::error::{MxfError, Result};
use crate::klv::ber::{read_ber_length, write_ber_length_variable};
use crate::klv::ids::Id16;

/// A decoded `(key, value)` pair; the BER length is implicit in
/// `value.len()` once read.
#[derive(Debug, Clone)]
pub struct Klv {
    pub key: Id16,
    pub value: Vec<u8>,
}

/// Reads one KLV record: a 16-octet key, a BER length, and that many
/// value octets. The declared length is untrusted (it comes straight off
/// the wire), so the value is grown incrementally via `take` rather than
/// pre-allocated, bounding the allocation to what the stream actually
/// has rather than to whatever a corrupt or hostile length field claims.
pub fn read_klv(r: &mut impl Read) -> Result<Klv> {
    let key = Id16::read(r)?;
    let len = read_ber_length(r)?;
    let mut value = Vec::new();
    r.take(len).read_to_end(&mut value)?;
    if value.len() as u64 != len {
        return Err(MxfError::format("KLV value truncated before declared length"));
    }
    Ok(Klv { key, value })
}

/// Writes a KLV record using the variable BER-length strategy with the
/// given minimum llen.
pub fn write_klv(w: &mut impl Write, key: &Id16, value: &[u8], min_llen: u8) -> Result<()> {
    key.write(w)?;
    write_ber_length_variable(w, value.len() as u64, min_llen)?;
    w.write_all(value)?;
    Ok(())
}
