use std::io::{Read, Write};

use crate::error::{MxfError, Result};
use crate::klv::{ber, Id16};

pub fn rip_key() -> Id16 {
    Id16::new([
        0x06, 0x0e, 0x2b, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x01, 0x11, 0x01,
        0x00,
    ])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipEntry {
    pub body_sid: u32,
    pub this_partition: u64,
}

/// A terminal random-access index: per-partition `(body_sid,
/// this_partition)` pairs followed by the RIP's own total byte length.
#[derive(Debug, Clone, Default)]
pub struct Rip {
    pub entries: Vec<RipEntry>,
}

impl Rip {
    pub fn write(&self, w: &mut impl Write, min_llen: u8) -> Result<()> {
        let mut body = Vec::new();
        for e in &self.entries {
            ber::write_u32(&mut body, e.body_sid)?;
            ber::write_u64(&mut body, e.this_partition)?;
        }
        // key(16) + BER-length-header + body + trailing u32 total length
        let mut framed = Vec::new();
        rip_key().write(&mut framed)?;
        crate::klv::ber::write_ber_length_variable(&mut framed, body.len() as u64, min_llen)?;
        framed.extend_from_slice(&body);
        let total_len = framed.len() as u32 + 4;
        framed.extend_from_slice(&total_len.to_be_bytes());
        w.write_all(&framed)?;
        Ok(())
    }

    /// Reads a RIP given the file's last 4 bytes already known to be its
    /// total length; seeks `r` to `size - total_len` first.
    pub fn read(r: &mut impl Read) -> Result<Self> {
        let klv = crate::klv::read_klv(r)?;
        if !crate::klv::ids_eq(&klv.key, &rip_key()) {
            return Err(MxfError::format("expected RIP key"));
        }
        let mut body = std::io::Cursor::new(klv.value);
        let mut entries = Vec::new();
        while (body.position() as usize) < body.get_ref().len() {
            let body_sid = ber::read_u32(&mut body)?;
            let this_partition = ber::read_u64(&mut body)?;
            entries.push(RipEntry { body_sid, this_partition });
        }
        // trailing total_len u32 is read by the caller directly from EOF.
        Ok(Rip { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rip_trailing_length_matches_file_size() {
        let rip = Rip {
            entries: vec![
                RipEntry { body_sid: 0, this_partition: 0 },
                RipEntry { body_sid: 1, this_partition: 1024 },
            ],
        };
        let mut buf = Vec::new();
        rip.write(&mut buf, 1).unwrap();
        let total_len = u32::from_be_bytes(buf[buf.len() - 4..].try_into().unwrap());
        assert_eq!(total_len as usize, buf.len());
    }
}
