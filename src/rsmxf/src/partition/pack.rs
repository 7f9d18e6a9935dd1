use std::io::{Read, Write};

use crate::error::{MxfError, Result};
use crate::klv::{ber, Id16};

/// Which of the three partition roles a partition pack plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionRole {
    Header,
    Body,
    Footer,
}

/// The low-nibble status bits of a partition key: whether the partition
/// is closed (its header metadata is final) and complete (the essence it
/// announces is fully present).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionStatus {
    pub closed: bool,
    pub complete: bool,
}

pub const OPEN_INCOMPLETE: PartitionStatus = PartitionStatus { closed: false, complete: false };
pub const OPEN_COMPLETE: PartitionStatus = PartitionStatus { closed: false, complete: true };
pub const CLOSED_INCOMPLETE: PartitionStatus = PartitionStatus { closed: true, complete: false };
pub const CLOSED_COMPLETE: PartitionStatus = PartitionStatus { closed: true, complete: true };

fn role_octet(role: PartitionRole) -> u8 {
    match role {
        PartitionRole::Header => 0x01,
        PartitionRole::Body => 0x02,
        PartitionRole::Footer => 0x04,
    }
}

fn role_from_octet(octet: u8) -> Result<PartitionRole> {
    match octet {
        0x01 => Ok(PartitionRole::Header),
        0x02 | 0x03 => Ok(PartitionRole::Body),
        0x04 => Ok(PartitionRole::Footer),
        other => Err(MxfError::format(format!("unknown partition role octet {other:#04x}"))),
    }
}

fn status_octet(status: PartitionStatus) -> u8 {
    (status.closed as u8) | ((status.complete as u8) << 1)
}

fn status_from_octet(octet: u8) -> PartitionStatus {
    PartitionStatus {
        closed: octet & 0x01 != 0,
        complete: octet & 0x02 != 0,
    }
}

/// The partition-pack key prefix shared by header/body/footer packs; the
/// last two octets carry role and status.
fn key_prefix() -> [u8; 14] {
    [
        0x06, 0x0e, 0x2b, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x01, 0x02,
    ]
}

pub fn partition_pack_key(role: PartitionRole, status: PartitionStatus) -> Id16 {
    let mut bytes = [0u8; 16];
    bytes[..14].copy_from_slice(&key_prefix());
    bytes[14] = role_octet(role);
    bytes[15] = status_octet(status);
    Id16::new(bytes)
}

/// The first 11 bytes of the partition-pack key prefix, used to scan for
/// a header partition key through an unknown length of run-in bytes.
pub fn key_prefix_11() -> [u8; 11] {
    let p = key_prefix();
    [p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], p[8], p[9], p[10]]
}

pub fn is_partition_pack_key(key: &Id16) -> bool {
    key.0[..14] == key_prefix()
}

pub fn classify_partition_key(key: &Id16) -> Result<(PartitionRole, PartitionStatus)> {
    if !is_partition_pack_key(key) {
        return Err(MxfError::format("not a partition pack key"));
    }
    Ok((role_from_octet(key.0[14])?, status_from_octet(key.0[15])))
}

/// A partition record: the decoded 88-byte fixed pack plus its
/// essence-container label batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub role: PartitionRole,
    pub status: PartitionStatus,
    pub major_version: u16,
    pub minor_version: u16,
    pub kag_size: u32,
    pub this_partition: u64,
    pub previous_partition: u64,
    pub footer_partition: u64,
    pub header_byte_count: u64,
    pub index_byte_count: u64,
    pub index_sid: u32,
    pub body_offset: u64,
    pub body_sid: u32,
    pub operational_pattern: Id16,
    pub essence_containers: Vec<Id16>,
}

impl Partition {
    pub fn new(role: PartitionRole, status: PartitionStatus, operational_pattern: Id16) -> Self {
        Partition {
            role,
            status,
            major_version: 1,
            minor_version: 2,
            kag_size: 1,
            this_partition: 0,
            previous_partition: 0,
            footer_partition: 0,
            header_byte_count: 0,
            index_byte_count: 0,
            index_sid: 0,
            body_offset: 0,
            body_sid: 0,
            operational_pattern,
            essence_containers: Vec::new(),
        }
    }

    /// `88 + 16 * labels` invariant.
    pub fn pack_len(&self) -> u64 {
        88 + 16 * self.essence_containers.len() as u64
    }

    pub fn write(&self, w: &mut impl Write, min_llen: u8) -> Result<()> {
        let key = partition_pack_key(self.role, self.status);
        let mut body = Vec::new();
        ber::write_u16(&mut body, self.major_version)?;
        ber::write_u16(&mut body, self.minor_version)?;
        ber::write_u32(&mut body, self.kag_size)?;
        ber::write_u64(&mut body, self.this_partition)?;
        ber::write_u64(&mut body, self.previous_partition)?;
        ber::write_u64(&mut body, self.footer_partition)?;
        ber::write_u64(&mut body, self.header_byte_count)?;
        ber::write_u64(&mut body, self.index_byte_count)?;
        ber::write_u32(&mut body, self.index_sid)?;
        ber::write_u64(&mut body, self.body_offset)?;
        ber::write_u32(&mut body, self.body_sid)?;
        self.operational_pattern.write(&mut body)?;
        ber::write_u32(&mut body, self.essence_containers.len() as u32)?;
        ber::write_u32(&mut body, 16)?;
        for label in &self.essence_containers {
            label.write(&mut body)?;
        }
        if body.len() as u64 != self.pack_len() {
            return Err(MxfError::format("partition pack length invariant violated"));
        }
        crate::klv::write_klv(w, &key, &body, min_llen)
    }

    /// Reads a partition pack given its already-consumed key and length.
    pub fn read(key: &Id16, len: u64, r: &mut impl Read) -> Result<Self> {
        let (role, status) = classify_partition_key(key)?;
        let major_version = ber::read_u16(r)?;
        let minor_version = ber::read_u16(r)?;
        let kag_size = ber::read_u32(r)?;
        let this_partition = ber::read_u64(r)?;
        let previous_partition = ber::read_u64(r)?;
        let footer_partition = ber::read_u64(r)?;
        let header_byte_count = ber::read_u64(r)?;
        let index_byte_count = ber::read_u64(r)?;
        let index_sid = ber::read_u32(r)?;
        let body_offset = ber::read_u64(r)?;
        let body_sid = ber::read_u32(r)?;
        let operational_pattern = Id16::read(r)?;
        let label_count = ber::read_u32(r)?;
        let label_item_len = ber::read_u32(r)?;
        if label_item_len != 16 {
            return Err(MxfError::format(format!("unexpected label item length {label_item_len}")));
        }
        let max_labels = len.saturating_sub(88) / 16;
        if label_count as u64 > max_labels {
            return Err(MxfError::format(format!(
                "partition pack declares {label_count} labels but only room for {max_labels} in a {len}-byte pack"
            )));
        }
        let mut essence_containers = Vec::with_capacity(label_count as usize);
        for _ in 0..label_count {
            essence_containers.push(Id16::read(r)?);
        }
        let partition = Partition {
            role,
            status,
            major_version,
            minor_version,
            kag_size,
            this_partition,
            previous_partition,
            footer_partition,
            header_byte_count,
            index_byte_count,
            index_sid,
            body_offset,
            body_sid,
            operational_pattern,
            essence_containers,
        };
        if partition.pack_len() != len {
            return Err(MxfError::format("partition pack length invariant violated"));
        }
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_roundtrips() {
        let mut p = Partition::new(PartitionRole::Header, OPEN_COMPLETE, Id16::new([0x06; 16]));
        p.kag_size = 0x100;
        p.essence_containers.push(Id16::new([0x07; 16]));
        let mut buf = Vec::new();
        p.write(&mut buf, 1).unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let klv = crate::klv::read_klv(&mut cursor).unwrap();
        let mut body = std::io::Cursor::new(klv.value);
        let back = Partition::read(&klv.key, body.get_ref().len() as u64, &mut body).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn scenario_s1_header_pack_length() {
        let p = Partition::new(PartitionRole::Header, CLOSED_COMPLETE, Id16::new([0x06; 16]));
        let mut with_one_label = p.clone();
        with_one_label.essence_containers.push(Id16::new([0x07; 16]));
        assert_eq!(with_one_label.pack_len(), 104);
    }
}
