use std::io::{Read, Write};

use crate::error::{MxfError, Result};
use crate::klv::{ber, Id16};
use crate::metadata::Rational;

/// `flags` bit 7: the edit unit is a random-access point.
pub const FLAG_RANDOM_ACCESS: u8 = 0x80;
/// `flags` bit 3: a sequence header is present at this edit unit.
pub const FLAG_SEQUENCE_HEADER: u8 = 0x08;

pub fn is_random_access(flags: u8) -> bool {
    flags & FLAG_RANDOM_ACCESS != 0
}

pub fn has_sequence_header(flags: u8) -> bool {
    flags & FLAG_SEQUENCE_HEADER != 0
}

/// Prediction direction, packed into `flags` bits [4..6].
pub fn prediction_direction(flags: u8) -> u8 {
    (flags >> 4) & 0x07
}

/// Picture/coding type class, packed into `flags` bits [0..2].
pub fn coding_type_class(flags: u8) -> u8 {
    flags & 0x07
}

/// Per sub-element entry in a segment's delta-entry array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaEntry {
    /// -1 for a temporally reordered sub-element, otherwise the
    /// position-table index it participates in.
    pub pos_table_index: i8,
    pub slice: u8,
    pub element_delta: u32,
}

/// Per edit-unit entry in a segment's index-entry array.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub temporal_offset: i8,
    pub key_frame_offset: i8,
    pub flags: u8,
    pub stream_offset: u64,
    pub slice_offsets: Vec<u32>,
    pub pos_table: Vec<Rational>,
}

impl IndexEntry {
    pub fn can_start_partition(&self) -> bool {
        is_random_access(self.flags)
    }

    fn wire_len(slice_count: usize, pos_table_count: usize) -> usize {
        1 + 1 + 1 + 8 + 4 * slice_count + 8 * pos_table_count
    }
}

/// Describes edit units in one `(body_sid, index_sid)` stream. Exactly
/// one of CBE (`edit_unit_byte_count > 0`) or VBE (zero, entries carry
/// explicit offsets) applies to a given segment.
#[derive(Debug, Clone)]
pub struct IndexTableSegment {
    pub instance_uid: Id16,
    pub index_edit_rate: Rational,
    pub index_start_position: i64,
    /// Edit-unit count; 0 means "unknown until footer".
    pub index_duration: i64,
    pub index_sid: u32,
    pub body_sid: u32,
    pub edit_unit_byte_count: u32,
    pub slice_count: u8,
    pub pos_table_count: u8,
    pub delta_entries: Vec<DeltaEntry>,
    pub index_entries: Vec<IndexEntry>,
}

impl IndexTableSegment {
    pub fn is_cbe(&self) -> bool {
        self.edit_unit_byte_count != 0
    }

    pub fn new_cbe(
        instance_uid: Id16,
        index_edit_rate: Rational,
        index_start_position: i64,
        body_sid: u32,
        index_sid: u32,
        edit_unit_byte_count: u32,
    ) -> Self {
        IndexTableSegment {
            instance_uid,
            index_edit_rate,
            index_start_position,
            index_duration: 0,
            index_sid,
            body_sid,
            edit_unit_byte_count,
            slice_count: 0,
            pos_table_count: 0,
            delta_entries: Vec::new(),
            index_entries: Vec::new(),
        }
    }

    pub fn new_vbe(
        instance_uid: Id16,
        index_edit_rate: Rational,
        index_start_position: i64,
        body_sid: u32,
        index_sid: u32,
        slice_count: u8,
        pos_table_count: u8,
    ) -> Self {
        IndexTableSegment {
            instance_uid,
            index_edit_rate,
            index_start_position,
            index_duration: 0,
            index_sid,
            body_sid,
            edit_unit_byte_count: 0,
            slice_count,
            pos_table_count,
            delta_entries: Vec::new(),
            index_entries: Vec::new(),
        }
    }

    /// Byte size of the index-entry array alone, the quantity
    /// `MAX_INDEX_SEGMENT_SIZE` bounds.
    pub fn entries_byte_size(&self) -> usize {
        self.index_entries.len()
            * IndexEntry::wire_len(self.slice_count as usize, self.pos_table_count as usize)
    }

    pub fn write(&self, w: &mut impl Write, min_llen: u8) -> Result<()> {
        let mut body = Vec::new();
        write_tagged_ul(&mut body, 0x3c0a, &self.instance_uid)?;
        write_tagged_rational(&mut body, 0x3f0b, self.index_edit_rate)?;
        write_tagged_i64(&mut body, 0x3f0c, self.index_start_position)?;
        write_tagged_i64(&mut body, 0x3f0d, self.index_duration)?;
        write_tagged_u32(&mut body, 0x3f05, self.edit_unit_byte_count)?;
        write_tagged_u32(&mut body, 0x3f06, self.index_sid)?;
        write_tagged_u32(&mut body, 0x3f07, self.body_sid)?;
        write_tagged_u8(&mut body, 0x3f08, self.slice_count)?;
        write_tagged_u8(&mut body, 0x3f0e, self.pos_table_count)?;
        if !self.delta_entries.is_empty() {
            let mut arr = Vec::new();
            ber::write_u32(&mut arr, self.delta_entries.len() as u32)?;
            ber::write_u32(&mut arr, 6)?;
            for d in &self.delta_entries {
                ber::write_i8(&mut arr, d.pos_table_index)?;
                ber::write_u8(&mut arr, d.slice)?;
                ber::write_u32(&mut arr, d.element_delta)?;
            }
            write_tagged(&mut body, 0x3f09, &arr)?;
        }
        if !self.index_entries.is_empty() {
            let elem_len = IndexEntry::wire_len(self.slice_count as usize, self.pos_table_count as usize);
            let mut arr = Vec::new();
            ber::write_u32(&mut arr, self.index_entries.len() as u32)?;
            ber::write_u32(&mut arr, elem_len as u32)?;
            for e in &self.index_entries {
                ber::write_i8(&mut arr, e.temporal_offset)?;
                ber::write_i8(&mut arr, e.key_frame_offset)?;
                ber::write_u8(&mut arr, e.flags)?;
                ber::write_u64(&mut arr, e.stream_offset)?;
                for s in &e.slice_offsets {
                    ber::write_u32(&mut arr, *s)?;
                }
                for p in &e.pos_table {
                    ber::write_i32(&mut arr, p.numerator)?;
                    ber::write_i32(&mut arr, p.denominator)?;
                }
            }
            write_tagged(&mut body, 0x3f0a, &arr)?;
        }
        crate::klv::write_klv(w, &index_table_segment_key(), &body, min_llen)
    }

    pub fn read(r: &mut impl Read, len: u64) -> Result<Self> {
        let mut payload = vec![0u8; len as usize];
        r.read_exact(&mut payload)?;
        let mut cursor = std::io::Cursor::new(payload);

        let mut instance_uid = None;
        let mut index_edit_rate = Rational { numerator: 0, denominator: 1 };
        let mut index_start_position = 0i64;
        let mut index_duration = 0i64;
        let mut edit_unit_byte_count = 0u32;
        let mut index_sid = 0u32;
        let mut body_sid = 0u32;
        let mut slice_count = 0u8;
        let mut pos_table_count = 0u8;
        let mut delta_entries = Vec::new();
        let mut index_entries = Vec::new();

        while (cursor.position() as usize) < cursor.get_ref().len() {
            let tag = ber::read_u16(&mut cursor)?;
            let tag_len = ber::read_u16(&mut cursor)? as usize;
            let mut bytes = vec![0u8; tag_len];
            std::io::Read::read_exact(&mut cursor, &mut bytes)?;
            let mut c = std::io::Cursor::new(bytes);
            match tag {
                0x3c0a => instance_uid = Some(Id16::read(&mut c)?),
                0x3f0b => {
                    index_edit_rate = Rational {
                        numerator: ber::read_i32(&mut c)?,
                        denominator: ber::read_i32(&mut c)?,
                    }
                }
                0x3f0c => index_start_position = ber::read_i64(&mut c)?,
                0x3f0d => index_duration = ber::read_i64(&mut c)?,
                0x3f05 => edit_unit_byte_count = ber::read_u32(&mut c)?,
                0x3f06 => index_sid = ber::read_u32(&mut c)?,
                0x3f07 => body_sid = ber::read_u32(&mut c)?,
                0x3f08 => slice_count = ber::read_u8(&mut c)?,
                0x3f0e => pos_table_count = ber::read_u8(&mut c)?,
                0x3f09 => {
                    let count = ber::read_u32(&mut c)?;
                    let _elem_len = ber::read_u32(&mut c)?;
                    for _ in 0..count {
                        delta_entries.push(DeltaEntry {
                            pos_table_index: ber::read_i8(&mut c)?,
                            slice: ber::read_u8(&mut c)?,
                            element_delta: ber::read_u32(&mut c)?,
                        });
                    }
                }
                0x3f0a => {
                    let count = ber::read_u32(&mut c)?;
                    let elem_len = ber::read_u32(&mut c)? as usize;
                    // Some writers omit slice-offset bytes even when
                    // SliceCount=1; trust the declared element length
                    // over a recomputation, matching the reader's
                    // documented tolerant stance.
                    let fixed = 1 + 1 + 1 + 8;
                    if elem_len < fixed {
                        return Err(MxfError::format(format!(
                            "index entry element length {elem_len} shorter than the fixed {fixed}-byte entry header"
                        )));
                    }
                    let remaining = elem_len.saturating_sub(fixed);
                    let n_slices = (remaining / 4).min(slice_count as usize);
                    for _ in 0..count {
                        let start = c.position() as usize;
                        let temporal_offset = ber::read_i8(&mut c)?;
                        let key_frame_offset = ber::read_i8(&mut c)?;
                        let flags = ber::read_u8(&mut c)?;
                        let stream_offset = ber::read_u64(&mut c)?;
                        let mut slice_offsets = Vec::with_capacity(n_slices);
                        for _ in 0..n_slices {
                            slice_offsets.push(ber::read_u32(&mut c)?);
                        }
                        let mut pos_table = Vec::new();
                        let consumed = c.position() as usize - start;
                        let pos_bytes_remaining = elem_len.saturating_sub(consumed);
                        let n_pos = pos_bytes_remaining / 8;
                        for _ in 0..n_pos {
                            pos_table.push(Rational {
                                numerator: ber::read_i32(&mut c)?,
                                denominator: ber::read_i32(&mut c)?,
                            });
                        }
                        let end = start + elem_len;
                        c.set_position(end as u64);
                        index_entries.push(IndexEntry {
                            temporal_offset,
                            key_frame_offset,
                            flags,
                            stream_offset,
                            slice_offsets,
                            pos_table,
                        });
                    }
                }
                other => {
                    log::warn!("index table segment: dropping unknown local tag {other:#06x}");
                }
            }
        }

        let instance_uid =
            instance_uid.ok_or_else(|| MxfError::format("index table segment missing InstanceUID"))?;

        if index_entries.len() < index_duration as usize && edit_unit_byte_count == 0 {
            log::warn!(
                "index table segment: {} entries but duration {}",
                index_entries.len(),
                index_duration
            );
        }

        Ok(IndexTableSegment {
            instance_uid,
            index_edit_rate,
            index_start_position,
            index_duration,
            index_sid,
            body_sid,
            edit_unit_byte_count,
            slice_count,
            pos_table_count,
            delta_entries,
            index_entries,
        })
    }
}

pub fn index_table_segment_key() -> Id16 {
    Id16::new([
        0x06, 0x0e, 0x2b, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0d, 0x01, 0x02, 0x01, 0x01, 0x10, 0x01,
        0x00,
    ])
}

fn write_tagged(w: &mut Vec<u8>, tag: u16, bytes: &[u8]) -> Result<()> {
    ber::write_u16(w, tag)?;
    ber::write_u16(w, bytes.len() as u16)?;
    w.extend_from_slice(bytes);
    Ok(())
}

fn write_tagged_u8(w: &mut Vec<u8>, tag: u16, v: u8) -> Result<()> {
    write_tagged(w, tag, &[v])
}

fn write_tagged_u32(w: &mut Vec<u8>, tag: u16, v: u32) -> Result<()> {
    let mut buf = Vec::new();
    ber::write_u32(&mut buf, v)?;
    write_tagged(w, tag, &buf)
}

fn write_tagged_i64(w: &mut Vec<u8>, tag: u16, v: i64) -> Result<()> {
    let mut buf = Vec::new();
    ber::write_i64(&mut buf, v)?;
    write_tagged(w, tag, &buf)
}

fn write_tagged_rational(w: &mut Vec<u8>, tag: u16, r: Rational) -> Result<()> {
    let mut buf = Vec::new();
    ber::write_i32(&mut buf, r.numerator)?;
    ber::write_i32(&mut buf, r.denominator)?;
    write_tagged(w, tag, &buf)
}

fn write_tagged_ul(w: &mut Vec<u8>, tag: u16, id: &Id16) -> Result<()> {
    let mut buf = Vec::new();
    id.write(&mut buf)?;
    write_tagged(w, tag, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(n: u8) -> Id16 {
        Id16::new([n; 16])
    }

    #[test]
    fn cbe_segment_roundtrips() {
        let mut seg = IndexTableSegment::new_cbe(
            uid(1),
            Rational { numerator: 25, denominator: 1 },
            0,
            1,
            2,
            288_000,
        );
        seg.index_duration = 4;
        let mut buf = Vec::new();
        seg.write(&mut buf, 1).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let klv = crate::klv::read_klv(&mut cursor).unwrap();
        let back = IndexTableSegment::read(&mut std::io::Cursor::new(klv.value.clone()), klv.value.len() as u64).unwrap();
        assert_eq!(back.edit_unit_byte_count, 288_000);
        assert_eq!(back.index_duration, 4);
        assert_eq!(back.body_sid, 1);
        assert_eq!(back.index_sid, 2);
    }

    #[test]
    fn vbe_segment_roundtrips_entries() {
        let mut seg =
            IndexTableSegment::new_vbe(uid(2), Rational { numerator: 25, denominator: 1 }, 0, 1, 2, 1, 0);
        seg.index_entries.push(IndexEntry {
            temporal_offset: 0,
            key_frame_offset: 0,
            flags: FLAG_RANDOM_ACCESS,
            stream_offset: 0,
            slice_offsets: vec![0],
            pos_table: vec![],
        });
        seg.index_entries.push(IndexEntry {
            temporal_offset: -1,
            key_frame_offset: -1,
            flags: 0,
            stream_offset: 1000,
            slice_offsets: vec![0],
            pos_table: vec![],
        });
        seg.index_duration = 2;
        let mut buf = Vec::new();
        seg.write(&mut buf, 1).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let klv = crate::klv::read_klv(&mut cursor).unwrap();
        let back = IndexTableSegment::read(&mut std::io::Cursor::new(klv.value.clone()), klv.value.len() as u64).unwrap();
        assert_eq!(back.index_entries.len(), 2);
        assert_eq!(back.index_entries[1].stream_offset, 1000);
        assert!(back.index_entries[0].can_start_partition());
    }
}
