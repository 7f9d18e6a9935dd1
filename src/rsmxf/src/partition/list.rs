use crate::error::{MxfError, Result};
use crate::io::{MxfIo, Whence};
use crate::klv::kag::{fill_to_kag as klv_fill_to_kag, write_fill, FillKeyVariant};
use crate::klv::{ber, Id16};
use crate::partition::pack::{
    classify_partition_key, is_partition_pack_key, key_prefix_11, Partition, PartitionRole,
};

const MAX_RUNIN_LEN: u64 = 65_535;
const MAX_BACKWARD_SCAN_WINDOW: usize = 32 * 1024;

/// The ordered list of partitions making up one file, owned by the
/// writer (or populated by a reader locating partitions).
#[derive(Default)]
pub struct PartitionList {
    pub partitions: Vec<Partition>,
    pub run_in_len: u64,
}

impl PartitionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_new_partition(&mut self, partition: Partition) -> &mut Partition {
        self.partitions.push(partition);
        self.partitions.last_mut().unwrap()
    }

    /// Appends a partition copying operational pattern, KAG, major/minor
    /// version, and essence-container label list from `src`.
    pub fn append_like(&mut self, src: &Partition, role: PartitionRole, status: crate::partition::pack::PartitionStatus) -> &mut Partition {
        let mut p = Partition::new(role, status, src.operational_pattern);
        p.kag_size = src.kag_size;
        p.major_version = src.major_version;
        p.minor_version = src.minor_version;
        p.essence_containers = src.essence_containers.clone();
        self.partitions.push(p);
        self.partitions.last_mut().unwrap()
    }

    /// Writes the partition pack for `index` at the file's current
    /// position, recording `this_partition` (and `footer_partition` if
    /// this is the footer).
    pub fn write_partition_pack(&mut self, io: &mut impl MxfIo, index: usize, min_llen: u8) -> Result<()> {
        let pos = io.tell()? - self.run_in_len;
        let is_footer = self.partitions[index].role == PartitionRole::Footer;
        {
            let p = &mut self.partitions[index];
            p.this_partition = pos;
            if is_footer {
                p.footer_partition = pos;
            }
        }
        let mut buf = Vec::new();
        self.partitions[index].write(&mut buf, min_llen)?;
        io.write_all_mxf(&buf)?;
        Ok(())
    }

    /// Two-pass update: chain `previous_partition`, propagate
    /// `footer_partition` to every partition once a footer exists, then
    /// rewrite each fixed pack in place (never the label batch, whose
    /// length must stay stable).
    pub fn update_partitions(&mut self, io: &mut impl MxfIo, min_llen: u8, skip_body_update: bool) -> Result<()> {
        let footer_offset = self
            .partitions
            .iter()
            .find(|p| p.role == PartitionRole::Footer)
            .map(|p| p.this_partition);

        let mut previous = 0u64;
        for (i, p) in self.partitions.iter_mut().enumerate() {
            if i > 0 {
                p.previous_partition = previous;
            }
            previous = p.this_partition;
            if let Some(footer) = footer_offset {
                p.footer_partition = footer;
            }
        }

        for i in 0..self.partitions.len() {
            if skip_body_update && self.partitions[i].role == PartitionRole::Body {
                continue;
            }
            io.seek(self.partitions[i].this_partition as i64 + self.run_in_len as i64, Whence::Start)?;
            let mut buf = Vec::new();
            self.partitions[i].write(&mut buf, min_llen)?;
            io.write_all_mxf(&buf)?;
        }
        Ok(())
    }

    /// Reads the first KLV and validates it is a header partition pack
    /// key, with no run-in scanning.
    pub fn read_header_pp_kl(io: &mut impl MxfIo) -> Result<Partition> {
        let klv = read_klv_from_io(io)?;
        let (role, _status) = classify_partition_key(&klv.key)?;
        if role != PartitionRole::Header {
            return Err(MxfError::format("expected header partition pack as first KLV"));
        }
        Partition::read(&klv.key, klv.value.len() as u64, &mut std::io::Cursor::new(klv.value))
    }

    /// Scans up to `MAX_RUNIN_LEN` bytes of run-in for the first 11 bytes
    /// of the partition-pack-key prefix, recording the run-in length for
    /// later `this_partition` calculations.
    pub fn read_header_pp_kl_with_runin(&mut self, io: &mut impl MxfIo) -> Result<Partition> {
        io.seek(0, Whence::Start)?;
        let prefix = key_prefix_11();
        let mut window = [0u8; 11];
        let mut filled = 0usize;
        let mut offset = 0u64;
        loop {
            if offset > MAX_RUNIN_LEN {
                return Err(MxfError::format("no partition pack key found within max run-in length"));
            }
            let b = io.get_byte()?;
            if filled < 11 {
                window[filled] = b;
                filled += 1;
            } else {
                window.copy_within(1..11, 0);
                window[10] = b;
            }
            offset += 1;
            if filled == 11 && window == prefix {
                let run_in_len = offset - 11;
                self.run_in_len = run_in_len;
                io.seek(run_in_len as i64, Whence::Start)?;
                return Self::read_header_pp_kl(io);
            }
        }
    }

    /// (1) trailing RIP, (2) header pack's `footer_partition`, (3)
    /// backward scan in 32 KiB windows for a footer key, stopping if a
    /// header/body key is hit first.
    pub fn locate_footer(&self, io: &mut impl MxfIo) -> Result<u64> {
        if let Ok(size) = io.size() {
            if size >= 4 {
                if let Ok(offset) = self.try_rip_footer(io, size) {
                    return Ok(offset);
                }
            }
        }
        if let Some(header) = self.partitions.first() {
            if header.footer_partition != 0 {
                return Ok(header.footer_partition);
            }
        }
        self.backward_scan_for_footer(io)
    }

    fn try_rip_footer(&self, io: &mut impl MxfIo, size: u64) -> Result<u64> {
        io.seek(-4, Whence::End)?;
        let mut len_buf = [0u8; 4];
        io.read_exact_mxf(&mut len_buf)?;
        let total_len = u32::from_be_bytes(len_buf) as u64;
        if total_len == 0 || total_len > size {
            return Err(MxfError::format("invalid RIP trailing length"));
        }
        io.seek(-(total_len as i64), Whence::End)?;
        let mut rip_reader = IoReader(io);
        let rip = crate::partition::rip::Rip::read(&mut rip_reader)?;
        rip.entries
            .last()
            .map(|e| e.this_partition)
            .ok_or_else(|| MxfError::format("RIP has no entries"))
    }

    /// Scans backward in `MAX_BACKWARD_SCAN_WINDOW`-sized windows,
    /// overlapping each by 15 bytes so a 16-byte key straddling a window
    /// boundary is still assembled whole in the next window.
    fn backward_scan_for_footer(&self, io: &mut impl MxfIo) -> Result<u64> {
        const KEY_OVERLAP: u64 = 15;
        let size = io.size()?;
        let mut end = size;
        loop {
            let window_start = end.saturating_sub(MAX_BACKWARD_SCAN_WINDOW as u64);
            let window_len = (end - window_start) as usize;
            io.seek(window_start as i64, Whence::Start)?;
            let mut buf = vec![0u8; window_len];
            io.read_exact_mxf(&mut buf)?;
            if window_len >= 16 {
                for i in (0..=window_len - 16).rev() {
                    let candidate = Id16::new(buf[i..i + 16].try_into().unwrap());
                    if is_partition_pack_key(&candidate) {
                        let (role, _status) = classify_partition_key(&candidate)?;
                        if role == PartitionRole::Footer {
                            return Ok(window_start + i as u64);
                        } else {
                            return Err(MxfError::format("FooterNotFound"));
                        }
                    }
                }
            }
            if window_start == 0 {
                break;
            }
            end = window_start + KEY_OVERLAP;
        }
        Err(MxfError::format("FooterNotFound"))
    }

    pub fn fill_to_kag(&self, io: &mut impl MxfIo, partition_index: usize, variant: FillKeyVariant, min_llen: u8) -> Result<u64> {
        let pos = io.tell()?;
        let kag = self.partitions[partition_index].kag_size;
        klv_fill_to_kag(&mut IoWriter(io), pos, kag, min_llen, variant)
    }

    pub fn fill_to_position(&self, io: &mut impl MxfIo, target: u64, variant: FillKeyVariant, min_llen: u8) -> Result<()> {
        let pos = io.tell()?;
        if target < pos {
            return Err(MxfError::format("fill_to_position target is behind current position"));
        }
        if target == pos {
            return Ok(());
        }
        let payload_len = crate::klv::kag::fill_payload_for_total(target - pos, min_llen)?;
        write_fill(&mut IoWriter(io), payload_len, min_llen, variant)
    }

    /// Reserves `size` additional bytes past the next KAG boundary.
    pub fn allocate_space_to_kag(&self, io: &mut impl MxfIo, partition_index: usize, size: u64, variant: FillKeyVariant, min_llen: u8) -> Result<u64> {
        let padded = self.fill_to_kag(io, partition_index, variant, min_llen)?;
        write_fill(&mut IoWriter(io), size, min_llen, variant)?;
        Ok(padded + size)
    }
}

struct IoWriter<'a, T: MxfIo>(&'a mut T);
impl<'a, T: MxfIo> std::io::Write for IoWriter<'a, T> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .write_all_mxf(buf)
            .map(|_| buf.len())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn read_klv_from_io(io: &mut impl MxfIo) -> Result<crate::klv::Klv> {
    let mut key = [0u8; 16];
    io.read_exact_mxf(&mut key)?;
    let mut len_reader = IoReader(io);
    let len = ber::read_ber_length(&mut len_reader)?;
    // `len` is an untrusted wire value; bound it against what the
    // underlying file actually has left rather than trusting it outright.
    if let (Ok(size), Ok(pos)) = (io.size(), io.tell()) {
        if len > size.saturating_sub(pos) {
            return Err(MxfError::format("KLV value length exceeds remaining file size"));
        }
    }
    let mut value = vec![0u8; len as usize];
    io.read_exact_mxf(&mut value)?;
    Ok(crate::klv::Klv { key: Id16::new(key), value })
}

struct IoReader<'a, T: MxfIo>(&'a mut T);
impl<'a, T: MxfIo> std::io::Read for IoReader<'a, T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0
            .read(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFile;
    use crate::partition::pack::{partition_pack_key, CLOSED_COMPLETE};

    /// A footer key whose 16 bytes straddle the boundary between two
    /// consecutive `MAX_BACKWARD_SCAN_WINDOW`-sized scan windows must
    /// still be found, since the windows now overlap by 15 bytes.
    #[test]
    fn locate_footer_finds_key_straddling_window_boundary() {
        let key = partition_pack_key(PartitionRole::Footer, CLOSED_COMPLETE);
        let key_bytes = {
            let mut out = Vec::new();
            key.write(&mut out).unwrap();
            out
        };
        // Two full scan windows are needed to reach this file's start,
        // and the key sits 10 bytes before the first window's boundary
        // -- straddling it, so only the 15-byte overlap lets the second
        // window assemble it whole.
        let total_len: u64 = 70_000;
        let first_window_start = total_len - MAX_BACKWARD_SCAN_WINDOW as u64;
        let key_start = first_window_start - 10;
        let mut buf = vec![0u8; total_len as usize];
        buf[key_start as usize..key_start as usize + 16].copy_from_slice(&key_bytes);

        let list = PartitionList::new();
        let mut io = MemoryFile::from_bytes(buf);
        let found = list.locate_footer(&mut io).unwrap();
        assert_eq!(found, key_start);
    }
}
