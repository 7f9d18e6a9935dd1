use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;
use crate::klv::Id16;

/// The fixed 57-octet SMPTE 12M-encoded system metadata pack value (the
/// system item's payload before its trailing empty package-metadata-set
/// KLV). Field sizes: bitmap(1) + rate(1) + package type(1) + channel
/// handle(2) + continuity count(2) + ESC label(16) + creation
/// timestamp(8) + user timecode(8) = 39 octets; the remaining 18 octets
/// are reserved and always zero.
pub const SYSTEM_METADATA_PACK_LEN: usize = 57;
const RESERVED_LEN: usize = 18;

/// SMPTE 12M-style timecode: hours/minutes/seconds/frames plus a
/// drop-frame flag and three reserved binary-group octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserTimecode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub drop_frame: bool,
}

impl UserTimecode {
    fn write(&self, w: &mut impl Write) -> Result<()> {
        w.write_u8(self.hours)?;
        w.write_u8(self.minutes)?;
        w.write_u8(self.seconds)?;
        w.write_u8(self.frames)?;
        w.write_u8(self.drop_frame as u8)?;
        w.write_all(&[0u8; 3])?;
        Ok(())
    }

    fn read(r: &mut impl Read) -> Result<Self> {
        let hours = r.read_u8()?;
        let minutes = r.read_u8()?;
        let seconds = r.read_u8()?;
        let frames = r.read_u8()?;
        let drop_frame = r.read_u8()? != 0;
        let mut reserved = [0u8; 3];
        r.read_exact(&mut reserved)?;
        Ok(UserTimecode { hours, minutes, seconds, frames, drop_frame })
    }
}

/// The system item's fixed metadata pack, mandatory whenever the content
/// package carries system metadata or user timecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemMetadataPack {
    pub bitmap: u8,
    pub rate_code: u8,
    pub package_type: u8,
    pub channel_handle: u16,
    pub continuity_count: u16,
    pub esc_label: [u8; 16],
    pub user_timecode: UserTimecode,
}

impl SystemMetadataPack {
    /// Total encoded length of the pack plus its trailing empty
    /// package-metadata-set KLV, for a given `min_llen`. A zero-length
    /// value always takes exactly `min_llen` BER-length bytes (since
    /// `min_ber_llen(0) == 1`), so this is constant across the life of a
    /// writer using one `min_llen` -- the system item stays CBE.
    pub fn encoded_len(min_llen: u8) -> usize {
        SYSTEM_METADATA_PACK_LEN + 16 + min_llen as usize
    }

    /// Encodes the pack followed by an empty package-metadata-set KLV,
    /// as one payload for the system item.
    pub fn encode(&self, package_metadata_set_key: &Id16, min_llen: u8) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(SYSTEM_METADATA_PACK_LEN);
        out.write_u8(self.bitmap)?;
        out.write_u8(self.rate_code)?;
        out.write_u8(self.package_type)?;
        out.write_u16::<BigEndian>(self.channel_handle)?;
        out.write_u16::<BigEndian>(self.continuity_count)?;
        out.write_all(&self.esc_label)?;
        // Zero creation timestamp: 8 octets, always zero per §4.7.
        out.write_all(&[0u8; 8])?;
        self.user_timecode.write(&mut out)?;
        out.write_all(&[0u8; RESERVED_LEN])?;
        debug_assert_eq!(out.len(), SYSTEM_METADATA_PACK_LEN);
        crate::klv::write_klv(&mut out, package_metadata_set_key, &[], min_llen)?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut c = std::io::Cursor::new(bytes);
        let bitmap = c.read_u8()?;
        let rate_code = c.read_u8()?;
        let package_type = c.read_u8()?;
        let channel_handle = c.read_u16::<BigEndian>()?;
        let continuity_count = c.read_u16::<BigEndian>()?;
        let mut esc_label = [0u8; 16];
        c.read_exact(&mut esc_label)?;
        let mut creation_timestamp = [0u8; 8];
        c.read_exact(&mut creation_timestamp)?;
        let user_timecode = UserTimecode::read(&mut c)?;
        let mut reserved = [0u8; RESERVED_LEN];
        c.read_exact(&mut reserved)?;
        Ok((
            SystemMetadataPack {
                bitmap,
                rate_code,
                package_type,
                channel_handle,
                continuity_count,
                esc_label,
                user_timecode,
            },
            c.position() as usize,
        ))
    }
}

/// The generic SMPTE system-item key (no essence-container-specific
/// suffix variation is modelled -- callers supply element keys for
/// picture/sound/data, this one is fixed per §4.7).
pub fn system_item_key() -> Id16 {
    Id16::new([
        0x06, 0x0e, 0x2b, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x04, 0x01, 0x01,
        0x00,
    ])
}

/// Key of the empty package-metadata-set KLV that trails the system
/// metadata pack.
pub fn package_metadata_set_key() -> Id16 {
    Id16::new([
        0x06, 0x0e, 0x2b, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0d, 0x01, 0x03, 0x01, 0x04, 0x01, 0x02,
        0x00,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_metadata_pack_roundtrips() {
        let pack = SystemMetadataPack {
            bitmap: 0x0a,
            rate_code: 25,
            package_type: 4,
            channel_handle: 1,
            continuity_count: 42,
            esc_label: [0xab; 16],
            user_timecode: UserTimecode { hours: 1, minutes: 2, seconds: 3, frames: 4, drop_frame: false },
        };
        let encoded = pack.encode(&package_metadata_set_key(), 1).unwrap();
        let (back, consumed) = SystemMetadataPack::decode(&encoded).unwrap();
        assert_eq!(pack, back);
        assert_eq!(consumed, SYSTEM_METADATA_PACK_LEN);
    }

    #[test]
    fn encoded_len_matches_actual_encode_output() {
        let pack = SystemMetadataPack::default();
        for min_llen in [1u8, 4, 9] {
            let encoded = pack.encode(&package_metadata_set_key(), min_llen).unwrap();
            assert_eq!(encoded.len(), SystemMetadataPack::encoded_len(min_llen));
        }
    }
}
