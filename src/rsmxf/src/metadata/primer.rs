use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::{MxfError, Result};
use crate::klv::{ber, Id16};

/// The on-disk map `local_tag -> item_ul` written immediately before the
/// header metadata in the partition that carries it.
#[derive(Debug, Clone, Default)]
pub struct Primer {
    pub tag_to_ul: HashMap<u16, Id16>,
    pub ul_to_tag: HashMap<Id16, u16>,
}

impl Primer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, local_tag: u16, item_ul: Id16) {
        self.tag_to_ul.insert(local_tag, item_ul);
        self.ul_to_tag.insert(item_ul, local_tag);
    }

    pub fn tag_for(&self, item_ul: &Id16) -> Option<u16> {
        self.ul_to_tag.get(item_ul).copied()
    }

    pub fn ul_for(&self, local_tag: u16) -> Option<Id16> {
        self.tag_to_ul.get(&local_tag).copied()
    }

    /// Reads `count:u32, item_len:u32 (=18), (local_tag:u16, item_ul:16)*`.
    pub fn read(r: &mut impl Read) -> Result<Self> {
        let count = ber::read_u32(r)?;
        let _item_len = ber::read_u32(r)?;
        let mut primer = Primer::new();
        for _ in 0..count {
            let tag = ber::read_u16(r)?;
            let ul = Id16::read(r)?;
            primer.insert(tag, ul);
        }
        Ok(primer)
    }

    pub fn write(&self, w: &mut impl Write) -> Result<()> {
        let mut entries: Vec<(u16, Id16)> = self
            .tag_to_ul
            .iter()
            .map(|(tag, ul)| (*tag, *ul))
            .collect();
        entries.sort_by_key(|(tag, _)| *tag);
        ber::write_u32(w, entries.len() as u32)?;
        ber::write_u32(w, 18)?;
        for (tag, ul) in entries {
            ber::write_u16(w, tag)?;
            ul.write(w)?;
        }
        Ok(())
    }
}

/// Allocates dynamic local tags (>= 0x8000, monotonically) for item ULs
/// that have no statically registered tag below 0x8000.
pub struct TagAllocator {
    next: u16,
}

impl Default for TagAllocator {
    fn default() -> Self {
        TagAllocator { next: 0x8000 }
    }
}

impl TagAllocator {
    /// Errors once the dynamic range above `0x8000` is exhausted rather
    /// than wrapping back into the static-tag range and silently
    /// colliding with a real local tag.
    pub fn allocate(&mut self) -> Result<u16> {
        if self.next == u16::MAX {
            return Err(MxfError::schema("exhausted dynamic local tag range (0x8000..=0xffff)"));
        }
        let tag = self.next;
        self.next += 1;
        Ok(tag)
    }
}
