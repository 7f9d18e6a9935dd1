use std::path::PathBuf;

use crate::error::{MxfError, Result};
use crate::io::disk::DiskFile;
use crate::io::{MxfIo, Whence};

const MAX_OPEN_PAGES: usize = 32;

/// A stream logically split into fixed-size pages, each stored as a
/// separate file named `{prefix}{index}`. File descriptors are cached
/// LRU-style up to `MAX_OPEN_PAGES`; pages beyond that are reopened on
/// demand. Supports forward truncation of old pages for ring-buffer
/// recorders.
pub struct PagedFile {
    prefix: PathBuf,
    page_size: u64,
    pos: u64,
    /// Page index, 0-based, ordered most-recently-used first.
    open_pages: Vec<(u64, DiskFile)>,
    writable: bool,
    /// Lowest page index still present on disk; pages below this have
    /// been forward-truncated away.
    first_page: u64,
}

impl PagedFile {
    pub fn create(prefix: PathBuf, page_size: u64) -> Self {
        PagedFile {
            prefix,
            page_size,
            pos: 0,
            open_pages: Vec::new(),
            writable: true,
            first_page: 0,
        }
    }

    pub fn open_existing(prefix: PathBuf, page_size: u64) -> Self {
        PagedFile {
            prefix,
            page_size,
            pos: 0,
            open_pages: Vec::new(),
            writable: false,
            first_page: 0,
        }
    }

    fn page_path(&self, index: u64) -> PathBuf {
        let mut p = self.prefix.clone();
        let name = format!(
            "{}{}",
            p.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            index
        );
        p.set_file_name(name);
        p
    }

    /// Returns a mutable reference to the open handle for `index`,
    /// opening it (and evicting the LRU handle if at capacity) if needed.
    fn page(&mut self, index: u64) -> Result<&mut DiskFile> {
        if let Some(pos) = self.open_pages.iter().position(|(i, _)| *i == index) {
            let entry = self.open_pages.remove(pos);
            self.open_pages.insert(0, entry);
        } else {
            if self.open_pages.len() >= MAX_OPEN_PAGES {
                self.open_pages.pop();
            }
            let path = self.page_path(index);
            let handle = if self.writable {
                // An evicted-then-revisited page already exists on disk and
                // must not be truncated; only a page touched for the first
                // time needs `create`.
                DiskFile::open_read_write(&path).or_else(|_| DiskFile::create(&path))?
            } else {
                DiskFile::open_read(&path)?
            };
            self.open_pages.insert(0, (index, handle));
        }
        Ok(&mut self.open_pages[0].1)
    }

    fn split(&self, pos: u64) -> (u64, u64) {
        (pos / self.page_size, pos % self.page_size)
    }

    /// Forward-truncates pages strictly before `up_to_page`, for
    /// ring-buffer recorders that must reclaim disk space.
    pub fn truncate_before(&mut self, up_to_page: u64) -> Result<()> {
        for idx in self.first_page..up_to_page {
            self.open_pages.retain(|(i, _)| *i != idx);
            let _ = std::fs::remove_file(self.page_path(idx));
        }
        self.first_page = self.first_page.max(up_to_page);
        Ok(())
    }
}

impl MxfIo for PagedFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let (page_idx, offset) = self.split(self.pos);
        let page_size = self.page_size;
        let page = self.page(page_idx)?;
        page.seek(offset as i64, Whence::Start)?;
        let room = (page_size - offset) as usize;
        let n = page.read(&mut buf[..buf.len().min(room)])?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let (page_idx, offset) = self.split(self.pos);
        let page_size = self.page_size;
        let room = (page_size - offset) as usize;
        let n = buf.len().min(room);
        let page = self.page(page_idx)?;
        page.seek(offset as i64, Whence::Start)?;
        let written = page.write(&buf[..n])?;
        self.pos += written as u64;
        Ok(written)
    }

    fn get_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact_mxf(&mut b)?;
        Ok(b[0])
    }

    fn put_byte(&mut self, b: u8) -> Result<()> {
        self.write_all_mxf(&[b])
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base = match whence {
            Whence::Start => 0i64,
            Whence::Current => self.pos as i64,
            Whence::End => return Err(MxfError::state("paged file does not support seek-from-end")),
        };
        let new_pos = base + offset;
        if new_pos < 0 {
            return Err(MxfError::format("seek before start of paged file"));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos)
    }

    fn eof(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn size(&mut self) -> Result<u64> {
        Err(MxfError::state("paged file has no single well-defined size"))
    }

    fn is_seekable(&self) -> bool {
        true
    }
}
