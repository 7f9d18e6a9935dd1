pub mod disk;
pub mod memory;
pub mod paged;
pub mod stdio;

pub use disk::DiskFile;
pub use memory::MemoryFile;
pub use paged::PagedFile;
pub use stdio::StdStream;

use crate::error::Result;

/// Whence values for `MxfIo::seek`, mirroring `std::io::SeekFrom` without
/// requiring callers to depend on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// The capability set every backing store exposes. Implemented by each
/// closed-set variant of `MxfHandle` rather than used as a trait object,
/// since the set of backends is fixed.
pub trait MxfIo {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    fn get_byte(&mut self) -> Result<u8>;
    fn put_byte(&mut self, b: u8) -> Result<()>;
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64>;
    fn tell(&mut self) -> Result<u64>;
    fn eof(&mut self) -> Result<bool>;
    fn size(&mut self) -> Result<u64>;
    fn is_seekable(&self) -> bool;

    fn read_exact_mxf(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut read = 0;
        while read < buf.len() {
            let n = self.read(&mut buf[read..])?;
            if n == 0 {
                return Err(crate::error::MxfError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "unexpected end of file",
                )));
            }
            read += n;
        }
        Ok(())
    }

    fn write_all_mxf(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(crate::error::MxfError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                )));
            }
            written += n;
        }
        Ok(())
    }
}

/// A polymorphic handle over one of the four closed backing-store kinds.
/// Preferred over `dyn MxfIo` per the file-variant-polymorphism design
/// note: the set of variants is closed and known up front.
pub enum MxfHandle {
    Disk(DiskFile),
    StdStream(StdStream),
    Paged(PagedFile),
    Memory(MemoryFile),
}

impl MxfIo for MxfHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            MxfHandle::Disk(h) => h.read(buf),
            MxfHandle::StdStream(h) => h.read(buf),
            MxfHandle::Paged(h) => h.read(buf),
            MxfHandle::Memory(h) => h.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            MxfHandle::Disk(h) => h.write(buf),
            MxfHandle::StdStream(h) => h.write(buf),
            MxfHandle::Paged(h) => h.write(buf),
            MxfHandle::Memory(h) => h.write(buf),
        }
    }

    fn get_byte(&mut self) -> Result<u8> {
        match self {
            MxfHandle::Disk(h) => h.get_byte(),
            MxfHandle::StdStream(h) => h.get_byte(),
            MxfHandle::Paged(h) => h.get_byte(),
            MxfHandle::Memory(h) => h.get_byte(),
        }
    }

    fn put_byte(&mut self, b: u8) -> Result<()> {
        match self {
            MxfHandle::Disk(h) => h.put_byte(b),
            MxfHandle::StdStream(h) => h.put_byte(b),
            MxfHandle::Paged(h) => h.put_byte(b),
            MxfHandle::Memory(h) => h.put_byte(b),
        }
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        match self {
            MxfHandle::Disk(h) => h.seek(offset, whence),
            MxfHandle::StdStream(h) => h.seek(offset, whence),
            MxfHandle::Paged(h) => h.seek(offset, whence),
            MxfHandle::Memory(h) => h.seek(offset, whence),
        }
    }

    fn tell(&mut self) -> Result<u64> {
        match self {
            MxfHandle::Disk(h) => h.tell(),
            MxfHandle::StdStream(h) => h.tell(),
            MxfHandle::Paged(h) => h.tell(),
            MxfHandle::Memory(h) => h.tell(),
        }
    }

    fn eof(&mut self) -> Result<bool> {
        match self {
            MxfHandle::Disk(h) => h.eof(),
            MxfHandle::StdStream(h) => h.eof(),
            MxfHandle::Paged(h) => h.eof(),
            MxfHandle::Memory(h) => h.eof(),
        }
    }

    fn size(&mut self) -> Result<u64> {
        match self {
            MxfHandle::Disk(h) => h.size(),
            MxfHandle::StdStream(h) => h.size(),
            MxfHandle::Paged(h) => h.size(),
            MxfHandle::Memory(h) => h.size(),
        }
    }

    fn is_seekable(&self) -> bool {
        match self {
            MxfHandle::Disk(h) => h.is_seekable(),
            MxfHandle::StdStream(h) => h.is_seekable(),
            MxfHandle::Paged(h) => h.is_seekable(),
            MxfHandle::Memory(h) => h.is_seekable(),
        }
    }
}
