use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;
use crate::io::{MxfIo, Whence};

/// A plain on-disk file, opened for either reading or read-write access.
pub struct DiskFile {
    file: File,
}

impl DiskFile {
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(DiskFile {
            file: File::open(path)?,
        })
    }

    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(DiskFile {
            file: OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
        })
    }

    pub fn open_read_write(path: impl AsRef<Path>) -> Result<Self> {
        Ok(DiskFile {
            file: OpenOptions::new().read(true).write(true).open(path)?,
        })
    }
}

fn to_seek_from(offset: i64, whence: Whence) -> SeekFrom {
    match whence {
        Whence::Start => SeekFrom::Start(offset as u64),
        Whence::Current => SeekFrom::Current(offset),
        Whence::End => SeekFrom::End(offset),
    }
}

impl MxfIo for DiskFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.file.write(buf)?)
    }

    fn get_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.file.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn put_byte(&mut self, b: u8) -> Result<()> {
        self.file.write_all(&[b])?;
        Ok(())
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        Ok(self.file.seek(to_seek_from(offset, whence))?)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    fn eof(&mut self) -> Result<bool> {
        let pos = self.tell()?;
        let size = self.size()?;
        Ok(pos >= size)
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn is_seekable(&self) -> bool {
        true
    }
}
