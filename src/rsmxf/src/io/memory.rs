use crate::error::{MxfError, Result};
use crate::io::{MxfIo, Whence};

/// A grow-on-write in-memory buffer. Used to stage a partition pack,
/// header metadata, and index table before they are flushed to the
/// underlying disk file as one contiguous write.
#[derive(Default)]
pub struct MemoryFile {
    buf: Vec<u8>,
    pos: usize,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already-complete byte buffer for reading, positioned at
    /// its start.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        MemoryFile { buf, pos: 0 }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl MxfIo for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let available = self.buf.len().saturating_sub(self.pos);
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let end = self.pos + buf.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(buf.len())
    }

    fn get_byte(&mut self) -> Result<u8> {
        if self.pos >= self.buf.len() {
            return Err(MxfError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "unexpected end of memory file",
            )));
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn put_byte(&mut self, b: u8) -> Result<()> {
        self.write(&[b]).map(|_| ())
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base = match whence {
            Whence::Start => 0i64,
            Whence::Current => self.pos as i64,
            Whence::End => self.buf.len() as i64,
        };
        let new_pos = base + offset;
        if new_pos < 0 {
            return Err(MxfError::format("seek before start of memory file"));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn eof(&mut self) -> Result<bool> {
        Ok(self.pos >= self.buf.len())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.buf.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}
