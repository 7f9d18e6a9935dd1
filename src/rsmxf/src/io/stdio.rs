use std::io::{Read, Write};

use crate::error::{MxfError, Result};
use crate::io::{MxfIo, Whence};

/// A non-seekable wrapper over standard input or standard output.
/// Provides read-through buffering and forward-only skip in place of
/// real seeking, since pipes cannot seek.
pub enum StdStream {
    Input(std::io::Stdin),
    Output(std::io::Stdout),
}

impl MxfIo for StdStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            StdStream::Input(s) => Ok(s.read(buf)?),
            StdStream::Output(_) => Err(MxfError::state("cannot read from stdout stream")),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            StdStream::Output(s) => Ok(s.write(buf)?),
            StdStream::Input(_) => Err(MxfError::state("cannot write to stdin stream")),
        }
    }

    fn get_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read(&mut b)?;
        Ok(b[0])
    }

    fn put_byte(&mut self, b: u8) -> Result<()> {
        self.write(&[b]).map(|_| ())
    }

    /// Only forward skips (`Current` with a non-negative offset) are
    /// supported, implemented by discarding bytes read-through.
    fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        if whence != Whence::Current || offset < 0 {
            return Err(MxfError::state("stdio streams only support forward skip"));
        }
        let mut remaining = offset as usize;
        let mut scratch = [0u8; 4096];
        while remaining > 0 {
            let n = remaining.min(scratch.len());
            let read = self.read(&mut scratch[..n])?;
            if read == 0 {
                break;
            }
            remaining -= read;
        }
        Ok(0)
    }

    fn tell(&mut self) -> Result<u64> {
        Err(MxfError::state("stdio streams do not support tell"))
    }

    fn eof(&mut self) -> Result<bool> {
        Err(MxfError::state("stdio streams do not support eof query"))
    }

    fn size(&mut self) -> Result<u64> {
        Err(MxfError::state("stdio streams have no known size"))
    }

    fn is_seekable(&self) -> bool {
        false
    }
}
