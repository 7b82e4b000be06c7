// Byte source consumed by the decode session
use std::io::{self, Read, Seek, SeekFrom};

/// A byte-oriented input the session pulls compressed data from.
///
/// A read of `0` bytes is either a transient lack of data or end of stream;
/// the session only treats it as end of stream once its own buffer is empty.
pub trait ByteStream {
    /// Read up to `buf.len()` bytes into `buf`, returning how many were read
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Reposition the stream to an absolute byte offset
    fn seek_absolute(&mut self, offset: u64) -> io::Result<()>;
}

impl<T: Read + Seek> ByteStream for T {
    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn seek_absolute(&mut self, offset: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset)).map(|_| ())
    }
}
