//! Forward-reading byte streams that track the absolute offset of every byte.

use std::io::Read;

use crate::{channel::Channel, utils::read_fully};

/// A forward-only byte source that reports the absolute document offset of the next byte.
///
/// Both the indexing scanner and the lazy value decoders consume input through this trait,
/// which lets the same lexing code run over a sequential reader or a positioned channel.
pub trait ByteStream {
    /// Returns the next byte without consuming it, or `None` at end of input.
    fn peek_byte(&mut self) -> std::io::Result<Option<u8>>;

    /// Consumes and returns the next byte, or `None` at end of input.
    fn next_byte(&mut self) -> std::io::Result<Option<u8>>;

    /// Absolute offset of the next byte to be returned by `next_byte`.
    fn position(&self) -> u64;
}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    fn peek_byte(&mut self) -> std::io::Result<Option<u8>> {
        (**self).peek_byte()
    }

    fn next_byte(&mut self) -> std::io::Result<Option<u8>> {
        (**self).next_byte()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }
}

/// A random-access channel with a read-ahead window, positioned by absolute offset.
///
/// The window survives `seek` calls: seeking to an offset that is already buffered does
/// not touch the underlying channel. Reads never go past the end of the channel.
pub struct BufferedChannel {
    channel: Box<dyn Channel>,
    buf: Box<[u8]>,
    /// Absolute offset of `buf[0]`.
    buf_start: u64,
    /// Number of valid bytes in `buf`.
    buf_len: usize,
    pos: u64,
}

impl BufferedChannel {
    pub fn new(channel: Box<dyn Channel>, buffer_size: usize) -> BufferedChannel {
        BufferedChannel {
            channel,
            buf: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            buf_start: 0,
            buf_len: 0,
            pos: 0,
        }
    }

    /// Moves the stream to the absolute offset `pos`.
    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    /// Closes the underlying channel.
    pub fn close(self) -> std::io::Result<()> {
        self.channel.close()
    }

    fn buffered(&self) -> Option<usize> {
        if self.pos >= self.buf_start && self.pos < self.buf_start + self.buf_len as u64 {
            Some((self.pos - self.buf_start) as usize)
        } else {
            None
        }
    }

    fn fill(&mut self) -> std::io::Result<Option<usize>> {
        if let Some(idx) = self.buffered() {
            return Ok(Some(idx));
        }
        let n = self.channel.read_at(self.pos, &mut self.buf)?;
        self.buf_start = self.pos;
        self.buf_len = n;
        Ok(if n == 0 { None } else { Some(0) })
    }
}

impl ByteStream for BufferedChannel {
    fn peek_byte(&mut self) -> std::io::Result<Option<u8>> {
        Ok(self.fill()?.map(|idx| self.buf[idx]))
    }

    fn next_byte(&mut self) -> std::io::Result<Option<u8>> {
        let b = self.peek_byte()?;
        if b.is_some() {
            self.pos += 1;
        }
        Ok(b)
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

/// Adapts a sequential `std::io::Read` into a [`ByteStream`], counting offsets from
/// a given starting position.
pub struct ReaderStream<R> {
    inner: R,
    buf: Box<[u8]>,
    idx: usize,
    len: usize,
    pos: u64,
}

impl<R: Read> ReaderStream<R> {
    pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

    pub fn new(inner: R) -> ReaderStream<R> {
        Self::with_capacity(inner, Self::DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: R, capacity: usize) -> ReaderStream<R> {
        ReaderStream {
            inner,
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            idx: 0,
            len: 0,
            pos: 0,
        }
    }

    fn fill(&mut self) -> std::io::Result<bool> {
        if self.idx < self.len {
            return Ok(true);
        }
        self.len = read_fully(&mut self.inner, &mut self.buf)?;
        self.idx = 0;
        Ok(self.len != 0)
    }
}

impl<R: Read> ByteStream for ReaderStream<R> {
    fn peek_byte(&mut self) -> std::io::Result<Option<u8>> {
        if self.fill()? {
            Ok(Some(self.buf[self.idx]))
        } else {
            Ok(None)
        }
    }

    fn next_byte(&mut self) -> std::io::Result<Option<u8>> {
        let b = self.peek_byte()?;
        if b.is_some() {
            self.idx += 1;
            self.pos += 1;
        }
        Ok(b)
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{BufferedChannel, ByteStream, ReaderStream};
    use crate::channel::{ChannelFactory, ReadAtChannelFactory};

    fn drain(stream: &mut impl ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(b) = stream.next_byte().unwrap() {
            out.push(b);
        }
        out
    }

    #[test]
    fn test_buffered_channel_seek_and_read() {
        let factory = ReadAtChannelFactory::new(Arc::new(b"0123456789abcdef".to_vec()));
        let mut stream = BufferedChannel::new(factory.open().unwrap(), 4);

        stream.seek(10);
        assert_eq!(stream.peek_byte().unwrap(), Some(b'a'));
        assert_eq!(stream.position(), 10);
        assert_eq!(drain(&mut stream), b"abcdef");
        assert_eq!(stream.position(), 16);

        stream.seek(2);
        assert_eq!(stream.next_byte().unwrap(), Some(b'2'));
        assert_eq!(stream.next_byte().unwrap(), Some(b'3'));
        stream.seek(3);
        assert_eq!(stream.next_byte().unwrap(), Some(b'3'));

        stream.seek(100);
        assert_eq!(stream.next_byte().unwrap(), None);
        assert_eq!(stream.position(), 100);
    }

    #[test]
    fn test_reader_stream_positions() {
        let data = (0..=255u8).cycle().take(1000).collect::<Vec<_>>();
        let mut stream = ReaderStream::with_capacity(&data[..], 7);
        assert_eq!(stream.position(), 0);
        for i in 0..1000u64 {
            assert_eq!(stream.position(), i);
            assert_eq!(stream.next_byte().unwrap(), Some((i % 256) as u8));
        }
        assert_eq!(stream.peek_byte().unwrap(), None);
        assert_eq!(stream.position(), 1000);
    }
}
