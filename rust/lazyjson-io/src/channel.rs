//! Random-access channels over the source document.

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{ReadAt, StorageProfile, file::read_clamped};

/// A random-access byte channel owned by a single consumer at a time.
///
/// Unlike [`ReadAt`], a channel may carry per-consumer state (an open file handle, a seek
/// position) and has an explicit, fallible `close`.
pub trait Channel: Send + 'static {
    /// Returns the size of the underlying document.
    fn size(&self) -> std::io::Result<u64>;

    /// Reads bytes starting at `pos` into `buf`, returning the number of bytes read.
    /// A short read only happens at the end of the document.
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Suggested I/O granularity for this channel.
    fn storage_profile(&self) -> StorageProfile;

    /// Releases the resources held by this channel.
    fn close(self: Box<Self>) -> std::io::Result<()>;
}

/// Creates channels on demand, one per consumer.
pub trait ChannelFactory: Send + Sync + 'static {
    fn open(&self) -> std::io::Result<Box<dyn Channel>>;

    /// Human-readable description of the document, used in error contexts and logs.
    fn describe(&self) -> String;
}

/// Opens a separate file handle for every channel.
pub struct FileChannelFactory {
    path: PathBuf,
}

impl FileChannelFactory {
    pub fn new(path: impl AsRef<Path>) -> FileChannelFactory {
        FileChannelFactory {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ChannelFactory for FileChannelFactory {
    fn open(&self) -> std::io::Result<Box<dyn Channel>> {
        let file = File::open(&self.path)?;
        let size = file.metadata()?.len();
        Ok(Box::new(FileChannel { file, size }))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

struct FileChannel {
    file: File,
    size: u64,
}

impl Channel for FileChannel {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.size)
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        read_clamped(&self.file, self.size, pos, buf)
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 4 * 1024,
            max_io_size: 1024 * 1024,
        }
    }

    fn close(self: Box<Self>) -> std::io::Result<()> {
        drop(self.file);
        Ok(())
    }
}

/// Hands out channels sharing a single thread-safe [`ReadAt`] source.
pub struct ReadAtChannelFactory {
    source: Arc<dyn ReadAt>,
}

impl ReadAtChannelFactory {
    pub fn new(source: Arc<dyn ReadAt>) -> ReadAtChannelFactory {
        ReadAtChannelFactory { source }
    }
}

impl ChannelFactory for ReadAtChannelFactory {
    fn open(&self) -> std::io::Result<Box<dyn Channel>> {
        Ok(Box::new(ReadAtChannel {
            source: self.source.clone(),
        }))
    }

    fn describe(&self) -> String {
        match self.source.size() {
            Ok(size) => format!("<memory: {size} bytes>"),
            Err(_) => "<memory>".to_string(),
        }
    }
}

struct ReadAtChannel {
    source: Arc<dyn ReadAt>,
}

impl Channel for ReadAtChannel {
    fn size(&self) -> std::io::Result<u64> {
        self.source.size()
    }

    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        self.source.read_at(pos, buf)
    }

    fn storage_profile(&self) -> StorageProfile {
        self.source.storage_profile()
    }

    fn close(self: Box<Self>) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{ChannelFactory, FileChannelFactory};

    #[test]
    fn test_file_channels_are_independent() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("doc.json");
        std::fs::File::create(&path)
            .and_then(|mut f| f.write_all(b"{\"a\": 1}"))
            .expect("write");

        let factory = FileChannelFactory::new(&path);
        let mut first = factory.open().unwrap();
        let mut second = factory.open().unwrap();
        assert_eq!(first.size().unwrap(), 8);

        let mut buf = [0u8; 3];
        assert_eq!(first.read_at(1, &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"\"a\"");
        assert_eq!(second.read_at(6, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"1}");

        first.close().unwrap();
        second.close().unwrap();
        assert!(factory.describe().ends_with("doc.json"));
    }
}
