//! I/O abstractions over the source JSON document:
//! - `ReadAt`: positional reader able to fetch bytes from arbitrary offsets of a file/blob.
//! - `Channel`: a per-consumer random-access handle with an explicit, fallible `close()`.
//! - `BufferedChannel`: a forward-reading byte stream positioned by absolute offset.
//! - `ChannelPool`: per-thread channel reuse with aggregate shutdown.

use std::sync::Arc;

pub mod channel;
pub mod file;
pub mod memory;
pub mod pool;
pub mod stream;
pub mod utils;

pub use channel::{Channel, ChannelFactory, FileChannelFactory, ReadAtChannelFactory};
pub use pool::{ChannelPool, PooledChannel};
pub use stream::{BufferedChannel, ByteStream, ReaderStream};

/// A trait representing a conceptual file or buffer that supports reading from arbitrary
/// positions.
pub trait ReadAt: Send + Sync + 'static {
    /// Returns the size of the underlying object.
    fn size(&self) -> std::io::Result<u64>;

    /// Reads bytes starting at `pos` into `buf`, returning the number of bytes read.
    ///
    /// **NOTE**: `read_at` should not return with a short read, unless end-of-file
    /// is encountered. Reading at or past the end returns `Ok(0)`.
    fn read_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Retrieves the storage profile associated with this reader.
    fn storage_profile(&self) -> StorageProfile;
}

/// Characterizes the performance aspects of the underlying storage implementation.
#[derive(Debug, Clone)]
pub struct StorageProfile {
    /// Suggested minimum size for an effective I/O request.
    pub min_io_size: usize,

    /// Suggested maximum size for a single I/O request.
    pub max_io_size: usize,
}

impl StorageProfile {
    /// Clamps a given I/O size to the recommended range defined by this profile.
    ///
    /// The minimum size is guaranteed to be at least 1, and the maximum size is
    /// guaranteed to be at least the minimum size.
    pub fn clamp_io_size(&self, size: usize) -> usize {
        let min = self.min_io_size.max(1).min(self.max_io_size.max(1));
        let max = self.max_io_size.max(1).max(min);
        size.clamp(min, max)
    }
}

impl Default for StorageProfile {
    fn default() -> StorageProfile {
        Self {
            min_io_size: 4 * 1024,
            max_io_size: 4 * 1024 * 1024,
        }
    }
}

impl<T> ReadAt for Arc<T>
where
    T: ReadAt + ?Sized,
{
    fn size(&self) -> std::io::Result<u64> {
        self.as_ref().size()
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        self.as_ref().read_at(pos, buf)
    }

    fn storage_profile(&self) -> StorageProfile {
        self.as_ref().storage_profile()
    }
}

#[cfg(test)]
mod tests {
    use super::StorageProfile;

    #[test]
    fn test_clamp_io_size() {
        let profile = StorageProfile {
            min_io_size: 16,
            max_io_size: 1024,
        };
        assert_eq!(profile.clamp_io_size(1), 16);
        assert_eq!(profile.clamp_io_size(100), 100);
        assert_eq!(profile.clamp_io_size(1 << 20), 1024);

        let degenerate = StorageProfile {
            min_io_size: 0,
            max_io_size: 0,
        };
        assert_eq!(degenerate.clamp_io_size(8), 1);
    }
}
