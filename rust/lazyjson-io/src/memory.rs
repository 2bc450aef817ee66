use crate::{ReadAt, StorageProfile};

impl<T> ReadAt for T
where
    T: details::SliceBytes + Send + Sync + 'static,
{
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.as_bytes().len() as u64)
    }

    fn read_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        let content = self.as_bytes();
        if pos >= content.len() as u64 {
            return Ok(0);
        }
        let pos = pos as usize;
        let len = std::cmp::min(buf.len(), content.len() - pos);
        buf[..len].copy_from_slice(&content[pos..pos + len]);
        Ok(len)
    }

    fn storage_profile(&self) -> StorageProfile {
        StorageProfile {
            min_io_size: 1,
            max_io_size: self
                .as_bytes()
                .len()
                .min(StorageProfile::default().max_io_size),
        }
    }
}

mod details {
    pub trait SliceBytes {
        fn as_bytes(&self) -> &[u8];
    }

    impl SliceBytes for Vec<u8> {
        fn as_bytes(&self) -> &[u8] {
            self.as_slice()
        }
    }

    impl SliceBytes for Box<[u8]> {
        fn as_bytes(&self) -> &[u8] {
            self
        }
    }

    impl SliceBytes for &'static [u8] {
        fn as_bytes(&self) -> &[u8] {
            self
        }
    }

    impl SliceBytes for String {
        fn as_bytes(&self) -> &[u8] {
            str::as_bytes(self)
        }
    }
}
