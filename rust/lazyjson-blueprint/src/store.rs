//! Frozen backing stores of a closed blueprint.

use std::fs::File;

use lazyjson_common::{Error, Result};

/// Where the bytes of a closed blueprint live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingKind {
    /// A single in-memory array.
    Memory,
    /// Several fixed-size in-memory blocks addressed by a high-bit shift.
    Blocks,
    /// The anonymous temporary file written during indexing.
    File,
}

pub(crate) trait BlueprintStore: Send + Sync + 'static {
    fn len(&self) -> u64;

    /// Fills `buf` with the bytes at `pos..pos + buf.len()`.
    fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()>;

    fn kind(&self) -> BackingKind;
}

fn check_range(pos: u64, len: usize, size: u64) -> Result<()> {
    match pos.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::out_of_bounds("blueprint", pos + len as u64, size)),
    }
}

pub(crate) struct MemoryStore(Box<[u8]>);

impl MemoryStore {
    pub fn new(data: Vec<u8>) -> MemoryStore {
        MemoryStore(data.into_boxed_slice())
    }
}

impl BlueprintStore for MemoryStore {
    fn len(&self) -> u64 {
        self.0.len() as u64
    }

    fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        check_range(pos, buf.len(), self.len())?;
        let pos = pos as usize;
        buf.copy_from_slice(&self.0[pos..pos + buf.len()]);
        Ok(())
    }

    fn kind(&self) -> BackingKind {
        BackingKind::Memory
    }
}

/// Blocks of `1 << shift` bytes; byte `pos` lives in block `pos >> shift`.
pub(crate) struct BlockStore {
    blocks: Vec<Box<[u8]>>,
    shift: u32,
    len: u64,
}

impl BlockStore {
    pub fn new(data: Vec<u8>, shift: u32) -> BlockStore {
        let len = data.len() as u64;
        let blocks = data
            .chunks(1usize << shift)
            .map(|chunk| chunk.to_vec().into_boxed_slice())
            .collect();
        BlockStore { blocks, shift, len }
    }
}

impl BlueprintStore for BlockStore {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        check_range(pos, buf.len(), self.len)?;
        let mask = (1u64 << self.shift) - 1;
        let mut pos = pos;
        let mut done = 0;
        while done < buf.len() {
            let block = &self.blocks[(pos >> self.shift) as usize];
            let offset = (pos & mask) as usize;
            let n = std::cmp::min(block.len() - offset, buf.len() - done);
            buf[done..done + n].copy_from_slice(&block[offset..offset + n]);
            done += n;
            pos += n as u64;
        }
        Ok(())
    }

    fn kind(&self) -> BackingKind {
        BackingKind::Blocks
    }
}

/// The spill file; it has no name on disk and disappears when dropped.
pub(crate) struct FileStore {
    file: File,
    len: u64,
}

impl FileStore {
    pub fn new(file: File, len: u64) -> FileStore {
        FileStore { file, len }
    }
}

impl BlueprintStore for FileStore {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        check_range(pos, buf.len(), self.len)?;
        lazyjson_io::file::file_read_at_exact(&self.file, pos, buf)
            .map_err(|e| Error::io("read blueprint file", e))
    }

    fn kind(&self) -> BackingKind {
        BackingKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockStore, BlueprintStore, MemoryStore};

    #[test]
    fn test_block_store_reads_across_blocks() {
        let data = (0..100u8).collect::<Vec<_>>();
        let store = BlockStore::new(data.clone(), 4);
        assert_eq!(store.blocks.len(), 7);
        assert_eq!(store.len(), 100);

        let mut buf = [0u8; 40];
        store.read_into(10, &mut buf).unwrap();
        assert_eq!(&buf[..], &data[10..50]);

        let mut tail = [0u8; 4];
        store.read_into(96, &mut tail).unwrap();
        assert_eq!(tail, [96, 97, 98, 99]);
        assert!(store.read_into(97, &mut tail).is_err());
    }

    #[test]
    fn test_memory_store_bounds() {
        let store = MemoryStore::new(vec![1, 2, 3]);
        let mut buf = [0u8; 2];
        store.read_into(1, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
        assert!(store.read_into(2, &mut buf).is_err());
    }
}
