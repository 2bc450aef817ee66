//! Append-only blueprint log.
//!
//! The writer appends backward-readable cells and lists; the caller remembers
//! [`BlueprintWriter::position`] after each record and later jumps a reader there to
//! decode the record from its end. Nothing is ever rewritten, so the total size does
//! not have to be known up front.

use std::{fs::File, path::PathBuf, sync::Arc};

use lazyjson_common::{Error, Result, verify_arg};

use crate::{
    keys::{FixedKeys, Key},
    store::{BackingKind, BlockStore, BlueprintStore, FileStore, MemoryStore},
    varint::{self, Backward},
};

/// Writes to the spill file are batched into chunks of this size.
const SPILL_CHUNK: usize = 64 * 1024;

/// Backing store selection for a blueprint.
#[derive(Debug, Clone)]
pub struct BlueprintConfig {
    /// Largest blueprint kept in memory; anything larger stays in a temporary file.
    pub memory_threshold: u64,
    /// Directory for the spill file. The system temp directory when `None`.
    pub temp_dir: Option<PathBuf>,
    /// Largest in-memory blueprint held as a single array.
    pub single_array_limit: u64,
    /// Log2 of the block size used for in-memory blueprints above `single_array_limit`.
    pub block_shift: u32,
}

impl Default for BlueprintConfig {
    fn default() -> Self {
        BlueprintConfig {
            memory_threshold: 64 * 1024 * 1024,
            temp_dir: None,
            single_array_limit: 1 << 31,
            block_shift: 30,
        }
    }
}

impl BlueprintConfig {
    pub fn with_memory_threshold(mut self, memory_threshold: u64) -> Self {
        self.memory_threshold = memory_threshold;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    pub fn with_blocks(mut self, single_array_limit: u64, block_shift: u32) -> Self {
        self.single_array_limit = single_array_limit;
        self.block_shift = block_shift;
        self
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(
            block_shift,
            (4..=31).contains(&self.block_shift),
            "{} is outside 4..=31",
            self.block_shift
        );
        Ok(())
    }
}

/// Single-writer append log, closed into a [`BlueprintSource`].
pub struct BlueprintWriter {
    config: BlueprintConfig,
    pending: Vec<u8>,
    spill: Option<File>,
    spilled: u64,
}

impl BlueprintWriter {
    pub fn new(config: BlueprintConfig) -> Result<BlueprintWriter> {
        config.validate()?;
        Ok(BlueprintWriter {
            config,
            pending: Vec::new(),
            spill: None,
            spilled: 0,
        })
    }

    /// Current write offset. Taken right after a record, it is that record's handle.
    pub fn position(&self) -> u64 {
        self.spilled + self.pending.len() as u64
    }

    /// Appends a single key.
    pub fn put(&mut self, key: Key) -> Result<()> {
        verify_arg!(
            key,
            key >= 0 && key as u64 <= varint::MAX_VALUE,
            "{key} is not encodable"
        );
        varint::write_backward(key as u64, &mut self.pending);
        self.after_write()
    }

    /// Appends a list of keys, each in `0..=max_value`.
    pub fn put_list(&mut self, keys: &[Key], max_value: Key) -> Result<()> {
        verify_arg!(max_value, max_value >= 0);
        verify_arg!(keys, keys.len() as u64 <= varint::MAX_VALUE);
        let mut values = Vec::with_capacity(keys.len());
        for &key in keys {
            if key < 0 || key > max_value {
                return Err(Error::invalid_arg(
                    "keys",
                    format!("key {key} outside 0..={max_value}"),
                ));
            }
            values.push(key as u64);
        }
        varint::write_list(&values, max_value as u64, &mut self.pending);
        self.after_write()
    }

    /// Appends the content of a key storage as one list.
    pub fn put_keys(&mut self, keys: &FixedKeys) -> Result<()> {
        self.put_list(&keys.to_vec(), keys.max_value().max(0))
    }

    /// Freezes the log and picks the backing store by its total size.
    pub fn close(mut self) -> Result<BlueprintSource> {
        let len = self.position();
        let store: Arc<dyn BlueprintStore> = match self.spill.take() {
            Some(file) => {
                flush(&file, &mut self.spilled, &mut self.pending)?;
                Arc::new(FileStore::new(file, len))
            }
            None if len <= self.config.single_array_limit => {
                Arc::new(MemoryStore::new(std::mem::take(&mut self.pending)))
            }
            None => Arc::new(BlockStore::new(
                std::mem::take(&mut self.pending),
                self.config.block_shift,
            )),
        };
        log::debug!("blueprint closed: {len} bytes, {:?} backing", store.kind());
        Ok(BlueprintSource { store })
    }

    fn after_write(&mut self) -> Result<()> {
        if self.spill.is_none() && self.position() > self.config.memory_threshold {
            let file = match &self.config.temp_dir {
                Some(dir) => tempfile::tempfile_in(dir),
                None => tempfile::tempfile(),
            }
            .map_err(|e| Error::io("create blueprint spill file", e))?;
            log::debug!(
                "blueprint exceeds {} bytes, spilling to a temporary file",
                self.config.memory_threshold
            );
            self.spill = Some(file);
        }
        match &self.spill {
            Some(file) if self.pending.len() >= SPILL_CHUNK => {
                flush(file, &mut self.spilled, &mut self.pending)
            }
            _ => Ok(()),
        }
    }
}

fn flush(file: &File, spilled: &mut u64, pending: &mut Vec<u8>) -> Result<()> {
    lazyjson_io::file::file_write_at(file, *spilled, pending)
        .map_err(|e| Error::io("write blueprint spill file", e))?;
    *spilled += pending.len() as u64;
    pending.clear();
    Ok(())
}

/// A closed blueprint. Cheap to clone; every consumer opens its own reader.
#[derive(Clone)]
pub struct BlueprintSource {
    store: Arc<dyn BlueprintStore>,
}

impl BlueprintSource {
    pub fn reader(&self) -> BlueprintReader {
        BlueprintReader {
            store: self.store.clone(),
            pos: self.store.len(),
        }
    }

    pub fn len(&self) -> u64 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn backing(&self) -> BackingKind {
        self.store.kind()
    }
}

impl std::fmt::Debug for BlueprintSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueprintSource")
            .field("len", &self.len())
            .field("backing", &self.backing())
            .finish()
    }
}

/// Backward cursor over a closed blueprint, initially positioned at its end.
///
/// A failed read leaves the position unchanged.
pub struct BlueprintReader {
    store: Arc<dyn BlueprintStore>,
    pos: u64,
}

impl BlueprintReader {
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn set_position(&mut self, pos: u64) -> Result<()> {
        if pos > self.store.len() {
            return Err(Error::out_of_bounds("blueprint position", pos, self.store.len()));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes the key ending at the current position and moves before it.
    pub fn get(&mut self) -> Result<Key> {
        let (value, start) = self.read_cell(self.pos)?;
        self.pos = start;
        Ok(value as Key)
    }

    /// Decodes the list ending at the current position and moves before it.
    pub fn get_list(&mut self) -> Result<FixedKeys> {
        let (count, cell_start) = self.read_cell(self.pos)?;
        if cell_start == 0 {
            return Err(Error::out_of_bounds("blueprint list tag", 0, self.len()));
        }
        let mut tag = [0u8; 1];
        self.store.read_into(cell_start - 1, &mut tag)?;
        let width = varint::check_list_tag(tag[0])?;

        let tail = cell_start - 1;
        let len = count
            .checked_mul(width as u64)
            .filter(|&len| len <= tail)
            .ok_or_else(|| Error::out_of_bounds("blueprint list", count, tail))?;
        let start = tail - len;
        let mut bytes = vec![0u8; len as usize];
        self.store.read_into(start, &mut bytes)?;

        let mut keys = Vec::with_capacity(count as usize);
        for chunk in bytes.chunks_exact(width) {
            let value = varint::read_list_element(chunk, width);
            if value > i64::MAX as u64 {
                return Err(Error::invalid_format_msg(
                    "blueprint list",
                    format!("element {value} is not a valid key"),
                ));
            }
            keys.push(value as Key);
        }
        self.pos = start;
        Ok(FixedKeys::from_keys(&keys))
    }

    /// Reads the cell ending at `end`, returning its value and start offset.
    fn read_cell(&self, end: u64) -> Result<(u64, u64)> {
        if end == 0 {
            return Err(Error::out_of_bounds("blueprint", 0, self.len()));
        }
        let n = end.min(8) as usize;
        let mut window = [0u8; 8];
        self.store.read_into(end - n as u64, &mut window[..n])?;
        let mut src = Backward::new(&window[..n]);
        let value = varint::decode(&mut src)?;
        let consumed = (n - src.position()) as u64;
        Ok((value, end - consumed))
    }
}
