use std::{fs::File, path::PathBuf, sync::Arc};

use lazyjson_blueprint::BlueprintSource;
use lazyjson_common::{Error, Result};
use lazyjson_io::{ChannelFactory, FileChannelFactory, ReadAt, ReadAtChannelFactory, ReaderStream};

use crate::{config::Config, indexer, mapper::ElementMapper};

/// Where the JSON document lives.
///
/// The document must not change while a [`Root`](crate::Root) opened over it is alive:
/// lazy reads go back to the offsets recorded during indexing.
#[derive(Debug, Clone)]
pub enum JsonSource {
    File(PathBuf),
    Memory(Arc<Vec<u8>>),
}

impl JsonSource {
    pub fn file(path: impl Into<PathBuf>) -> JsonSource {
        JsonSource::File(path.into())
    }

    pub fn memory(bytes: impl Into<Vec<u8>>) -> JsonSource {
        JsonSource::Memory(Arc::new(bytes.into()))
    }

    pub fn describe(&self) -> String {
        match self {
            JsonSource::File(path) => path.display().to_string(),
            JsonSource::Memory(bytes) => format!("<memory: {} bytes>", bytes.len()),
        }
    }

    pub(crate) fn channel_factory(&self) -> Arc<dyn ChannelFactory> {
        match self {
            JsonSource::File(path) => Arc::new(FileChannelFactory::new(path)),
            JsonSource::Memory(bytes) => {
                Arc::new(ReadAtChannelFactory::new(bytes.clone() as Arc<dyn ReadAt>))
            }
        }
    }

    /// Runs the indexing pass over the whole document.
    pub(crate) fn index(&self, root: &ElementMapper, config: &Config) -> Result<BlueprintSource> {
        match self {
            JsonSource::File(path) => {
                let file = File::open(path)
                    .map_err(|e| Error::io(format!("open {}", path.display()), e))?;
                indexer::index(ReaderStream::new(file), root, config)
            }
            JsonSource::Memory(bytes) => {
                indexer::index(ReaderStream::new(bytes.as_slice()), root, config)
            }
        }
    }
}
