use std::sync::{
    Arc, RwLock,
    atomic::{AtomicBool, Ordering},
};

use lazyjson_blueprint::{BackingKind, BlueprintSource, FixedKeys, Key};
use lazyjson_common::{Error, ErrorKind, Result, verify_data};
use lazyjson_io::ChannelPool;

use crate::{
    branch::{self, LazyList, LazyObject},
    cache::ValueCache,
    config::{Config, FailedReadPolicy, UnsupportedAccessorPolicy},
    decode,
    json::JsonReader,
    mapper::{self, ElementMapper, Node},
    schema::{ScalarKind, Shape},
    source::JsonSource,
    value::{Scalar, Value},
};

/// Answers accessor calls that have no mapped field: receives the accessor name and
/// its arguments.
pub type Fallback = Arc<dyn Fn(&str, &[String]) -> Result<Value> + Send + Sync>;

/// Options for opening a [`Root`].
#[derive(Clone, Default)]
pub struct OpenOptions {
    config: Config,
    fallback: Option<Fallback>,
}

impl OpenOptions {
    pub fn new(config: Config) -> OpenOptions {
        OpenOptions {
            config,
            fallback: None,
        }
    }

    /// Sets the function consulted under [`UnsupportedAccessorPolicy::Fallback`].
    pub fn fallback<F>(mut self, fallback: F) -> OpenOptions
    where
        F: Fn(&str, &[String]) -> Result<Value> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Indexes `source` against `shape` and returns the root of the document.
    ///
    /// The whole document is scanned once; malformed JSON, values of the wrong type and
    /// (depending on the configuration) unknown or missing fields fail here rather than
    /// on first access.
    pub fn open(self, source: JsonSource, shape: &Shape) -> Result<Root> {
        let OpenOptions { config, fallback } = self;
        config.validate()?;
        if config.unsupported_accessor == UnsupportedAccessorPolicy::Fallback && fallback.is_none()
        {
            return Err(Error::invalid_arg(
                "fallback",
                "required by the `fallback` unsupported accessor policy",
            ));
        }

        let element = mapper::compile(shape, &config)?;
        let blueprint = source.index(&element, &config)?;
        let mut reader = blueprint.reader();
        let lists = reader.get_list()?;
        let keys = reader.get_list()?;
        verify_data!(
            keys,
            keys.len() == element.width(),
            "root has {} keys, expected {}",
            keys.len(),
            element.width()
        );

        let description = source.describe();
        log::info!(
            "opened {description}: {} list(s), {} blueprint bytes ({:?})",
            lists.len(),
            blueprint.len(),
            blueprint.backing()
        );
        Ok(Root(Arc::new(RootCore {
            pool: ChannelPool::new(source.channel_factory(), config.channel_buffer_size)
                .with_max_threads(config.max_channel_threads),
            cache: ValueCache::new(config.cache_size),
            description,
            element,
            keys: Arc::new(keys),
            lists,
            blueprint: RwLock::new(Some(blueprint)),
            unsupported_accessor: config.unsupported_accessor,
            failed_read: config.failed_read,
            fallback,
            closed: AtomicBool::new(false),
        })))
    }
}

/// An indexed JSON document.
///
/// Holds the blueprint, the channel pool used for lazy reads and the value cache.
/// Cloning is cheap; all clones, and every branch obtained from them, share one
/// lifecycle: after [`close`](Root::close) every access fails with a `Closed` error.
#[derive(Clone)]
pub struct Root(Arc<RootCore>);

struct RootCore {
    description: String,
    element: Arc<ElementMapper>,
    /// Keys of the root element.
    keys: Arc<FixedKeys>,
    /// Blueprint position of every list record, by list id.
    lists: FixedKeys,
    blueprint: RwLock<Option<BlueprintSource>>,
    pool: ChannelPool,
    cache: ValueCache,
    unsupported_accessor: UnsupportedAccessorPolicy,
    failed_read: FailedReadPolicy,
    fallback: Option<Fallback>,
    closed: AtomicBool,
}

impl Root {
    /// Opens `source` with the default configuration.
    pub fn open(source: JsonSource, shape: &Shape) -> Result<Root> {
        OpenOptions::default().open(source, shape)
    }

    /// The document's top-level value: an object, a list or null.
    pub fn root(&self) -> Result<Value> {
        self.check_open()?;
        match self.0.element.node() {
            Node::Object(mapper) => branch::object_value(self, mapper, &self.0.keys, 0, 0),
            Node::List(element) => branch::list_value(self, element, self.0.keys.get(0)?),
            Node::Scalar(kind) => Err(Error::invalid_definition(format!(
                "root must be an object or a list, found {}",
                kind.name()
            ))),
        }
    }

    /// The top-level object, `None` if the document is `null`.
    pub fn object(&self) -> Result<Option<LazyObject>> {
        self.expect_root("object", matches!(self.0.element.node(), Node::Object(_)))?;
        match self.root()? {
            Value::Null => Ok(None),
            Value::Object(object) => Ok(Some(object)),
            other => Err(Error::invalid_arg(
                "root",
                format!("expected object, found {}", other.type_name()),
            )),
        }
    }

    /// The top-level list, `None` if the document is `null`.
    pub fn list(&self) -> Result<Option<LazyList>> {
        self.expect_root("list", matches!(self.0.element.node(), Node::List(_)))?;
        match self.root()? {
            Value::Null => Ok(None),
            Value::List(list) => Ok(Some(list)),
            other => Err(Error::invalid_arg(
                "root",
                format!("expected list, found {}", other.type_name()),
            )),
        }
    }

    fn expect_root(&self, expected: &str, matches: bool) -> Result<()> {
        if matches {
            return Ok(());
        }
        Err(Error::invalid_arg(
            "root",
            format!("expected {expected}, the root is {}", self.0.element.name()),
        ))
    }

    pub fn description(&self) -> &str {
        &self.0.description
    }

    /// Backing store of the blueprint, `None` once closed.
    pub fn backing(&self) -> Option<BackingKind> {
        self.blueprint().as_ref().map(BlueprintSource::backing)
    }

    /// Number of lists recorded in the blueprint.
    pub fn list_count(&self) -> usize {
        self.0.lists.len()
    }

    /// Number of values currently held by the value cache.
    pub fn cached_values(&self) -> usize {
        self.0.cache.len()
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }

    /// Releases the blueprint, the cache and every pooled channel.
    ///
    /// Waits for reads in flight on other threads to finish. Only the first call does
    /// any work; later calls return `Ok(())`.
    pub fn close(&self) -> Result<()> {
        if self.0.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut errors = Vec::new();
        if let Err(e) = self.0.pool.close() {
            errors.push(e);
        }
        let blueprint = self
            .0
            .blueprint
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let cached = self.0.cache.len();
        self.0.cache.clear();
        log::info!(
            "closed {}: released {} blueprint bytes, {cached} cached value(s), {} error(s)",
            self.0.description,
            blueprint.as_ref().map_or(0, BlueprintSource::len),
            errors.len()
        );
        drop(blueprint);
        Error::aggregate(errors)
    }
}

impl Root {
    pub(crate) fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::closed(self.0.description.as_str()));
        }
        Ok(())
    }

    fn blueprint(&self) -> std::sync::RwLockReadGuard<'_, Option<BlueprintSource>> {
        self.0.blueprint.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Looks up a list key: returns the element keys and the offset of the list's `[`.
    pub(crate) fn resolve_list(&self, key: Key) -> Result<(Arc<FixedKeys>, u64)> {
        verify_data!(key, key > 0, "{key} is not a list key");
        let handle = self.0.lists.get((key - 1) as usize)?;
        let mut reader = match self.blueprint().as_ref() {
            Some(source) => source.reader(),
            None => return Err(Error::closed(self.0.description.as_str())),
        };
        reader.set_position(handle as u64)?;
        let base = reader.get()?;
        let keys = reader.get_list()?;
        Ok((Arc::new(keys), base as u64))
    }

    /// Decodes the scalar whose text starts at absolute offset `pos`, through the cache.
    pub(crate) fn read_scalar(
        &self,
        kind: &ScalarKind,
        pos: u64,
        field: &str,
    ) -> Result<Option<Scalar>> {
        self.0.cache.get_or_load(pos, || {
            let mut channel = self.0.pool.checkout()?;
            channel.seek(pos);
            let mut reader = JsonReader::new(&mut *channel);
            decode::read_scalar(&mut reader, kind, field)
        })
    }

    /// Applies the failed-read policy to a decode error.
    ///
    /// Closed and conversion errors are never masked.
    pub(crate) fn recover(
        &self,
        accessor: &str,
        args: Vec<String>,
        default: Value,
        error: Error,
    ) -> Result<Value> {
        if error.is_closed() || matches!(error.kind(), ErrorKind::Conversion { .. }) {
            return Err(error);
        }
        match self.0.failed_read {
            FailedReadPolicy::Default => {
                log::debug!("read of {accessor} failed, using its default: {error}");
                Ok(default)
            }
            FailedReadPolicy::Fail => Err(Error::value_read(accessor, args, error)),
        }
    }

    /// Handles a call to an accessor that has no mapped field.
    pub(crate) fn unsupported(&self, owner: &str, name: &str, args: &[String]) -> Result<Value> {
        match (&self.0.fallback, self.0.unsupported_accessor) {
            (Some(fallback), UnsupportedAccessorPolicy::Fallback) => fallback(name, args),
            _ => Err(Error::unsupported_accessor(format!("{owner}.{name}"))),
        }
    }
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("source", &self.0.description)
            .field("root", &self.0.element.name())
            .field("lists", &self.0.lists.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
