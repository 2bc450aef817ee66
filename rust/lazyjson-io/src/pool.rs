//! Per-thread channel reuse with a single serialized shutdown.

use std::{
    ops::{Deref, DerefMut},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread::ThreadId,
};

use ahash::AHashMap;
use lazyjson_common::{Error, Result};

use crate::{channel::ChannelFactory, stream::BufferedChannel};

/// Pool of [`BufferedChannel`]s with thread affinity.
///
/// Every thread lazily gets its own channel on the first `checkout()`, and the channel is
/// returned to that thread's slot when the [`PooledChannel`] guard is dropped, so channel
/// state (read-ahead window, position) is never shared between threads.
///
/// Idle channels are kept for at most `max_threads` threads. When another thread returns
/// its channel, the channels of some other thread are closed; a thread that comes back
/// after that opens a new channel. Threads that have exited are never detected.
///
/// `close()` refuses new checkouts, waits until every outstanding checkout has been
/// released, then closes all tracked channels and reports every close failure, including
/// the failures of channels evicted earlier.
pub struct ChannelPool {
    factory: Arc<dyn ChannelFactory>,
    buffer_size: usize,
    max_threads: usize,
    /// Channels not currently checked out, keyed by the thread that used them last.
    idle: Mutex<AHashMap<ThreadId, Vec<BufferedChannel>>>,
    /// Close failures of evicted channels, reported by `close()`.
    evicted_failures: Mutex<Vec<Error>>,
    /// Number of checkouts in flight (including the ones still being created).
    pending: AtomicUsize,
    closed: AtomicBool,
    opened: AtomicUsize,
}

pub const DEFAULT_MAX_THREADS: usize = 64;

impl ChannelPool {
    pub fn new(factory: Arc<dyn ChannelFactory>, buffer_size: usize) -> ChannelPool {
        ChannelPool {
            factory,
            buffer_size,
            max_threads: DEFAULT_MAX_THREADS,
            idle: Default::default(),
            evicted_failures: Default::default(),
            pending: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            opened: AtomicUsize::new(0),
        }
    }

    /// Limits the number of threads whose idle channels are kept; at least one.
    pub fn with_max_threads(mut self, max_threads: usize) -> ChannelPool {
        self.max_threads = max_threads.max(1);
        self
    }

    /// Returns the calling thread's channel, creating it on first use.
    ///
    /// Fails with a `Closed` error once the pool has been shut down.
    pub fn checkout(&self) -> Result<PooledChannel<'_>> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::closed("channel pool"));
        }

        let thread = std::thread::current().id();
        let reused = {
            let mut idle = self.idle();
            let channel = idle.get_mut(&thread).and_then(Vec::pop);
            if idle.get(&thread).is_some_and(Vec::is_empty) {
                idle.remove(&thread);
            }
            channel
        };
        let channel = match reused {
            Some(channel) => channel,
            None => match self.open_channel() {
                Ok(channel) => channel,
                Err(e) => {
                    self.pending.fetch_sub(1, Ordering::SeqCst);
                    return Err(e);
                }
            },
        };

        Ok(PooledChannel {
            pool: self,
            thread,
            channel: Some(channel),
        })
    }

    /// Shuts the pool down. Subsequent calls are no-ops returning `Ok(())`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        while self.pending.load(Ordering::SeqCst) != 0 {
            std::hint::spin_loop();
            std::thread::yield_now();
        }

        let channels = std::mem::take(&mut *self.idle());
        let mut errors = std::mem::take(&mut *self.evicted_failures());
        let mut count = 0usize;
        for channel in channels.into_values().flatten() {
            count += 1;
            if let Err(e) = self.close_channel(channel) {
                errors.push(e);
            }
        }
        log::debug!(
            "closed {count} channel(s) for {} ({} failed)",
            self.factory.describe(),
            errors.len()
        );
        Error::aggregate(errors)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of idle channels currently tracked by the pool.
    pub fn idle_count(&self) -> usize {
        self.idle().values().map(Vec::len).sum()
    }

    /// Total number of channels opened over the lifetime of the pool.
    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    fn open_channel(&self) -> Result<BufferedChannel> {
        let channel = self
            .factory
            .open()
            .map_err(|e| Error::io(format!("open channel for {}", self.factory.describe()), e))?;
        let buffer_size = channel.storage_profile().clamp_io_size(self.buffer_size);
        self.opened.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "opened channel for {} on {:?} (buffer {buffer_size} bytes)",
            self.factory.describe(),
            std::thread::current().id()
        );
        Ok(BufferedChannel::new(channel, buffer_size))
    }

    fn close_channel(&self, channel: BufferedChannel) -> Result<()> {
        channel.close().map_err(|e| {
            log::warn!("failed to close channel for {}: {e}", self.factory.describe());
            Error::io(format!("close channel for {}", self.factory.describe()), e)
        })
    }

    fn release(&self, thread: ThreadId, channel: BufferedChannel) {
        let evicted = {
            let mut idle = self.idle();
            let evicted = if idle.len() >= self.max_threads && !idle.contains_key(&thread) {
                let victim = idle.keys().next().copied();
                victim.and_then(|victim| idle.remove(&victim))
            } else {
                None
            };
            idle.entry(thread).or_default().push(channel);
            evicted
        };

        for channel in evicted.into_iter().flatten() {
            if let Err(e) = self.close_channel(channel) {
                self.evicted_failures().push(e);
            }
        }
    }

    fn idle(&self) -> MutexGuard<'_, AHashMap<ThreadId, Vec<BufferedChannel>>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn evicted_failures(&self) -> MutexGuard<'_, Vec<Error>> {
        self.evicted_failures.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A channel checked out of a [`ChannelPool`]; returned to the pool on drop.
pub struct PooledChannel<'a> {
    pool: &'a ChannelPool,
    thread: ThreadId,
    channel: Option<BufferedChannel>,
}

impl Deref for PooledChannel<'_> {
    type Target = BufferedChannel;

    fn deref(&self) -> &BufferedChannel {
        self.channel.as_ref().expect("channel is held until drop")
    }
}

impl DerefMut for PooledChannel<'_> {
    fn deref_mut(&mut self) -> &mut BufferedChannel {
        self.channel.as_mut().expect("channel is held until drop")
    }
}

impl Drop for PooledChannel<'_> {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            self.pool.release(self.thread, channel);
        }
        self.pool.pending.fetch_sub(1, Ordering::SeqCst);
    }
}
