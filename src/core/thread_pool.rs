//! Two-level worker pools.
//!
//! Work is split between a `Low` pool, which runs the fine-grained chunks of field-level loops,
//! and a `High` pool for coarser tasks that may themselves fan out into `Low`. A task running on
//! a `Low` worker must never submit back into the `Low` pool; this is checked at submission time
//! and reported as [`PoolError::RecursiveSubmission`].
use std::any::Any;
use std::fmt::{self, Display};
use std::num::NonZeroUsize;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, trace};

/// Chunks smaller than this are not worth a task of their own on the `Low` pool.
pub const DEFAULT_LOW_MIN_CHUNK_SIZE: usize = 1 << 16;

pub const LOW_POOL_SIZE_ENV: &str = "POLYDOMAIN_LOW_POOL_SIZE";
pub const HIGH_POOL_SIZE_ENV: &str = "POLYDOMAIN_HIGH_POOL_SIZE";
pub const LOW_MIN_CHUNK_SIZE_ENV: &str = "POLYDOMAIN_LOW_MIN_CHUNK_SIZE";

static LOW_INSTANCE: OnceCell<Arc<ThreadPool>> = OnceCell::new();
static HIGH_INSTANCE: OnceCell<Arc<ThreadPool>> = OnceCell::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolLevel {
    Low,
    High,
}

impl PoolLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolLevel::Low => "low",
            PoolLevel::High => "high",
        }
    }
}

impl Display for PoolLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PoolLevel {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(PoolLevel::Low),
            "high" => Ok(PoolLevel::High),
            _ => Err(PoolError::UnknownLevel(s.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("unknown pool level `{0}`")]
    UnknownLevel(String),
    #[error("a {level} pool task submitted work back into the {level} pool")]
    RecursiveSubmission { level: PoolLevel },
    #[error("task panicked: {message}")]
    TaskPanicked { message: String },
    #[error("task was dropped before producing a result")]
    TaskDropped,
    #[error("failed to build worker pool")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// Sizes of the two pools and the `Low` pool chunk floor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadPoolConfig {
    pub low_pool_size: usize,
    pub high_pool_size: usize,
    pub low_min_chunk_size: usize,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            low_pool_size: parallelism,
            high_pool_size: parallelism,
            low_min_chunk_size: DEFAULT_LOW_MIN_CHUNK_SIZE,
        }
    }
}

impl ThreadPoolConfig {
    /// Reads overrides from `POLYDOMAIN_*` environment variables. Missing, unparsable or zero
    /// values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let read = |key: &str, fallback: usize| {
            lookup(key)
                .and_then(|value| value.trim().parse::<usize>().ok())
                .filter(|&value| value > 0)
                .unwrap_or(fallback)
        };
        Self {
            low_pool_size: read(LOW_POOL_SIZE_ENV, default.low_pool_size),
            high_pool_size: read(HIGH_POOL_SIZE_ENV, default.high_pool_size),
            low_min_chunk_size: read(LOW_MIN_CHUNK_SIZE_ENV, default.low_min_chunk_size),
        }
    }

    pub fn pool_size(&self, level: PoolLevel) -> usize {
        match level {
            PoolLevel::Low => self.low_pool_size,
            PoolLevel::High => self.high_pool_size,
        }
    }
}

/// Number of detached tasks that have not finished yet.
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    done: Condvar,
}

impl Pending {
    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.done.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.done.wait(&mut count);
        }
    }
}

/// Result handle of one submitted task.
#[must_use]
pub struct TaskHandle<T> {
    receiver: Receiver<Result<T, String>>,
}

impl<T> TaskHandle<T> {
    fn channel() -> (SyncSender<Result<T, String>>, Self) {
        let (sender, receiver) = mpsc::sync_channel(1);
        (sender, Self { receiver })
    }

    /// Blocks until the task finishes. A panic inside the task is returned as
    /// [`PoolError::TaskPanicked`].
    pub fn join(self) -> Result<T, PoolError> {
        match self.receiver.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(PoolError::TaskPanicked { message }),
            Err(_) => Err(PoolError::TaskDropped),
        }
    }
}

/// Waits on every handle, even after a failure, and returns the values in submission order.
/// If any task failed, the error of the earliest submitted failing task is returned.
pub fn wait_for_all<T>(
    handles: impl IntoIterator<Item = TaskHandle<T>>,
) -> Result<Vec<T>, PoolError> {
    let mut values = Vec::new();
    let mut first_error = None;
    for handle in handles {
        match handle.join() {
            Ok(value) => values.push(value),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(values),
    }
}

/// Splits `[0, n)` into contiguous chunks, one per worker, the last chunk taking the remainder.
///
/// If the even split would produce chunks shorter than `min_chunk_size`, fewer (and larger)
/// chunks are used instead. `n = 0` yields no chunks.
pub fn chunk_ranges(n: usize, pool_size: usize, min_chunk_size: usize) -> Vec<Range<usize>> {
    if n == 0 {
        return Vec::new();
    }
    let mut n_chunks = n.min(pool_size.max(1));
    if n / n_chunks < min_chunk_size {
        n_chunks = (n / min_chunk_size.max(1)).max(1);
    }
    let chunk_size = n / n_chunks;
    (0..n_chunks)
        .map(|i| {
            let start = i * chunk_size;
            let end = if i + 1 == n_chunks {
                n
            } else {
                start + chunk_size
            };
            start..end
        })
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn run_caught<T>(sender: SyncSender<Result<T, String>>, task: impl FnOnce() -> T) {
    let result = panic::catch_unwind(AssertUnwindSafe(task)).map_err(panic_message);
    // The handle may already be gone; the result is then simply discarded.
    let _ = sender.send(result);
}

/// A fixed set of worker threads tagged with a [`PoolLevel`].
pub struct ThreadPool {
    level: PoolLevel,
    size: usize,
    min_chunk_size: usize,
    pool: rayon::ThreadPool,
    pending: Arc<Pending>,
    live_workers: Arc<AtomicUsize>,
}

impl ThreadPool {
    /// Builds a pool of `pool_size` workers. `min_chunk_size` only affects `Low` pools.
    pub fn new(
        level: PoolLevel,
        pool_size: usize,
        min_chunk_size: usize,
    ) -> Result<Self, PoolError> {
        let size = pool_size.max(1);
        let live_workers = Arc::new(AtomicUsize::new(0));
        let started = Arc::clone(&live_workers);
        let exited = Arc::clone(&live_workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(move |i| format!("polydomain-{level}-{i}"))
            .start_handler(move |_| {
                started.fetch_add(1, Ordering::SeqCst);
            })
            .exit_handler(move |_| {
                exited.fetch_sub(1, Ordering::SeqCst);
            })
            .build()?;
        debug!(%level, pool_size = size, min_chunk_size, "started worker pool");
        Ok(Self {
            level,
            size,
            min_chunk_size: min_chunk_size.max(1),
            pool,
            pending: Arc::default(),
            live_workers,
        })
    }

    /// Returns the process-wide pool for `level`, building it on first use.
    ///
    /// The size is taken from `pool_size`, or else from [`ThreadPoolConfig::from_env`], and is
    /// fixed after the first call.
    pub fn get_instance(
        level: PoolLevel,
        pool_size: Option<usize>,
    ) -> Result<Arc<ThreadPool>, PoolError> {
        let cell = match level {
            PoolLevel::Low => &LOW_INSTANCE,
            PoolLevel::High => &HIGH_INSTANCE,
        };
        cell.get_or_try_init(|| {
            let config = ThreadPoolConfig::from_env();
            let size = pool_size.unwrap_or_else(|| config.pool_size(level));
            ThreadPool::new(level, size, config.low_min_chunk_size).map(Arc::new)
        })
        .cloned()
    }

    pub fn level(&self) -> PoolLevel {
        self.level
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn min_chunk_size(&self) -> usize {
        match self.level {
            PoolLevel::Low => self.min_chunk_size,
            PoolLevel::High => 1,
        }
    }

    /// Chunks `block_execution` would dispatch for `n` elements.
    pub fn chunk_ranges(&self, n: usize) -> Vec<Range<usize>> {
        chunk_ranges(n, self.size, self.min_chunk_size())
    }

    /// True when called from one of this pool's workers.
    pub fn is_worker_thread(&self) -> bool {
        self.pool.current_thread_index().is_some()
    }

    fn check_submission(&self) -> Result<(), PoolError> {
        if self.level == PoolLevel::Low && self.is_worker_thread() {
            return Err(PoolError::RecursiveSubmission { level: self.level });
        }
        Ok(())
    }

    /// Schedules `task` on a worker and returns immediately.
    pub fn post<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, handle) = TaskHandle::channel();
        let pending = Arc::clone(&self.pending);
        pending.increment();
        self.pool.spawn(move || {
            run_caught(sender, task);
            pending.decrement();
        });
        handle
    }

    /// Runs `func(begin, end)` once per chunk of `[0, n)`.
    ///
    /// Returns after every chunk has finished, so the returned handles are already resolved.
    pub fn block_execution<T, F>(&self, n: usize, func: F) -> Result<Vec<TaskHandle<T>>, PoolError>
    where
        T: Send,
        F: Fn(usize, usize) -> T + Sync,
    {
        self.check_submission()?;
        let ranges = self.chunk_ranges(n);
        trace!(level = %self.level, n, chunks = ranges.len(), "block execution");
        let func = &func;
        let mut handles = Vec::with_capacity(ranges.len());
        self.pool.in_place_scope(|scope| {
            for range in ranges {
                let (sender, handle) = TaskHandle::channel();
                handles.push(handle);
                scope.spawn(move |_| run_caught(sender, || func(range.start, range.end)));
            }
        });
        Ok(handles)
    }

    /// Like [`Self::block_execution`], but hands each chunk its own disjoint mutable slice of
    /// `data` together with the slice's offset in `data`.
    pub fn block_execution_mut<E, T, F>(
        &self,
        data: &mut [E],
        func: F,
    ) -> Result<Vec<TaskHandle<T>>, PoolError>
    where
        E: Send,
        T: Send,
        F: Fn(usize, &mut [E]) -> T + Sync,
    {
        let ranges = self.chunk_ranges(data.len());
        let mut rest = data;
        let parts = ranges
            .into_iter()
            .map(|range| {
                let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
                rest = tail;
                (range.start, chunk)
            })
            .collect();
        self.execute_parts(parts, |(offset, chunk)| func(offset, chunk))
    }

    /// Runs `func` once per element of `parts`, one task each, and returns after all of them
    /// have finished. The caller chooses the split; no chunk floor is applied.
    pub fn execute_parts<P, T, F>(
        &self,
        parts: Vec<P>,
        func: F,
    ) -> Result<Vec<TaskHandle<T>>, PoolError>
    where
        P: Send,
        T: Send,
        F: Fn(P) -> T + Sync,
    {
        self.check_submission()?;
        trace!(level = %self.level, parts = parts.len(), "part execution");
        let func = &func;
        let mut handles = Vec::with_capacity(parts.len());
        self.pool.in_place_scope(|scope| {
            for part in parts {
                let (sender, handle) = TaskHandle::channel();
                handles.push(handle);
                scope.spawn(move |_| run_caught(sender, || func(part)));
            }
        });
        Ok(handles)
    }

    /// Blocks until every task handed to [`Self::post`] has completed.
    ///
    /// The workers stay alive and the pool remains usable afterwards. They are stopped when the
    /// pool itself is dropped, which the backing rayon pool does once its queued work is done.
    /// Must not be called from a task of this pool that is itself still pending.
    pub fn join(&self) {
        self.pending.wait_idle();
        debug!(level = %self.level, "worker pool drained");
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("level", &self.level)
            .field("size", &self.size)
            .field("min_chunk_size", &self.min_chunk_size)
            .field("live_workers", &self.live_workers.load(Ordering::Relaxed))
            .finish()
    }
}

/// The two pools, built together from one [`ThreadPoolConfig`].
#[derive(Clone, Debug)]
pub struct ThreadPools {
    pub low: Arc<ThreadPool>,
    pub high: Arc<ThreadPool>,
}

impl ThreadPools {
    pub fn new(config: &ThreadPoolConfig) -> Result<Self, PoolError> {
        Ok(Self {
            low: Arc::new(ThreadPool::new(
                PoolLevel::Low,
                config.low_pool_size,
                config.low_min_chunk_size,
            )?),
            high: Arc::new(ThreadPool::new(PoolLevel::High, config.high_pool_size, 1)?),
        })
    }

    pub fn get(&self, level: PoolLevel) -> &Arc<ThreadPool> {
        match level {
            PoolLevel::Low => &self.low,
            PoolLevel::High => &self.high,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{
        chunk_ranges, wait_for_all, PoolError, PoolLevel, ThreadPool, ThreadPoolConfig,
        ThreadPools, DEFAULT_LOW_MIN_CHUNK_SIZE, HIGH_POOL_SIZE_ENV, LOW_MIN_CHUNK_SIZE_ENV,
        LOW_POOL_SIZE_ENV,
    };

    fn assert_partition(ranges: &[std::ops::Range<usize>], n: usize) {
        let mut expected_start = 0;
        for range in ranges {
            assert_eq!(range.start, expected_start);
            assert!(range.start < range.end);
            expected_start = range.end;
        }
        assert_eq!(expected_start, n);
    }

    #[test]
    fn chunk_ranges_partition_exactly() {
        let ranges = chunk_ranges(10, 4, 1);

        assert_eq!(ranges, vec![0..2, 2..4, 4..6, 6..10]);
        assert_partition(&ranges, 10);
    }

    #[test]
    fn chunk_ranges_cover_every_size() {
        for n in 1..200 {
            for pool_size in 1..10 {
                for min_chunk_size in [1, 3, 64] {
                    assert_partition(&chunk_ranges(n, pool_size, min_chunk_size), n);
                }
            }
        }
    }

    #[test]
    fn chunk_ranges_empty() {
        assert!(chunk_ranges(0, 8, 1).is_empty());
    }

    #[test]
    fn chunk_ranges_fewer_elements_than_workers() {
        assert_eq!(chunk_ranges(3, 8, 1), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn low_pool_honours_chunk_floor() {
        let low = ThreadPool::new(PoolLevel::Low, 8, DEFAULT_LOW_MIN_CHUNK_SIZE).unwrap();
        let high = ThreadPool::new(PoolLevel::High, 8, DEFAULT_LOW_MIN_CHUNK_SIZE).unwrap();

        assert_eq!(low.chunk_ranges(100), vec![0..100]);
        assert_eq!(high.chunk_ranges(100).len(), 8);
        assert_eq!(low.chunk_ranges(3 * DEFAULT_LOW_MIN_CHUNK_SIZE + 5).len(), 3);
    }

    #[test_log::test]
    fn block_execution_matches_sequential_sum() {
        let pool = ThreadPool::new(PoolLevel::Low, 4, 1).unwrap();
        let n = 1000;

        let handles = pool
            .block_execution(n, |begin, end| (begin..end).sum::<usize>())
            .unwrap();
        let total: usize = wait_for_all(handles).unwrap().into_iter().sum();

        assert_eq!(total, n * (n - 1) / 2);
    }

    #[test]
    fn block_execution_mut_writes_disjoint_chunks() {
        let pool = ThreadPool::new(PoolLevel::High, 3, 1).unwrap();
        let mut data = vec![0usize; 17];

        let handles = pool
            .block_execution_mut(&mut data, |offset, chunk| {
                for (i, x) in chunk.iter_mut().enumerate() {
                    *x = offset + i;
                }
                chunk.len()
            })
            .unwrap();

        assert_eq!(wait_for_all(handles).unwrap(), vec![5, 5, 7]);
        assert_eq!(data, (0..17).collect::<Vec<_>>());
    }

    #[test]
    fn execute_parts_runs_each_part_once() {
        let pool = ThreadPool::new(PoolLevel::Low, 4, DEFAULT_LOW_MIN_CHUNK_SIZE).unwrap();
        let mut data = vec![0usize; 12];
        let (left, right) = data.split_at_mut(5);
        let parts = vec![(0, left), (5, right)];

        let handles = pool
            .execute_parts(parts, |(offset, chunk)| {
                for (i, x) in chunk.iter_mut().enumerate() {
                    *x = offset + i;
                }
                chunk.len()
            })
            .unwrap();

        assert_eq!(wait_for_all(handles).unwrap(), vec![5, 7]);
        assert_eq!(data, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn panicking_chunk_surfaces_through_handle() {
        let pool = ThreadPool::new(PoolLevel::Low, 4, 1).unwrap();
        let completed = AtomicUsize::new(0);

        let handles = pool
            .block_execution(8, |begin, _| {
                if begin == 2 {
                    panic!("chunk failed");
                }
                completed.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        let result = wait_for_all(handles);

        assert!(
            matches!(result, Err(PoolError::TaskPanicked { ref message }) if message == "chunk failed")
        );
        assert_eq!(completed.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn first_error_in_submission_order_is_returned() {
        let pool = ThreadPool::new(PoolLevel::High, 4, 1).unwrap();

        let handles = pool
            .block_execution(4, |begin, _| panic!("{begin}"))
            .unwrap();

        assert!(
            matches!(wait_for_all(handles), Err(PoolError::TaskPanicked { message }) if message == "0")
        );
    }

    #[test]
    fn recursive_low_submission_is_rejected() {
        let low = Arc::new(ThreadPool::new(PoolLevel::Low, 2, 1).unwrap());
        let inner = Arc::clone(&low);

        let result = low
            .post(move || inner.block_execution(4, |_, _| ()).map(|_| ()))
            .join()
            .unwrap();

        assert!(matches!(
            result,
            Err(PoolError::RecursiveSubmission {
                level: PoolLevel::Low
            })
        ));
    }

    #[test]
    fn high_tasks_may_fan_out_into_low() {
        let pools = ThreadPools::new(&ThreadPoolConfig {
            low_pool_size: 2,
            high_pool_size: 2,
            low_min_chunk_size: 1,
        })
        .unwrap();
        let low = Arc::clone(&pools.low);

        let sum = pools
            .high
            .post(move || {
                let handles = low
                    .block_execution(100, |begin, end| (begin..end).sum::<usize>())
                    .unwrap();
                wait_for_all(handles).unwrap().into_iter().sum::<usize>()
            })
            .join()
            .unwrap();

        assert_eq!(sum, 4950);
    }

    #[test]
    fn join_waits_for_posted_tasks() {
        let pool = ThreadPool::new(PoolLevel::High, 2, 1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            // Handles are dropped on purpose; join() is the only synchronisation.
            let _ = pool.post(move || {
                std::thread::sleep(std::time::Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.join();

        assert_eq!(counter.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn dropping_the_pool_stops_its_workers() {
        let pool = ThreadPool::new(PoolLevel::High, 3, 1).unwrap();
        let live_workers = Arc::clone(&pool.live_workers);
        for _ in 0..8 {
            let _ = pool.post(|| std::thread::sleep(std::time::Duration::from_millis(1)));
        }
        pool.join();

        drop(pool);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while live_workers.load(Ordering::SeqCst) > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(live_workers.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn get_instance_is_a_singleton() {
        let first = ThreadPool::get_instance(PoolLevel::High, Some(2)).unwrap();
        let second = ThreadPool::get_instance(PoolLevel::High, Some(7)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.level(), PoolLevel::High);
    }

    #[test]
    fn pool_level_parsing() {
        assert_eq!("low".parse::<PoolLevel>().unwrap(), PoolLevel::Low);
        assert_eq!("HIGH".parse::<PoolLevel>().unwrap(), PoolLevel::High);
        assert!(matches!(
            "medium".parse::<PoolLevel>(),
            Err(PoolError::UnknownLevel(level)) if level == "medium"
        ));
    }

    #[test]
    fn config_reads_overrides() {
        let vars = HashMap::from([
            (LOW_POOL_SIZE_ENV, "3"),
            (HIGH_POOL_SIZE_ENV, "not a number"),
            (LOW_MIN_CHUNK_SIZE_ENV, "0"),
        ]);

        let config = ThreadPoolConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        let default = ThreadPoolConfig::default();

        assert_eq!(config.low_pool_size, 3);
        assert_eq!(config.high_pool_size, default.high_pool_size);
        assert_eq!(config.low_min_chunk_size, DEFAULT_LOW_MIN_CHUNK_SIZE);
    }
}
