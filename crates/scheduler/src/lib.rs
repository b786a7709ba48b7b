//! # Scheduler Crate
//!
//! Batch job dispatch for the tile compositor.
//!
//! A [`WorkQueue`] is a fixed-capacity ring of jobs. Each job belongs to a
//! batch tracked by a shared [`CompletionState`]; the submitting thread calls
//! [`WorkQueue::wait`], which runs queued jobs itself until every job of its
//! batch has finished. A [`WorkerPool`] adds background threads that drain the
//! same queue and sleep on a condvar doorbell while it is empty.

#![forbid(unsafe_code)]

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// A unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

// ─────────────────────────────────────────────────────────────────────────────
// CompletionState
// ─────────────────────────────────────────────────────────────────────────────

/// Progress counters shared by all jobs of one batch.
///
/// `goal` counts submitted jobs, `count` counts finished ones; the batch is
/// done when they are equal.
#[derive(Debug, Default)]
pub struct CompletionState {
    goal: AtomicUsize,
    count: AtomicUsize,
}

impl CompletionState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of jobs submitted against this batch.
    pub fn goal(&self) -> usize {
        self.goal.load(Ordering::Acquire)
    }

    /// Number of jobs of this batch that have finished.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.count() == self.goal()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkQueue
// ─────────────────────────────────────────────────────────────────────────────

struct Entry {
    job: Job,
    state: Arc<CompletionState>,
}

/// One ring slot. `sequence` equals the slot's position when it is free for
/// the producer at that position, and position + 1 once it holds an entry.
struct Slot {
    sequence: AtomicUsize,
    entry: Mutex<Option<Entry>>,
}

/// A bounded multi-consumer job ring.
///
/// Consumers claim entries by compare-and-swapping the read index forward.
/// Pushing into a full queue is a programming error and panics.
pub struct WorkQueue {
    slots: Box<[Slot]>,
    mask: usize,
    write: AtomicUsize,
    read: AtomicUsize,
    doorbell: Mutex<()>,
    ring: Condvar,
}

impl WorkQueue {
    /// Create a queue holding `capacity` jobs, rounded up to a power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let slots = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                entry: Mutex::new(None),
            })
            .collect();
        Self {
            slots,
            mask: capacity - 1,
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
            doorbell: Mutex::new(()),
            ring: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Jobs queued but not yet claimed.
    pub fn len(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.saturating_sub(read)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue a job as part of the batch tracked by `state`.
    ///
    /// # Panics
    /// Panics if the queue is full.
    pub fn push(&self, job: Job, state: &Arc<CompletionState>) {
        let mut pos = self.write.load(Ordering::Relaxed);
        let slot = loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;
            assert!(diff >= 0, "work queue overflow (capacity {})", self.capacity());
            if diff == 0 {
                match self.write.compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed) {
                    Ok(_) => break slot,
                    Err(current) => pos = current,
                }
            } else {
                pos = self.write.load(Ordering::Relaxed);
            }
        };

        state.goal.fetch_add(1, Ordering::AcqRel);
        *lock(&slot.entry) = Some(Entry { job, state: Arc::clone(state) });
        slot.sequence.store(pos + 1, Ordering::Release);

        let _guard = lock(&self.doorbell);
        self.ring.notify_one();
    }

    /// Claim the next entry, if any.
    fn pop(&self) -> Option<Entry> {
        let mut pos = self.read.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - (pos + 1) as isize;
            if diff < 0 {
                return None;
            }
            if diff == 0 {
                match self.read.compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed) {
                    Ok(_) => {
                        let entry = lock(&slot.entry).take();
                        slot.sequence.store(pos + self.mask + 1, Ordering::Release);
                        return entry;
                    }
                    Err(current) => pos = current,
                }
            } else {
                pos = self.read.load(Ordering::Relaxed);
            }
        }
    }

    /// Run one queued job on the calling thread. Returns `false` if the queue
    /// was empty.
    ///
    /// A panicking job is logged and still counted as finished so its batch
    /// can complete.
    pub fn run_one(&self) -> bool {
        let Some(Entry { job, state }) = self.pop() else {
            return false;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            log::error!("work queue job panicked");
        }
        state.count.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Block until every job of `state`'s batch has finished, running queued
    /// jobs on the calling thread meanwhile.
    pub fn wait(&self, state: &CompletionState) {
        while !state.is_complete() {
            if !self.run_one() {
                std::hint::spin_loop();
                thread::yield_now();
            }
        }
    }

    /// Sleep until a job is pushed or `stop` is raised.
    fn idle(&self, stop: &AtomicBool) {
        let guard = lock(&self.doorbell);
        if self.is_empty() && !stop.load(Ordering::Acquire) {
            let _guard = self.ring.wait(guard).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn wake_all(&self) {
        let _guard = lock(&self.doorbell);
        self.ring.notify_all();
    }
}

impl core::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkerPool
// ─────────────────────────────────────────────────────────────────────────────

/// Background threads draining a shared [`WorkQueue`].
///
/// Dropping the pool stops and joins its threads.
pub struct WorkerPool {
    queue: Arc<WorkQueue>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` threads servicing `queue`. Zero workers is valid: the
    /// waiting thread then runs every job itself.
    pub fn new(queue: Arc<WorkQueue>, workers: usize) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            queue,
            stop,
            threads: Vec::with_capacity(workers),
        };
        for i in 0..workers {
            let queue = Arc::clone(&pool.queue);
            let stop = Arc::clone(&pool.stop);
            let handle = thread::Builder::new()
                .name(format!("tile-worker-{i}"))
                .spawn(move || worker_loop(&queue, &stop))?;
            pool.threads.push(handle);
        }
        log::info!("worker pool started with {workers} threads");
        Ok(pool)
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn size(&self) -> usize {
        self.threads.len()
    }
}

fn worker_loop(queue: &WorkQueue, stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        if !queue.run_one() {
            queue.idle(stop);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.queue.wake_all();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("worker thread exited with a panic");
            }
        }
        log::debug!("worker pool stopped");
    }
}

impl core::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size()).finish()
    }
}

/// Worker threads to start: one fewer than the available cores (the calling
/// thread works too), at most `max`.
pub fn default_worker_count(max: usize) -> usize {
    thread::available_parallelism()
        .map_or(0, |n| n.get().saturating_sub(1))
        .min(max)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
