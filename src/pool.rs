//! Reusable worker pool with quiescence signalling.
//!
//! Workers share one FIFO queue protected by a `parking_lot::Mutex`, with
//! two condition variables: `work_available` (a worker has something to
//! do) and `quiescent` (no work queued and no worker mid-job). The shape
//! mirrors the corpus's other mutex-plus-condvar coordination primitive
//! (a weighted semaphore built the same way): a small `Mutex<State>` plus
//! `Condvar`s, no lock-free fast path.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct State {
    queue: VecDeque<Job>,
    /// Number of submitted jobs not yet fully completed (queued or running).
    outstanding: usize,
    /// Number of jobs currently executing.
    in_flight: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    work_available: Condvar,
    quiescent: Condvar,
}

/// A fixed-size group of worker threads consuming a shared job queue.
pub(crate) struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spins up `n` worker threads. `n == 0` is treated as `1`.
    pub(crate) fn new(n: usize) -> Result<Self> {
        let n = n.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                outstanding: 0,
                in_flight: 0,
                shutdown: false,
            }),
            work_available: Condvar::new(),
            quiescent: Condvar::new(),
        });

        let mut handles = Vec::with_capacity(n);
        for i in 0..n {
            let worker_shared = Arc::clone(&shared);
            match thread::Builder::new()
                .name(format!("vecstore-worker-{i}"))
                .spawn(move || worker_loop(&worker_shared))
            {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    shared.state.lock().shutdown = true;
                    shared.work_available.notify_all();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(Error::Thread(err));
                }
            }
        }

        debug!(workers = n, "worker pool created");
        Ok(Self { shared, handles })
    }

    /// Number of live worker threads.
    pub(crate) fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Enqueues `job` at the tail of the queue and wakes one worker.
    ///
    /// Callers must submit every task for a round before calling
    /// [`Self::wait`]; a `wait()` that observes quiescence may return
    /// even if later submissions occur afterward.
    pub(crate) fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        state.queue.push_back(Box::new(job));
        state.outstanding += 1;
        drop(state);
        self.shared.work_available.notify_one();
    }

    /// Blocks until all submitted jobs have finished running.
    pub(crate) fn wait(&self) {
        let mut state = self.shared.state.lock();
        while state.outstanding != 0 || state.in_flight != 0 {
            self.shared.quiescent.wait(&mut state);
        }
    }
}

fn worker_loop(shared: &Arc<Shared>) {
    loop {
        let mut state = shared.state.lock();
        while state.queue.is_empty() && !state.shutdown {
            shared.work_available.wait(&mut state);
        }

        let Some(job) = state.queue.pop_front() else {
            // Empty queue and shutdown requested: exit.
            debug_assert!(state.shutdown);
            return;
        };
        state.in_flight += 1;
        drop(state);

        job();

        let mut state = shared.state.lock();
        state.in_flight -= 1;
        state.outstanding -= 1;
        let quiescent = state.in_flight == 0 && state.outstanding == 0;
        drop(state);
        if quiescent {
            shared.quiescent.notify_all();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
        }
        self.shared.work_available.notify_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
