use std::io;
use std::num::NonZeroUsize;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use recycler::{Executor, Job};

/// A fixed set of named background threads running measurement jobs.
///
/// Jobs are pulled from one shared queue, so a slow measurement only holds up its own
/// thread. Dropping the pool closes the queue, lets the workers finish what was already
/// queued and joins them.
#[derive(Debug)]
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: NonZeroUsize) -> io::Result<Self> {
        let (tx, rx) = unbounded::<Job>();
        let mut handles = Vec::with_capacity(threads.get());
        for i in 0..threads.get() {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("recycler-measure-{i}"))
                .spawn(move || {
                    for job in rx.iter() {
                        job();
                    }
                })?;
            handles.push(handle);
        }
        adebug!(threads = threads.get(), "WorkerPool::new");
        Ok(Self {
            tx: Some(tx),
            handles,
        })
    }

    /// One worker per available core, capped at four.
    pub fn with_default_threads() -> io::Result<Self> {
        let cores = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        let threads = NonZeroUsize::new(cores.min(4)).unwrap_or(NonZeroUsize::MIN);
        Self::new(threads)
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    /// Jobs queued and not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.tx.as_ref().map_or(0, Sender::len)
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(job).is_err() {
            awarn!("WorkerPool: every worker exited, dropping measurement job");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.tx.take());
        for handle in self.handles.drain(..) {
            // Job panics are caught inside the job; a worker only fails on a bug here.
            if handle.join().is_err() {
                awarn!("WorkerPool: worker thread panicked");
            }
        }
    }
}
