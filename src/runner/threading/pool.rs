use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    injector: Injector<Job>,
    shutdown: AtomicBool,
    pending: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl Shared {
    fn finish_job(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _guard = self.idle_lock.lock();
            self.idle.notify_all();
        }
    }
}

/// Work-stealing pool running asynchronous listeners.
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            injector: Injector::new(),
            shutdown: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
        });
        let workers: Vec<Worker<Job>> = (0..worker_count.max(1)).map(|_| Worker::new_fifo()).collect();
        let stealers: Arc<Vec<Stealer<Job>>> =
            Arc::new(workers.iter().map(|worker| worker.stealer()).collect());
        let mut handles = Vec::new();
        for (index, worker) in workers.into_iter().enumerate() {
            let shared = shared.clone();
            let stealers = stealers.clone();
            let handle = thread::Builder::new()
                .name(format!("helix-worker-{}", index))
                .spawn(move || {
                    super::mark_async();
                    worker_loop(index, worker, shared, stealers)
                })?;
            handles.push(handle);
        }
        debug!(target: "helix::bus", "started {} listener workers", handles.len());
        Ok(WorkerPool { shared, handles })
    }

    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        self.shared.injector.push(Box::new(job));
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Block until every spawned job has finished. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.idle_lock.lock();
        while self.pending() > 0 {
            if self.shared.idle.wait_until(&mut guard, deadline).timed_out() {
                return self.pending() == 0;
            }
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_job(job: Job, shared: &Shared) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!(target: "helix::bus", "listener job panicked on {:?}", thread::current().name());
    }
    shared.finish_job();
}

fn worker_loop(
    index: usize,
    worker: Worker<Job>,
    shared: Arc<Shared>,
    stealers: Arc<Vec<Stealer<Job>>>,
) {
    while !shared.shutdown.load(Ordering::SeqCst) {
        if let Some(job) = worker.pop() {
            run_job(job, &shared);
            continue;
        }
        match shared.injector.steal_batch_and_pop(&worker) {
            Steal::Success(job) => {
                run_job(job, &shared);
                continue;
            }
            Steal::Retry => continue,
            Steal::Empty => {}
        }

        let mut stolen = None;
        for (i, stealer) in stealers.iter().enumerate() {
            if i == index {
                continue;
            }
            if let Steal::Success(job) = stealer.steal() {
                stolen = Some(job);
                break;
            }
        }

        match stolen {
            Some(job) => run_job(job, &shared),
            None => thread::sleep(Duration::from_millis(1)),
        }
    }
}
