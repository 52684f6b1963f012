//! The single-concurrency job dispatcher.
//!
//! One worker thread drains a FIFO of [`JobPayload`]s; at most one job
//! executes at any instant, no matter how many are queued. Compositing and
//! uploads are heavy and share one staging area, so serializing them removes
//! cross-job interference without per-resource locks — and it totally orders
//! every status and filesystem mutation in the deployment.
//!
//! Jobs receive a [`QueueHandle`] so they can enqueue follow-ups (rollback
//! status writes, staging purges) through the same FIFO, keeping those
//! writes serialized too. A failed job is logged and dropped, never retried.

use crate::jobs::{JobPayload, JobRunner};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

struct State {
    pending: VecDeque<JobPayload>,
    active: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    signal: Condvar,
}

/// Cloneable enqueue-only view of the queue, safe to hand to running jobs.
#[derive(Clone)]
pub struct QueueHandle {
    shared: Arc<Shared>,
}

impl QueueHandle {
    /// Append a job to the FIFO. Returns immediately.
    pub fn enqueue(&self, job: JobPayload) {
        let mut state = self.shared.state.lock().unwrap();
        state.pending.push_back(job);
        self.shared.signal.notify_all();
    }

    /// Number of jobs waiting (not counting one currently executing).
    pub fn pending(&self) -> usize {
        self.shared.state.lock().unwrap().pending.len()
    }

    /// Block until the FIFO is empty and no job is executing.
    pub fn wait_idle(&self) {
        let mut state = self.shared.state.lock().unwrap();
        while state.active || !state.pending.is_empty() {
            state = self.shared.signal.wait(state).unwrap();
        }
    }
}

/// Owner of the worker thread. Dropping it stops the worker after the
/// in-flight job finishes; callers who care about queued work call
/// [`QueueHandle::wait_idle`] first.
pub struct JobQueue {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl JobQueue {
    /// Spawn the worker thread and start draining jobs through `runner`.
    pub fn start(runner: JobRunner) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                active: false,
                shutdown: false,
            }),
            signal: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = QueueHandle {
            shared: Arc::clone(&shared),
        };
        let worker = std::thread::Builder::new()
            .name("job-queue".to_string())
            .spawn(move || worker_loop(worker_shared, runner, handle))
            .expect("failed to spawn job-queue worker");

        Self {
            shared,
            worker: Some(worker),
        }
    }

    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn enqueue(&self, job: JobPayload) {
        self.handle().enqueue(job);
    }

    pub fn wait_idle(&self) {
        self.handle().wait_idle();
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
            self.shared.signal.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: Arc<Shared>, runner: JobRunner, handle: QueueHandle) {
    loop {
        let job = {
            let mut state = shared.state.lock().unwrap();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(job) = state.pending.pop_front() {
                    state.active = true;
                    break job;
                }
                state = shared.signal.wait(state).unwrap();
            }
        };

        if let Err(err) = runner.run(&job, &handle) {
            eprintln!("job {} failed: {err}", job.name());
        }

        let mut state = shared.state.lock().unwrap();
        state.active = false;
        shared.signal.notify_all();
    }
}
