//! Worker pool that runs dispatched requests off the session thread.

use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tokio::runtime::{Builder, Runtime};

/// Where request jobs execute.
///
/// `Threads` hands each job to a tokio blocking pool, so native calls never
/// hold up the session loop. Dropping the pool waits for every submitted job
/// to finish; jobs are never cancelled.
pub enum WorkerPool {
    Inline,
    Threads {
        runtime: Runtime,
        in_flight: Arc<InFlight>,
    },
}

/// Count of submitted jobs that have not finished yet.
#[derive(Default)]
pub struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        InFlightGuard(Arc::clone(self))
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

impl WorkerPool {
    pub fn inline() -> Self {
        WorkerPool::Inline
    }

    pub fn threads(threads: usize) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(threads.max(1))
            .thread_name("mirrorfs-worker")
            .build()?;
        Ok(WorkerPool::Threads {
            runtime,
            in_flight: Arc::default(),
        })
    }

    pub fn run<J>(&self, job: J)
    where
        J: FnOnce() + Send + 'static,
    {
        match self {
            WorkerPool::Inline => job(),
            WorkerPool::Threads { runtime, in_flight } => {
                let guard = in_flight.enter();
                runtime.spawn_blocking(move || {
                    let _guard = guard;
                    job();
                });
            }
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, WorkerPool::Inline)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Runtime shutdown discards queued blocking jobs that have not
        // started, and each of those owns a pending reply.
        if let WorkerPool::Threads { in_flight, .. } = self {
            in_flight.wait_idle();
        }
    }
}
