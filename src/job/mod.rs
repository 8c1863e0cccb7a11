//! Background draining of a context's lifetime queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::gpu::{Context, GPUError, Result};

/// Starts the long-running loop of a [`DrainThread`].
pub trait Executor {
    fn spawn_boxed(&self, name: &str, f: Box<dyn FnOnce() + Send + 'static>) -> Result<()>;
}

/// Runs each loop on its own named OS thread.
#[derive(Default)]
pub struct BasicExecutor;

impl Executor for BasicExecutor {
    fn spawn_boxed(&self, name: &str, f: Box<dyn FnOnce() + Send + 'static>) -> Result<()> {
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .map(|_| ())
            .map_err(|source| GPUError::ThreadSpawn {
                name: name.to_string(),
                source,
            })
    }
}

pub struct DrainThreadInfo<'a> {
    pub debug_name: &'a str,
    /// Upper bound on how long the drain loop sleeps between shutdown checks.
    pub poll_interval: Duration,
}

impl<'a> Default for DrainThreadInfo<'a> {
    fn default() -> Self {
        Self {
            debug_name: "drain",
            poll_interval: Duration::from_millis(10),
        }
    }
}

#[derive(Default)]
struct LoopExit {
    finished: bool,
    panicked: bool,
}

struct DrainShared {
    shutdown: AtomicBool,
    exit: Mutex<LoopExit>,
    exit_cv: Condvar,
}

/// Publishes the loop's exit, including when a drained entry unwinds.
struct ExitGuard(Arc<DrainShared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let mut exit = self.0.exit.lock();
        exit.finished = true;
        exit.panicked = std::thread::panicking();
        self.0.exit_cv.notify_all();
    }
}

/// Owns a loop that waits for lifetime queue entries, takes the context lock
/// and drains them.
///
/// A panicking entry stops the loop; [`flush`](Self::flush) then re-raises
/// the failure on the calling thread. Dropping the handle stops the loop
/// after a final drain and waits for it to exit.
pub struct DrainThread {
    debug_name: String,
    context: Arc<Context>,
    shared: Arc<DrainShared>,
}

impl DrainThread {
    pub fn spawn(
        context: Arc<Context>,
        executor: &dyn Executor,
        info: &DrainThreadInfo,
    ) -> Result<Self> {
        let shared = Arc::new(DrainShared {
            shutdown: AtomicBool::new(false),
            exit: Mutex::new(LoopExit::default()),
            exit_cv: Condvar::new(),
        });

        log::debug!(
            "starting drain thread '{}' for context '{}'",
            info.debug_name,
            context.debug_name()
        );

        let ctx = context.clone();
        let state = shared.clone();
        let poll_interval = info.poll_interval;
        executor.spawn_boxed(
            info.debug_name,
            Box::new(move || {
                let _exit = ExitGuard(state.clone());
                while !state.shutdown.load(Ordering::Acquire) {
                    if ctx.queue().wait_for_work(poll_interval) {
                        ctx.flush();
                    }
                }
                ctx.flush();
            }),
        )?;

        Ok(Self {
            debug_name: info.debug_name.to_string(),
            context,
            shared,
        })
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Blocks until every entry queued so far has been executed. Panics if
    /// the loop died executing an entry.
    pub fn flush(&self) {
        let exit = self.shared.exit.lock();
        let (finished, panicked) = (exit.finished, exit.panicked);
        drop(exit);

        if panicked || self.context.queue().is_poisoned() {
            panic!(
                "drain thread '{}' stopped after a queued entry panicked",
                self.debug_name
            );
        }
        if finished {
            self.context.flush();
            return;
        }

        self.context.queue().wake();
        if !self.context.queue().wait_idle() {
            panic!(
                "drain thread '{}' stopped after a queued entry panicked",
                self.debug_name
            );
        }
    }
}

impl Drop for DrainThread {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.context.queue().wake();

        let mut exit = self.shared.exit.lock();
        while !exit.finished {
            self.shared.exit_cv.wait(&mut exit);
        }
        if exit.panicked {
            log::error!(
                "drain thread '{}' exited after a queued entry panicked",
                self.debug_name
            );
        } else {
            log::debug!("drain thread '{}' stopped", self.debug_name);
        }
    }
}
