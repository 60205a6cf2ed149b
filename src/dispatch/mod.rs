//! Dispatch and delivery contexts.
//!
//! Network work always runs on the io pool. Results are then handed to the
//! caller on one of two contexts:
//!
//! - [`Delivery::Main`]: a [`MainLoop`] owned by one application thread,
//!   fed through a bounded queue.
//! - [`Delivery::Io`]: directly on the io pool.
//!
//! ```rust
//! use netkit::dispatch::MainLoop;
//!
//! let (context, mut main_loop) = MainLoop::channel(16);
//! drop(context);
//! assert_eq!(main_loop.run_pending(), 0);
//! ```

mod tags;

pub use tags::TagRegistry;

use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::{Error, ErrorContext, Result};

pub const IO_THREAD_NAME: &str = "netkit-io";

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where a call's result is handed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    #[default]
    Main,
    Io,
}

/// Sending half of a main loop. Cheap to clone.
#[derive(Clone)]
pub struct MainContext {
    tx: mpsc::Sender<Job>,
}

impl MainContext {
    async fn post(&self, job: Job) -> std::result::Result<(), Job> {
        self.tx.send(job).await.map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-consumer queue of delivery jobs, drained by the thread that owns it.
pub struct MainLoop {
    rx: mpsc::Receiver<Job>,
}

impl MainLoop {
    /// Create a connected context/loop pair holding at most `capacity` pending jobs.
    pub fn channel(capacity: usize) -> (MainContext, MainLoop) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (MainContext { tx }, MainLoop { rx })
    }

    /// Block until one job is available and run it. Returns `false` once
    /// every context has been dropped and the queue is empty.
    ///
    /// Must not be called from inside an async runtime.
    pub fn turn(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until every context has been dropped.
    pub fn run(mut self) {
        while self.turn() {}
    }

    /// Run whatever is queued right now without blocking.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Async variant of [`MainLoop::turn`] for loops driven by a runtime.
    pub async fn next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        // Dropping a runtime from async code panics; this does not.
        if let Some(rt) = self.0.take() {
            rt.shutdown_background();
        }
    }
}

/// Worker pool for network work: a dedicated runtime or a borrowed handle.
#[derive(Clone)]
pub struct IoPool {
    handle: Handle,
    _owned: Option<Arc<OwnedRuntime>>,
}

impl IoPool {
    /// Start a multi-thread runtime whose workers are named `netkit-io`.
    pub fn dedicated(threads: Option<usize>) -> Result<Self> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name(IO_THREAD_NAME);
        if let Some(n) = threads {
            builder.worker_threads(n.max(1));
        }
        let runtime = builder.build().map_err(|e| {
            Error::configuration_with_context(
                "cannot start io worker pool",
                ErrorContext::new()
                    .with_field_path("io_threads")
                    .with_details(e.to_string())
                    .with_source("dispatch"),
            )
        })?;
        Ok(Self {
            handle: runtime.handle().clone(),
            _owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            _owned: None,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }
}

/// Dispatch stage plus delivery routing.
#[derive(Clone)]
pub struct Dispatcher {
    io: IoPool,
    main: Option<MainContext>,
}

impl Dispatcher {
    pub fn new(io: IoPool, main: Option<MainContext>) -> Self {
        Self { io, main }
    }

    pub fn io(&self) -> &IoPool {
        &self.io
    }

    pub fn has_main_context(&self) -> bool {
        self.main.is_some()
    }

    /// Run `job` on the requested context. `Main` without a registered main
    /// context falls back to io.
    pub async fn deliver<F>(&self, delivery: Delivery, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match (delivery, &self.main) {
            (Delivery::Main, Some(main)) => {
                if main.post(Box::new(job)).await.is_err() {
                    warn!("main loop is gone, dropping result delivery");
                }
            }
            _ => job(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;

    #[test]
    fn jobs_posted_to_main_run_on_the_owning_thread() {
        let pool = IoPool::dedicated(Some(1)).unwrap();
        let (ctx, mut main_loop) = MainLoop::channel(4);
        let dispatcher = Dispatcher::new(pool.clone(), Some(ctx));
        let (tx, rx) = std_mpsc::channel();

        let d = dispatcher.clone();
        pool.spawn(async move {
            d.deliver(Delivery::Main, move || {
                tx.send(std::thread::current().id()).unwrap();
            })
            .await;
        });

        assert!(main_loop.turn());
        assert_eq!(rx.recv().unwrap(), std::thread::current().id());
    }

    #[test]
    fn io_delivery_stays_on_the_pool() {
        let pool = IoPool::dedicated(Some(1)).unwrap();
        let dispatcher = Dispatcher::new(pool.clone(), None);
        let (tx, rx) = std_mpsc::channel();
        pool.spawn(async move {
            dispatcher
                .deliver(Delivery::Main, move || {
                    tx.send(std::thread::current().name().map(str::to_owned)).unwrap();
                })
                .await;
        });
        assert_eq!(rx.recv().unwrap().as_deref(), Some(IO_THREAD_NAME));
    }

    #[test]
    fn loop_ends_when_contexts_are_dropped() {
        let (ctx, main_loop) = MainLoop::channel(1);
        drop(ctx);
        main_loop.run();
    }

    #[tokio::test]
    async fn borrowed_handle_is_used_as_is() {
        let pool = IoPool::from_handle(Handle::current());
        assert_eq!(pool.spawn(async { 7 }).await.unwrap(), 7);
    }
}
