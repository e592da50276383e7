//! Single-threaded I/O reactor.
//!
//! A current-thread tokio runtime driven by one dedicated OS thread. Every
//! socket and timer completion of the server or session that owns the
//! reactor runs on that thread.

use std::future::Future;
use std::io;
use std::thread::{self, JoinHandle};

use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tokio::task;
use tracing::{debug, warn};

pub struct Reactor {
    handle: Handle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Reactor {
    pub fn start(name: &str) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        let (shutdown, stopped) = oneshot::channel::<()>();

        let thread_name = name.to_string();
        let thread = thread::Builder::new().name(name.to_string()).spawn(move || {
            debug!(reactor = %thread_name, "Reactor running");
            runtime.block_on(async {
                // Resolves on an explicit stop or when the owner is dropped.
                let _ = stopped.await;
            });
            // Dropping the runtime cancels every task still pending on it.
            drop(runtime);
            debug!(reactor = %thread_name, "Reactor stopped");
        })?;

        Ok(Self {
            handle,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn spawn<F>(&self, future: F) -> task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Whether the caller is running on this reactor's thread.
    pub fn is_current(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|t| t.thread().id() == thread::current().id())
    }

    /// Stops the reactor and waits for its thread to exit.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                // Dropped from one of our own tasks; the thread exits on its own.
                return;
            }
            if thread.join().is_err() {
                warn!("Reactor thread panicked");
            }
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        self.stop();
    }
}
