pub mod coordinator;
pub mod frontend;
pub mod replica;

pub use self::{coordinator::*, frontend::*, replica::*};
use anyhow::{format_err, Result};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};
use tracing::error;

/// A service that is a loop that does something
pub trait LoopService: Send + Sync {
    fn run_iteration(&mut self) -> Result<()>;
}

/// Service execution control instance
///
/// All services are basically a loop, and we would like to be able to
/// gracefully terminate them, and handle any top-level error of any
/// of them by gracefully stopping everything else.
#[derive(Clone, Default)]
pub struct ServiceControl {
    stop_all: Arc<AtomicBool>,
}

impl ServiceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_all(&self) {
        self.stop_all.store(true, Ordering::SeqCst);
    }

    /// Run `service` in its own thread until it fails or is stopped
    ///
    /// An error or panic in any service stops all the others.
    pub fn spawn_loop(&self, mut service: impl LoopService + 'static) -> JoinHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_all = self.stop_all.clone();

        let thread = thread::spawn({
            let stop = stop.clone();
            move || {
                let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| -> Result<()> {
                    while !stop.load(Ordering::SeqCst) && !stop_all.load(Ordering::SeqCst) {
                        service.run_iteration()?;
                    }
                    Ok(())
                }))
                .unwrap_or_else(|_| Err(format_err!("service panicked")));

                if res.is_err() {
                    stop_all.store(true, Ordering::SeqCst);
                }
                res
            }
        });

        JoinHandle::new(stop, thread)
    }
}

/// Simple thread join wrapper that stops and joins the thread on drop
pub struct JoinHandle {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<Result<()>>>,
}

impl JoinHandle {
    fn new(stop: Arc<AtomicBool>, handle: thread::JoinHandle<Result<()>>) -> Self {
        JoinHandle {
            stop,
            thread: Some(handle),
        }
    }

    fn join_mut(&mut self) -> Result<()> {
        if let Some(h) = self.thread.take() {
            h.join().map_err(|e| format_err!("join failed: {:?}", e))?
        } else {
            Ok(())
        }
    }

    pub fn join(mut self) -> Result<()> {
        self.join_mut()
    }
}

impl Drop for JoinHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.join_mut() {
            error!(error = %e, "service failed");
        }
    }
}
