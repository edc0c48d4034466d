pub mod buyer;
pub mod coalition;
pub mod operator;

pub use self::{buyer::*, coalition::*, operator::*};

use std::{
    sync::{
        atomic::{self, AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use anyhow::{bail, format_err, Result};

use crate::{
    auction::SharedLedger,
    channel::{SharedBidSink, SharedBidSource, SharedBroadcast},
    config::RunConfig,
    report::SharedSnapshotSink,
};

/// Everything a service needs from the outside world, in one place: channel
/// endpoints, validated configuration, the transaction ledger, and the sink
/// end-of-run snapshots go to. Passing this around (instead of ambient
/// globals) is what lets the whole core run against in-memory fakes.
#[derive(Clone)]
pub struct RunContext {
    pub config: RunConfig,
    pub broadcast: SharedBroadcast,
    pub bid_sink: SharedBidSink,
    pub bid_source: SharedBidSource,
    pub ledger: SharedLedger,
    pub snapshots: SharedSnapshotSink,
}

/// A service that is a loop that does something
pub trait LoopService: Send + Sync {
    fn run_iteration(&mut self) -> Result<()>;

    /// Called once after the loop stops, before the thread exits.
    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
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

    #[allow(unused)]
    pub fn is_stopped(&self) -> bool {
        self.stop_all.load(Ordering::SeqCst)
    }

    /// Start a new service as a loop on its own thread.
    ///
    /// This will take care of checking the termination condition and
    /// handling any errors returned by the service.
    pub fn spawn_loop(&self, mut service: impl LoopService + 'static) -> JoinHandle {
        let stop = Arc::new(AtomicBool::new(false));

        JoinHandle::new(
            stop.clone(),
            thread::spawn({
                let stop_all = self.stop_all.clone();
                move || match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    while !stop.load(atomic::Ordering::SeqCst)
                        && !stop_all.load(atomic::Ordering::SeqCst)
                    {
                        if let Err(e) = service.run_iteration() {
                            stop_all.store(true, atomic::Ordering::SeqCst);
                            return Err(e);
                        }
                    }
                    service.finalize()
                })) {
                    Err(_e) => {
                        stop_all.store(true, atomic::Ordering::SeqCst);
                        bail!("service panicked");
                    }
                    Ok(res) => res,
                }
            }),
        )
    }
}

/// Simple thread join wrapper that joins the thread on drop
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
        self.join_mut().expect("not failed")
    }
}
