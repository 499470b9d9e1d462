use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use anyhow::{Result, bail};

use crate::sync::SyncObserver;

// Polled between chunks, between files and between table merges.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            bail!("operation cancelled");
        }
        Ok(())
    }
}

// Exactly one `Finished` event terminates the stream; errors never propagate
// past the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    Progress(u8),
    ProcessName(String),
    Info(String),
    Warning(String),
    Error { message: String, chain: String },
    Finished { failed: bool },
}

struct ChannelObserver {
    tx: mpsc::Sender<WorkerEvent>,
}

impl SyncObserver for ChannelObserver {
    fn on_progress(&mut self, pct: u8) {
        let _ = self.tx.send(WorkerEvent::Progress(pct));
    }

    fn on_process_name(&mut self, name: &str) {
        let _ = self.tx.send(WorkerEvent::ProcessName(name.to_string()));
    }

    fn on_info(&mut self, msg: &str) {
        let _ = self.tx.send(WorkerEvent::Info(msg.to_string()));
    }

    fn on_warning(&mut self, msg: &str) {
        let _ = self.tx.send(WorkerEvent::Warning(msg.to_string()));
    }
}

pub struct SyncWorker {
    pub events: mpsc::Receiver<WorkerEvent>,
    cancel: CancelFlag,
    handle: thread::JoinHandle<()>,
}

impl SyncWorker {
    pub fn spawn<F>(job: F) -> Self
    where
        F: FnOnce(&mut dyn SyncObserver, &CancelFlag) -> Result<()> + Send + 'static,
    {
        let (tx, events) = mpsc::channel();
        let cancel = CancelFlag::default();
        let job_cancel = cancel.clone();
        let handle = thread::spawn(move || {
            let mut observer = ChannelObserver { tx: tx.clone() };
            let failed = match job(&mut observer, &job_cancel) {
                Ok(()) => false,
                Err(err) => {
                    let _ = tx.send(WorkerEvent::Error {
                        message: err.to_string(),
                        chain: format!("{:?}", err),
                    });
                    true
                }
            };
            let _ = tx.send(WorkerEvent::Finished { failed });
        });
        Self {
            events,
            cancel,
            handle,
        }
    }

    pub fn kill(&self) {
        self.cancel.cancel();
    }

    pub fn join(self) {
        let _ = self.handle.join();
    }
}
