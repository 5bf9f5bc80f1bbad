use crate::engine::ScanSettings;
use crate::error::{Error, Result};
use crate::storage::models::{Scan, ScanStatus};
use crate::storage::CatalogStore;
use flume::{Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Persistent FIFO of course scans with a single background worker.
///
/// Scans live in the store, so a process restart picks up where it left off
/// (see `resume_pending`). At most one scan exists per course; queueing a
/// course that already has one returns the existing scan.
///
/// The worker is woken through a channel of capacity one. Waking never blocks
/// and repeated wake-ups while the worker is busy collapse into one.
pub struct ScanQueue<S: CatalogStore> {
    store: Mutex<S>,
    settings: ScanSettings,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    worker_started: AtomicBool,
    shutdown: AtomicBool,
}

impl<S: CatalogStore> ScanQueue<S> {
    pub fn new(store: S, settings: ScanSettings) -> Self {
        let (wake_tx, wake_rx) = flume::bounded(1);
        Self {
            store: Mutex::new(store),
            settings,
            wake_tx,
            wake_rx,
            worker_started: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Lock the store. Do not hold the guard across a call back into the queue.
    pub fn store(&self) -> MutexGuard<'_, S> {
        self.store.lock()
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Queue a scan for `course_id`.
    ///
    /// Returns the existing scan when the course is already waiting or being
    /// processed. Fails with `Error::NotFound` when the course does not exist.
    pub fn add(&self, course_id: i64) -> Result<Scan> {
        let (scan, created) = self.store().transaction(|store| {
            if store.get_course(course_id)?.is_none() {
                return Err(Error::NotFound(format!("course {}", course_id)));
            }
            match store.get_scan_for_course(course_id)? {
                Some(existing) => Ok((existing, false)),
                None => Ok((store.create_scan(course_id)?, true)),
            }
        })?;

        if created {
            info!(scan_id = scan.id, course_id, path = %scan.course_path, "Added scan job");
            self.wake();
        } else {
            debug!(scan_id = scan.id, course_id, status = %scan.status, "Scan already queued");
        }

        Ok(scan)
    }

    /// Return interrupted scans to the waiting state and wake the worker if
    /// anything is pending. Call once at startup. Returns how many scans were
    /// reset.
    pub fn resume_pending(&self) -> Result<usize> {
        let (reset, pending) = {
            let store = self.store();
            let reset = store.reset_processing_scans()?;
            (reset, store.next_waiting_scan()?.is_some())
        };

        if reset > 0 {
            info!(count = reset, "Requeued interrupted scans");
        }
        if pending {
            self.wake();
        }
        Ok(reset)
    }

    /// Ask the worker to stop. A scan already being processed finishes first;
    /// scans still waiting stay in the store for the next run.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake();
    }

    fn wake(&self) {
        // Full means a wake-up is already pending
        let _ = self.wake_tx.try_send(());
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Spawn the worker thread. Only one worker may ever run per queue.
    ///
    /// `done` receives a message each time the worker has emptied the queue.
    pub fn start_worker<P>(self: &Arc<Self>, processor: P, done: Option<Sender<()>>) -> Result<JoinHandle<()>>
    where
        S: 'static,
        P: Fn(&ScanQueue<S>, &mut Scan) -> Result<()> + Send + 'static,
    {
        if self.worker_started.swap(true, Ordering::SeqCst) {
            return Err(Error::WorkerAlreadyStarted);
        }

        let queue = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("scan-worker".to_string())
            .spawn(move || queue.run_worker(processor, done))?;
        Ok(handle)
    }

    fn run_worker<P>(&self, processor: P, done: Option<Sender<()>>)
    where
        P: Fn(&ScanQueue<S>, &mut Scan) -> Result<()>,
    {
        debug!("Scan worker started");

        while self.wake_rx.recv().is_ok() {
            if self.is_shutdown() {
                break;
            }

            // A wake-up that arrived while draining may belong to a scan added
            // after the last lookup, so drain again until none is pending.
            loop {
                self.drain(&processor);
                if self.is_shutdown() || self.wake_rx.try_recv().is_err() {
                    break;
                }
            }

            if let Some(done) = &done {
                let _ = done.send(());
            }

            if self.is_shutdown() {
                break;
            }
        }

        debug!("Scan worker stopped");
    }

    fn drain<P>(&self, processor: &P)
    where
        P: Fn(&ScanQueue<S>, &mut Scan) -> Result<()>,
    {
        loop {
            if self.is_shutdown() {
                return;
            }

            let next = self.store().next_waiting_scan();
            let mut scan = match next {
                Ok(Some(scan)) => scan,
                Ok(None) => {
                    debug!("Finished processing all scan jobs");
                    return;
                }
                Err(err) => {
                    error!(error = %err, "Failed to look up the next scan job");
                    return;
                }
            };

            info!(scan_id = scan.id, course_id = scan.course_id, path = %scan.course_path, "Processing scan job");

            let result = self.mark_processing(&mut scan).and_then(|_| {
                panic::catch_unwind(AssertUnwindSafe(|| processor(self, &mut scan)))
                    .unwrap_or_else(|_| Err(Error::Other("scan processor panicked".to_string())))
            });

            if let Err(err) = result {
                error!(scan_id = scan.id, course_id = scan.course_id, error = %err, "Failed to process scan job");
            }

            let deleted = self.store().delete_scan(scan.id);
            if let Err(err) = deleted {
                // Leaving the row behind would hand out the same job forever
                error!(scan_id = scan.id, error = %err, "Failed to delete scan job. Stopping drain");
                return;
            }
        }
    }

    fn mark_processing(&self, scan: &mut Scan) -> Result<()> {
        scan.status = ScanStatus::Processing;
        self.store().update_scan(scan)
    }
}
