// crates/pointplay-media/src/inference.rs
//
// InferenceChannel: the single-slot link between the orchestrator and the
// depth model.
//
// submit() hands over one encoded still and returns a one-shot receiver that
// yields exactly one outcome — a DepthMap or an InferenceError. Failures are
// values on that receiver, never a dead worker: the next submit works as
// usual.
//
// InferenceWorker is the in-tree channel. It owns one background thread and
// a latest-wins request slot; the orchestrator never has more than one
// request outstanding, so in practice the slot holds at most one job. If a
// caller does overwrite a pending job, the displaced reply sender is dropped
// and its receiver resolves to `InferenceError::Disconnected` — every submit
// still gets exactly one answer.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use pointplay_core::error::InferenceError;
use pointplay_core::media_types::{DepthMap, EncodedImage, InferenceOutcome, PlayerNotice, VideoFrame};

use crate::encode::decode_png;

/// One-shot reply for a submitted request.
pub type PendingDepth = Receiver<InferenceOutcome>;

/// Asynchronous image → depth link. At most one outstanding submit is
/// permitted; the orchestrator enforces that, implementations need not.
pub trait InferenceChannel: Send {
    fn submit(&mut self, image: EncodedImage) -> PendingDepth;
}

/// The opaque depth model behind an InferenceWorker.
pub trait DepthEstimator: Send {
    /// Backend label reported once loaded, e.g. "gpu" or "cpu".
    fn name(&self) -> &str;

    /// Prepare the backend. A failure makes the worker try the next one.
    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    fn estimate(&mut self, frame: &VideoFrame) -> Result<DepthMap, InferenceError>;
}

// ── LumaDepthEstimator ────────────────────────────────────────────────────────

/// Stand-in model: brighter pixels are treated as nearer. Useful for demos
/// and for exercising the pipeline without a real network.
pub struct LumaDepthEstimator {
    name:    String,
    /// Artificial per-frame latency, to mimic a slow model.
    latency: Duration,
}

impl LumaDepthEstimator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), latency: Duration::ZERO }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl DepthEstimator for LumaDepthEstimator {
    fn name(&self) -> &str {
        &self.name
    }

    fn estimate(&mut self, frame: &VideoFrame) -> Result<DepthMap, InferenceError> {
        if !frame.is_well_formed() {
            return Err(InferenceError::Rejected(format!(
                "{}x{} frame with {} bytes", frame.width, frame.height, frame.data.len(),
            )));
        }
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        // Rec. 601 luma, integer weights summing to 256.
        let data = frame.data
            .chunks_exact(4)
            .map(|px| ((px[0] as u32 * 77 + px[1] as u32 * 150 + px[2] as u32 * 29) >> 8) as u8)
            .collect();
        Ok(DepthMap::from_samples(frame.width, frame.height, data))
    }
}

// ── InferenceWorker ───────────────────────────────────────────────────────────

enum Job {
    Estimate { image: EncodedImage, reply: Sender<InferenceOutcome> },
    Shutdown,
}

pub struct InferenceWorker {
    /// Latest-wins job slot shared with the worker thread.
    slot:     Arc<(Mutex<Option<Job>>, Condvar)>,
    /// Backend label once one has loaded; `None` while selecting or if none did.
    backend:  Arc<Mutex<Option<String>>>,
    ready_rx: Receiver<Option<String>>,
    handle:   Option<thread::JoinHandle<()>>,
}

impl InferenceWorker {
    /// Start the worker thread. Backends are tried in order; the first one
    /// whose `load()` succeeds serves every request. When `notices` is given,
    /// a `BackendReady` notice is sent once selection succeeds.
    pub fn spawn(
        backends: Vec<Box<dyn DepthEstimator>>,
        notices:  Option<Sender<PlayerNotice>>,
    ) -> Self {
        let slot: Arc<(Mutex<Option<Job>>, Condvar)> =
            Arc::new((Mutex::new(None), Condvar::new()));
        let backend              = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = bounded(1);

        let thread_slot    = Arc::clone(&slot);
        let thread_backend = Arc::clone(&backend);
        let handle = thread::Builder::new()
            .name("pointplay-inference".into())
            .spawn(move || {
                let mut estimator = select_backend(backends);
                let label = estimator.as_ref().map(|e| e.name().to_string());
                *thread_backend.lock() = label.clone();
                if let (Some(label), Some(tx)) = (&label, &notices) {
                    let _ = tx.send(PlayerNotice::BackendReady { backend: label.clone() });
                }
                let _ = ready_tx.send(label);
                // Later wait_ready calls see Disconnected and read `backend` directly.
                drop(ready_tx);

                loop {
                    let job = {
                        let (lock, cvar) = &*thread_slot;
                        let mut guard = lock.lock();
                        while guard.is_none() {
                            cvar.wait(&mut guard);
                        }
                        guard.take()
                    };
                    match job {
                        Some(Job::Estimate { image, reply }) => {
                            let outcome = run_job(estimator.as_mut(), &image);
                            // Receiver gone = orchestrator no longer cares.
                            let _ = reply.send(outcome);
                        }
                        Some(Job::Shutdown) | None => return,
                    }
                }
            });

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                warn!("[inference] failed to spawn worker thread: {e}");
                None
            }
        };

        Self { slot, backend, ready_rx, handle }
    }

    /// Block until backend selection finishes, up to `timeout`.
    /// Returns the chosen backend label, or `None` if none loaded in time.
    /// Once selection has finished this returns immediately.
    pub fn wait_ready(&self, timeout: Duration) -> Option<String> {
        match self.ready_rx.recv_timeout(timeout) {
            Ok(label) => label,
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => self.backend(),
        }
    }

    pub fn backend(&self) -> Option<String> {
        self.backend.lock().clone()
    }

    /// Stop the worker thread after its current job.
    pub fn shutdown(&mut self) {
        {
            let (lock, cvar) = &*self.slot;
            *lock.lock() = Some(Job::Shutdown);
            cvar.notify_one();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl InferenceChannel for InferenceWorker {
    fn submit(&mut self, image: EncodedImage) -> PendingDepth {
        let (reply, rx) = bounded(1);
        if self.handle.is_none() {
            let _ = reply.send(Err(InferenceError::Disconnected));
            return rx;
        }
        let (lock, cvar) = &*self.slot;
        let mut guard = lock.lock();
        if matches!(*guard, Some(Job::Estimate { .. })) {
            warn!("[inference] submit while a request is queued; replacing it");
        }
        *guard = Some(Job::Estimate { image, reply });
        cvar.notify_one();
        rx
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn select_backend(backends: Vec<Box<dyn DepthEstimator>>) -> Option<Box<dyn DepthEstimator>> {
    for mut candidate in backends {
        match candidate.load() {
            Ok(()) => {
                info!("[inference] backend ready: {}", candidate.name());
                return Some(candidate);
            }
            Err(e) => warn!("[inference] backend {} failed to load: {e:#}", candidate.name()),
        }
    }
    warn!("[inference] no depth backend available; requests will be rejected");
    None
}

fn run_job(estimator: Option<&mut Box<dyn DepthEstimator>>, image: &EncodedImage) -> InferenceOutcome {
    let Some(estimator) = estimator else {
        return Err(InferenceError::Rejected("no depth backend loaded".into()));
    };
    let frame = decode_png(&image.bytes, 0.0)
        .map_err(|e| InferenceError::Payload(format!("{e:#}")))?;
    let depth = estimator.estimate(&frame)?;
    debug!("[inference] {}x{} depth from {}", depth.width, depth.height, estimator.name());
    Ok(depth)
}
