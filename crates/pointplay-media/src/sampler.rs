// crates/pointplay-media/src/sampler.rs
//
// FrameSampler: fixed-rate tick source that drives frame sampling while
// playing. Each start() opens a new run; ticks carry their run id so the
// orchestrator can drop anything a stopped run left in its inbox.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use tracing::{debug, warn};

use crate::orchestrator::EventSink;

struct Active {
    run:    u64,
    stop:   Sender<()>,
    handle: thread::JoinHandle<()>,
}

pub struct FrameSampler {
    period:   Duration,
    next_run: u64,
    active:   Option<Active>,
}

impl FrameSampler {
    pub fn new(period: Duration) -> Self {
        Self { period, next_run: 0, active: None }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking into `sink`. No-op while a run is already active.
    /// Returns the id of the active run.
    pub fn start(&mut self, sink: EventSink) -> u64 {
        if let Some(active) = &self.active {
            return active.run;
        }
        self.next_run += 1;
        let run             = self.next_run;
        let ticker          = tick(self.period);
        let (stop, stop_rx) = bounded::<()>(0);

        let spawned = thread::Builder::new()
            .name(format!("pointplay-sampler-{run}"))
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        if sink.tick(run).is_err() {
                            return; // orchestrator gone
                        }
                    }
                    recv(stop_rx) -> _ => return,
                }
            });

        match spawned {
            Ok(handle) => {
                debug!("[sampler] run {run} started ({:?})", self.period);
                self.active = Some(Active { run, stop, handle });
            }
            Err(e) => warn!("[sampler] spawn failed: {e}"),
        }
        run
    }

    /// Stop the active run and wait for its thread. Once this returns no
    /// further tick from that run is sent.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            drop(active.stop);
            let _ = active.handle.join();
            debug!("[sampler] run {} stopped", active.run);
        }
    }

    pub fn active_run(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.run)
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::Inbound;
    use crossbeam_channel::unbounded;

    #[test]
    fn ticks_until_stopped() {
        let (tx, rx) = unbounded();
        let mut sampler = FrameSampler::new(Duration::from_millis(5));
        let run = sampler.start(EventSink::new(tx));
        assert_eq!(sampler.active_run(), Some(run));

        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(Inbound::Tick { run: r }) => assert_eq!(r, run),
            other => panic!("expected a tick, got {other:?}"),
        }

        sampler.stop();
        assert!(!sampler.is_running());
        // Drain what was queued before stop(); nothing arrives after.
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn start_is_idempotent_and_restarts_get_new_runs() {
        let (tx, _rx) = unbounded();
        let mut sampler = FrameSampler::new(Duration::from_millis(50));
        let a = sampler.start(EventSink::new(tx.clone()));
        let b = sampler.start(EventSink::new(tx.clone()));
        assert_eq!(a, b);
        sampler.stop();
        sampler.stop();
        let c = sampler.start(EventSink::new(tx));
        assert!(c > a);
    }

    #[test]
    fn exits_when_orchestrator_is_gone() {
        let (tx, rx) = unbounded();
        let mut sampler = FrameSampler::new(Duration::from_millis(2));
        sampler.start(EventSink::new(tx));
        drop(rx);
        thread::sleep(Duration::from_millis(20));
        sampler.stop();
    }
}
