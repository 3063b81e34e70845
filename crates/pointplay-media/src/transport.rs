// crates/pointplay-media/src/transport.rs
//
// VideoTransport: the playback element the orchestrator drives.
//
// Commands go in through the trait methods; lifecycle events come back out
// through the EventSink handed over in attach(). A transport must report
// Played / Paused for every state change, whoever caused it. The state
// machine trusts those events, not the commands it sent.
//
// SyntheticTransport is a clock-driven stand-in used by the CLI: it renders
// a generated test pattern instead of decoding a file, advances its
// position in wall-clock time while playing, reports TimeUpdate at a fixed
// cadence and Ended when it reaches its duration.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use pointplay_core::helpers::time::format_time;
use pointplay_core::media_types::{TransportEvent, VideoFrame};

use crate::orchestrator::EventSink;

pub trait VideoTransport: Send {
    /// Register the sink that receives this transport's lifecycle events.
    fn attach(&mut self, sink: EventSink);
    /// Load a new source. The transport is left paused at 0; if it was
    /// playing it reports Paused before the new source's metadata.
    fn set_source(&mut self, uri: &str) -> Result<()>;
    /// Drop the current source, if any. Reports Paused if it was playing.
    fn unload(&mut self);
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn seek(&mut self, t: f64);
    /// Current frame, RGBA. `None` when nothing is loaded or decodable.
    fn capture_frame(&mut self) -> Option<VideoFrame>;
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Playback position shared between the transport and its clock thread.
#[derive(Debug)]
struct Clock {
    duration: f64,
    /// Position at the last play/pause/seek.
    base:     f64,
    /// Set while playing.
    since:    Option<Instant>,
}

impl Clock {
    fn position(&self) -> f64 {
        let t = match self.since {
            Some(start) => self.base + start.elapsed().as_secs_f64(),
            None        => self.base,
        };
        t.min(self.duration)
    }

    fn freeze(&mut self) {
        self.base  = self.position();
        self.since = None;
    }
}

struct ClockThread {
    stop:   Sender<()>,
    handle: thread::JoinHandle<()>,
}

// ── SyntheticTransport ────────────────────────────────────────────────────────

pub struct SyntheticTransport {
    width:        u32,
    height:       u32,
    duration:     f64,
    update_every: Duration,
    source:       Option<String>,
    clock:        Arc<Mutex<Clock>>,
    clock_thread: Option<ClockThread>,
    sink:         Option<EventSink>,
}

impl SyntheticTransport {
    /// `duration` seconds of `width × height` test pattern per source,
    /// reporting TimeUpdate every `update_every` while playing.
    pub fn new(width: u32, height: u32, duration: f64, update_every: Duration) -> Self {
        Self {
            width:        width.max(1),
            height:       height.max(1),
            duration:     duration.max(0.0),
            update_every,
            source:       None,
            clock:        Arc::new(Mutex::new(Clock { duration: 0.0, base: 0.0, since: None })),
            clock_thread: None,
            sink:         None,
        }
    }

    pub fn position(&self) -> f64 {
        self.clock.lock().position()
    }

    fn emit(&self, ev: TransportEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(ev);
        }
    }

    fn start_clock(&mut self) {
        // The clock thread exits by itself after Ended; reap it before restarting.
        if self.clock_thread.as_ref().is_some_and(|ct| ct.handle.is_finished()) {
            self.stop_clock();
        }
        if self.clock_thread.is_some() {
            return;
        }
        // Pinned: ticks still in flight after the source changes are stale.
        let Some(sink) = self.sink.as_ref().map(EventSink::pinned) else { return };
        let clock           = Arc::clone(&self.clock);
        let ticker          = tick(self.update_every);
        let (stop, stop_rx) = bounded::<()>(0);

        let spawned = thread::Builder::new()
            .name("pointplay-transport-clock".into())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        let (t, ended) = {
                            let mut c = clock.lock();
                            let t = c.position();
                            let ended = c.duration > 0.0 && t >= c.duration;
                            if ended {
                                c.freeze();
                            }
                            (t, ended)
                        };
                        sink.emit(TransportEvent::TimeUpdate(t));
                        if ended {
                            sink.emit(TransportEvent::Ended);
                            return;
                        }
                    }
                    recv(stop_rx) -> _ => return,
                }
            });

        match spawned {
            Ok(handle) => self.clock_thread = Some(ClockThread { stop, handle }),
            Err(e)     => warn!("[transport] clock thread: {e}"),
        }
    }

    fn stop_clock(&mut self) {
        if let Some(ct) = self.clock_thread.take() {
            drop(ct.stop);
            let _ = ct.handle.join();
        }
    }

    /// Stop playback and reset the clock to `duration`, position 0.
    /// Returns whether the clock was running.
    fn halt(&mut self, duration: f64) -> bool {
        self.stop_clock();
        let mut c = self.clock.lock();
        let was_playing = c.since.is_some();
        *c = Clock { duration, base: 0.0, since: None };
        was_playing
    }

    /// Moving test pattern: horizontal red ramp, vertical green ramp, and a
    /// bright vertical bar sweeping across the frame over time.
    fn render(&self, t: f64) -> VideoFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let bar_x  = ((t * 0.25).fract() * w as f64) as usize;
        let mut data = Vec::with_capacity(w * h * 4);
        for y in 0..h {
            let g = (y * 255 / h.max(2).saturating_sub(1).max(1)).min(255) as u8;
            for x in 0..w {
                let r = (x * 255 / w.max(2).saturating_sub(1).max(1)).min(255) as u8;
                let b = if x.abs_diff(bar_x) < w / 16 + 1 { 255 } else { 64 };
                data.extend_from_slice(&[r, g, b, 255]);
            }
        }
        VideoFrame { timestamp: t, width: self.width, height: self.height, data }
    }
}

impl VideoTransport for SyntheticTransport {
    fn attach(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }

    fn set_source(&mut self, uri: &str) -> Result<()> {
        if uri.trim().is_empty() {
            bail!("empty video source");
        }
        if self.halt(self.duration) {
            self.emit(TransportEvent::Paused);
        }
        self.source = Some(uri.to_string());
        debug!("[transport] source ← {uri}");
        self.emit(TransportEvent::MetadataReady { duration: self.duration });
        Ok(())
    }

    fn unload(&mut self) {
        if self.halt(0.0) {
            self.emit(TransportEvent::Paused);
        }
        self.source = None;
    }

    fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            bail!("play with no source loaded");
        }
        {
            let mut c = self.clock.lock();
            if c.since.is_some() {
                return Ok(());
            }
            // Playing from the end restarts at 0, like a media element.
            if c.duration > 0.0 && c.base >= c.duration {
                c.base = 0.0;
            }
            c.since = Some(Instant::now());
        }
        self.start_clock();
        self.emit(TransportEvent::Played);
        Ok(())
    }

    fn pause(&mut self) {
        let was_playing = {
            let mut c = self.clock.lock();
            let playing = c.since.is_some();
            c.freeze();
            playing
        };
        self.stop_clock();
        if was_playing {
            self.emit(TransportEvent::Paused);
        }
    }

    fn seek(&mut self, t: f64) {
        let t = {
            let mut c = self.clock.lock();
            let t = t.clamp(0.0, c.duration);
            c.base = t;
            if c.since.is_some() {
                c.since = Some(Instant::now());
            }
            t
        };
        debug!("[transport] seek {}", format_time(t));
        self.emit(TransportEvent::TimeUpdate(t));
    }

    fn capture_frame(&mut self) -> Option<VideoFrame> {
        self.source.as_ref()?;
        let t = self.position();
        Some(self.render(t))
    }
}

impl Drop for SyntheticTransport {
    fn drop(&mut self) {
        self.stop_clock();
    }
}
