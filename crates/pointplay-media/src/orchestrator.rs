// crates/pointplay-media/src/orchestrator.rs
//
// Orchestrator: the single thread that owns the Machine and executes the
// effects it returns.
//
// Everything the machine reacts to arrives through one inbox — user commands
// from PlayerHandle, lifecycle events from the transport, ticks from the
// FrameSampler — plus the reply receiver of the one request in flight.
// Events are handled strictly one at a time; follow-up events produced while
// executing effects (a captured frame, an encode failure) are handled before
// the next inbox message, so no other event can slip between a capture and
// its submission.
//
// Transport events are stamped with the source generation current when they
// were sent. Loading or unloading a source starts a new generation, so events
// still queued from the previous source (a late Played, a TimeUpdate or Ended
// from the old clock) never reach the new Session.
//
// After every handled event the machine's snapshot is published behind an
// RwLock, so a reader always sees positions and colors from the same frame.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{never, select, unbounded, Receiver, RecvError, SendError, Sender, TryRecvError};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use pointplay_core::commands::PlayerCommand;
use pointplay_core::config::PlayerConfig;
use pointplay_core::error::InferenceError;
use pointplay_core::machine::{Effect, Machine, PlayerEvent};
use pointplay_core::media_types::{InferenceOutcome, PlayerNotice, RequestTag, TransportEvent};
use pointplay_core::state::PlayerSnapshot;

use crate::encode::encode_png;
use crate::inference::{InferenceChannel, PendingDepth};
use crate::sampler::FrameSampler;
use crate::transport::VideoTransport;

/// Inbox message.
#[derive(Debug)]
pub enum Inbound {
    Event(PlayerEvent),
    /// Transport lifecycle event sent during source generation `generation`.
    Transport { generation: u64, event: TransportEvent },
    /// Sampler tick from run `run`. Ticks from a stopped run are dropped.
    Tick { run: u64 },
    Shutdown,
}

// ── EventSink ─────────────────────────────────────────────────────────────────

/// Write end of the orchestrator inbox handed to transports and the sampler.
#[derive(Clone)]
pub struct EventSink {
    tx:         Sender<Inbound>,
    generation: Arc<AtomicU64>,
    /// Fixed stamp for sinks handed to threads tied to one source.
    pinned:     Option<u64>,
}

impl EventSink {
    pub fn new(tx: Sender<Inbound>) -> Self {
        Self::with_generation(tx, Arc::new(AtomicU64::new(0)))
    }

    fn with_generation(tx: Sender<Inbound>, generation: Arc<AtomicU64>) -> Self {
        Self { tx, generation, pinned: None }
    }

    /// A sink that keeps stamping the current source generation after the
    /// source changes. Give one to anything that runs for a single source,
    /// like a playback clock, so its late events are recognised as stale.
    pub fn pinned(&self) -> EventSink {
        EventSink {
            tx:         self.tx.clone(),
            generation: Arc::clone(&self.generation),
            pinned:     Some(self.current_generation()),
        }
    }

    fn current_generation(&self) -> u64 {
        self.pinned.unwrap_or_else(|| self.generation.load(Ordering::SeqCst))
    }

    /// Report a transport lifecycle event. Dropped silently once the
    /// orchestrator is gone.
    pub fn emit(&self, ev: TransportEvent) {
        let generation = self.current_generation();
        let _ = self.tx.send(Inbound::Transport { generation, event: ev });
    }

    pub fn tick(&self, run: u64) -> Result<(), SendError<Inbound>> {
        self.tx.send(Inbound::Tick { run })
    }
}

// ── PlayerHandle ──────────────────────────────────────────────────────────────

/// Cheap, cloneable front end to a running Orchestrator.
#[derive(Clone)]
pub struct PlayerHandle {
    tx:       Sender<Inbound>,
    snapshot: Arc<RwLock<PlayerSnapshot>>,
}

impl PlayerHandle {
    pub fn command(&self, cmd: PlayerCommand) {
        trace!("[handle] → {}", cmd.label());
        let _ = self.tx.send(Inbound::Event(PlayerEvent::Command(cmd)));
    }

    pub fn setup_video(&self, source: impl Into<String>) {
        self.command(PlayerCommand::SetupVideo(source.into()));
    }

    pub fn play(&self)  { self.command(PlayerCommand::Play); }
    pub fn pause(&self) { self.command(PlayerCommand::Pause); }
    pub fn reset(&self) { self.command(PlayerCommand::Reset); }

    pub fn seek(&self, t: f64) {
        self.command(PlayerCommand::Seek(t));
    }

    /// Latest published state. Positions and colors always come from the
    /// same frame.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.read().clone()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Inbound::Shutdown);
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

enum Wake {
    Depth(Result<InferenceOutcome, RecvError>),
    Inbox(Result<Inbound, RecvError>),
}

pub struct Orchestrator {
    machine:    Machine,
    transport:  Box<dyn VideoTransport>,
    channel:    Box<dyn InferenceChannel>,
    sampler:    FrameSampler,
    inbox_tx:   Sender<Inbound>,
    inbox:      Receiver<Inbound>,
    /// Bumped before every source load / unload.
    source_gen: Arc<AtomicU64>,
    /// Reply receiver for the request occupying the machine's slot.
    pending:    Option<(RequestTag, PendingDepth)>,
    snapshot:   Arc<RwLock<PlayerSnapshot>>,
    notices:    Sender<PlayerNotice>,
    stopped:    bool,
}

impl Orchestrator {
    pub fn new(
        config:        PlayerConfig,
        mut transport: Box<dyn VideoTransport>,
        channel:       Box<dyn InferenceChannel>,
        notices:       Sender<PlayerNotice>,
    ) -> Self {
        // Unbounded: the transport emits from inside effect execution on this
        // thread, so a full bounded inbox would deadlock.
        let (inbox_tx, inbox) = unbounded::<Inbound>();
        let source_gen        = Arc::new(AtomicU64::new(0));
        transport.attach(EventSink::with_generation(inbox_tx.clone(), Arc::clone(&source_gen)));
        let sampler  = FrameSampler::new(config.sample_period());
        let machine  = Machine::new(config);
        let snapshot = Arc::new(RwLock::new(machine.snapshot()));
        Self {
            machine,
            transport,
            channel,
            sampler,
            inbox_tx,
            inbox,
            source_gen,
            pending: None,
            snapshot,
            notices,
            stopped: false,
        }
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle { tx: self.inbox_tx.clone(), snapshot: Arc::clone(&self.snapshot) }
    }

    /// Sink stamping the live source generation, as the transport's does.
    pub fn sink(&self) -> EventSink {
        EventSink::with_generation(self.inbox_tx.clone(), Arc::clone(&self.source_gen))
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.read().clone()
    }

    pub fn sampler_running(&self) -> bool {
        self.sampler.is_running()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Handle one event to completion, including every follow-up event its
    /// effects produce, then publish the snapshot.
    pub fn dispatch(&mut self, event: PlayerEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(ev) = queue.pop_front() {
            for effect in self.machine.step(ev) {
                self.execute(effect, &mut queue);
            }
        }
        *self.snapshot.write() = self.machine.snapshot();
    }

    /// Handle everything that is ready right now without blocking. Returns
    /// the number of messages handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while !self.stopped {
            if let Some(ev) = self.try_resolve() {
                self.dispatch(ev);
                handled += 1;
                continue;
            }
            match self.inbox.try_recv() {
                Ok(msg) => {
                    self.handle_inbound(msg);
                    handled += 1;
                }
                Err(_) => break,
            }
        }
        handled
    }

    /// Block handling messages until a Shutdown arrives.
    pub fn run(mut self) {
        info!("[orchestrator] running");
        while !self.stopped {
            let wake = {
                let idle  = never::<InferenceOutcome>();
                let reply = self.pending.as_ref().map(|(_, rx)| rx).unwrap_or(&idle);
                select! {
                    recv(reply) -> r      => Wake::Depth(r),
                    recv(self.inbox) -> m => Wake::Inbox(m),
                }
            };
            match wake {
                Wake::Depth(r) => {
                    if let Some((tag, _)) = self.pending.take() {
                        let outcome = r.unwrap_or(Err(InferenceError::Disconnected));
                        self.dispatch(PlayerEvent::InferenceResolved { tag, outcome });
                    }
                }
                Wake::Inbox(Ok(msg)) => self.handle_inbound(msg),
                Wake::Inbox(Err(_))  => break,
            }
        }
        info!("[orchestrator] stopped");
    }

    fn handle_inbound(&mut self, msg: Inbound) {
        match msg {
            Inbound::Event(ev) => self.dispatch(ev),
            Inbound::Transport { generation, event } => {
                if generation == self.source_gen.load(Ordering::SeqCst) {
                    self.dispatch(PlayerEvent::Transport(event));
                } else {
                    debug!("[orchestrator] {event:?} from a replaced source dropped");
                }
            }
            Inbound::Tick { run } => {
                if self.sampler.active_run() == Some(run) {
                    self.dispatch(PlayerEvent::SampleRequested);
                } else {
                    trace!("[orchestrator] tick from stopped run {run} dropped");
                }
            }
            Inbound::Shutdown => {
                self.sampler.stop();
                self.transport.pause();
                self.stopped = true;
            }
        }
    }

    /// Take the pending reply if it has arrived. A dropped sender counts as a
    /// failed request so the slot never stays occupied forever.
    fn try_resolve(&mut self) -> Option<PlayerEvent> {
        let (tag, rx) = self.pending.as_ref()?;
        let outcome = match rx.try_recv() {
            Ok(outcome)                     => outcome,
            Err(TryRecvError::Empty)        => return None,
            Err(TryRecvError::Disconnected) => Err(InferenceError::Disconnected),
        };
        let tag = *tag;
        self.pending = None;
        Some(PlayerEvent::InferenceResolved { tag, outcome })
    }

    // ── Effects ───────────────────────────────────────────────────────────────

    fn execute(&mut self, effect: Effect, follow_up: &mut VecDeque<PlayerEvent>) {
        match effect {
            Effect::SetSource(uri) => {
                self.source_gen.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = self.transport.set_source(&uri) {
                    self.transport_error(format!("load {uri}: {e:#}"));
                }
            }
            Effect::UnloadSource => {
                self.source_gen.fetch_add(1, Ordering::SeqCst);
                self.transport.unload();
            }
            Effect::Play => {
                if let Err(e) = self.transport.play() {
                    self.transport_error(format!("play: {e:#}"));
                }
            }
            Effect::Pause   => self.transport.pause(),
            Effect::Seek(t) => self.transport.seek(t),

            Effect::StartSampler => {
                self.sampler.start(EventSink::new(self.inbox_tx.clone()));
            }
            Effect::StopSampler => self.sampler.stop(),

            Effect::CaptureFrame { tag } => match self.transport.capture_frame() {
                Some(frame) => follow_up.push_back(PlayerEvent::FrameCaptured { tag, frame }),
                None => follow_up.push_back(PlayerEvent::CaptureFailed {
                    tag,
                    msg: "transport has no frame".into(),
                }),
            },

            Effect::SubmitInference { tag, frame } => match encode_png(&frame) {
                Ok(image) => {
                    debug!(
                        "[orchestrator] submit #{} ({}x{}, {} bytes)",
                        tag.request, image.width, image.height, image.bytes.len(),
                    );
                    let rx = self.channel.submit(image);
                    if let Some((old, _)) = self.pending.replace((tag, rx)) {
                        warn!("[orchestrator] request #{} replaced while unresolved", old.request);
                    }
                }
                Err(e) => follow_up.push_back(PlayerEvent::InferenceResolved {
                    tag,
                    outcome: Err(InferenceError::Payload(format!("{e:#}"))),
                }),
            },

            Effect::Notify(notice) => {
                let _ = self.notices.send(notice);
            }
        }
    }

    fn transport_error(&self, msg: String) {
        warn!("[orchestrator] transport: {msg}");
        let _ = self.notices.send(PlayerNotice::TransportError { msg });
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.sampler.stop();
    }
}
