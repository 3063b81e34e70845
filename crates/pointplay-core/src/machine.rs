// crates/pointplay-core/src/machine.rs
//
// The player state machine.
//
// Machine::step takes one PlayerEvent, updates the owned Session /
// InferenceSlot / RenderBuffers, and returns the side effects to run as
// Effect descriptors. It never touches a timer, a thread or a channel, so
// every transition is testable by feeding events and inspecting effects.
//
// ── Transition summary ───────────────────────────────────────────────────────
//
//   NoVideo ──SetupVideo──▶ Ready ──Played──▶ Playing ──SampleRequested──▶ ProcessingFrame
//                           ▲  ▲                │  ▲                             │
//                           │  └──Paused/Ended──┘  └──────InferenceResolved──────┘
//                           └──────────────SetupVideo / Paused / Ended───────────┘
//   any ──Reset──▶ NoVideo
//
// Play and Pause commands are forwarded to the transport. The machine only
// changes state when the transport echoes Played / Paused, so a user pressing
// play directly on the transport goes through exactly the same path.
//
// ── Staleness ────────────────────────────────────────────────────────────────
//
// Every request carries a RequestTag { request, session }. Replacing or
// resetting the Session does not touch the in-flight slot — the channel has
// no cancel — but the resolution is compared against the current Session id
// and dropped on mismatch. The slot stays occupied until that resolution
// arrives, so single-flight holds across Session changes too.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::commands::PlayerCommand;
use crate::config::PlayerConfig;
use crate::error::{InferenceError, PlayerError};
use crate::helpers::buffers::{colors_from_frame, positions_from_depth};
use crate::helpers::frame::downscale;
use crate::helpers::time::format_time;
use crate::media_types::{InferenceOutcome, PlayerNotice, RequestTag, TransportEvent, VideoFrame};
use crate::state::{InferenceSlot, PlaybackState, PlayerSnapshot, RenderBuffers, Session};

/// Everything the machine reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// User / collaborator command.
    Command(PlayerCommand),
    /// Lifecycle event from the video transport.
    Transport(TransportEvent),
    /// FrameSampler tick.
    SampleRequested,
    /// Reply to `Effect::CaptureFrame`.
    FrameCaptured { tag: RequestTag, frame: VideoFrame },
    /// The transport had no frame to give for `Effect::CaptureFrame`.
    CaptureFailed { tag: RequestTag, msg: String },
    /// The inference channel answered the request identified by `tag`.
    InferenceResolved { tag: RequestTag, outcome: InferenceOutcome },
}

/// Side effects requested by a transition. Executed in order by the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    // ── Transport ─────────────────────────────────────────────────────────────
    SetSource(String),
    UnloadSource,
    Play,
    Pause,
    Seek(f64),

    // ── Sampler ───────────────────────────────────────────────────────────────
    StartSampler,
    /// Must complete before the next event is processed.
    StopSampler,

    // ── Inference ─────────────────────────────────────────────────────────────
    /// Grab the current transport frame and reply with FrameCaptured or
    /// CaptureFailed before any other event.
    CaptureFrame { tag: RequestTag },
    /// Encode `frame` and submit it to the inference channel.
    SubmitInference { tag: RequestTag, frame: VideoFrame },

    // ── Diagnostics ───────────────────────────────────────────────────────────
    Notify(PlayerNotice),
}

/// Colors computed at capture time, held until the matching depth arrives.
#[derive(Debug, Clone)]
struct StagedColors {
    tag:    RequestTag,
    pixels: usize,
    colors: Arc<[u8]>,
}

pub struct Machine {
    config:       PlayerConfig,
    state:        PlaybackState,
    session:      Option<Session>,
    slot:         InferenceSlot,
    buffers:      RenderBuffers,
    staged:       Option<StagedColors>,
    next_request: u64,
}

impl Machine {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            state:        PlaybackState::NoVideo,
            session:      None,
            slot:         InferenceSlot::Empty,
            buffers:      RenderBuffers::default(),
            staged:       None,
            next_request: 1,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> PlaybackState { self.state }
    pub fn session(&self) -> Option<&Session> { self.session.as_ref() }
    pub fn slot(&self) -> InferenceSlot { self.slot }
    pub fn buffers(&self) -> &RenderBuffers { &self.buffers }
    pub fn config(&self) -> &PlayerConfig { &self.config }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state:          self.state,
            is_playing:     self.state.is_playing(),
            has_video:      self.session.is_some(),
            current_time:   self.session.as_ref().map(|s| s.current_time).unwrap_or(0.0),
            duration:       self.session.as_ref().map(|s| s.duration).unwrap_or(0.0),
            source:         self.session.as_ref().map(|s| s.source.clone()),
            buffers:        self.buffers.clone(),
            inference_busy: !self.slot.is_empty(),
        }
    }

    // ── Transition function ───────────────────────────────────────────────────

    /// Apply one event and return the effects to execute.
    pub fn step(&mut self, event: PlayerEvent) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            PlayerEvent::Command(cmd)         => self.on_command(cmd, &mut fx),
            PlayerEvent::Transport(ev)        => self.on_transport(ev, &mut fx),
            PlayerEvent::SampleRequested      => self.on_sample_requested(&mut fx),
            PlayerEvent::FrameCaptured { tag, frame } => self.on_frame_captured(tag, frame, &mut fx),
            PlayerEvent::CaptureFailed { tag, msg }   => self.on_capture_failed(tag, msg, &mut fx),
            PlayerEvent::InferenceResolved { tag, outcome } => self.on_resolved(tag, outcome, &mut fx),
        }
        fx
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    fn on_command(&mut self, cmd: PlayerCommand, fx: &mut Vec<Effect>) {
        match cmd {
            PlayerCommand::SetupVideo(source) => self.setup_video(source, fx),
            PlayerCommand::Reset              => self.reset(fx),

            PlayerCommand::Play => match self.state {
                PlaybackState::NoVideo => debug!("[machine] play ignored: no video"),
                PlaybackState::Playing | PlaybackState::ProcessingFrame => {}
                PlaybackState::Ready => fx.push(Effect::Play),
            },

            PlayerCommand::Pause => {
                if self.state.is_playing() {
                    fx.push(Effect::Pause);
                }
            }

            PlayerCommand::Seek(t) => self.seek(t, fx),
        }
    }

    fn setup_video(&mut self, source: String, fx: &mut Vec<Effect>) {
        if self.state.is_playing() {
            fx.push(Effect::StopSampler);
        }
        self.release_session(fx);

        // Colors published ahead of their positions belong to the old video.
        if self.buffers.positions.is_none() && self.buffers.colors.is_some() {
            self.buffers = RenderBuffers::default();
        }

        let session = Session::new(source.clone());
        info!("[machine] session {} ← {source}", session.id);
        fx.push(Effect::SetSource(source.clone()));
        fx.push(Effect::Notify(PlayerNotice::SessionStarted { session: session.id, source }));
        self.session = Some(session);
        self.state   = PlaybackState::Ready;
    }

    fn reset(&mut self, fx: &mut Vec<Effect>) {
        if self.state.is_playing() {
            fx.push(Effect::StopSampler);
        }
        if self.session.is_some() {
            fx.push(Effect::UnloadSource);
        }
        self.release_session(fx);
        self.buffers = RenderBuffers::default();
        self.state   = PlaybackState::NoVideo;
    }

    /// Drop the current Session. The in-flight slot is left alone; its
    /// eventual resolution fails the tag check.
    fn release_session(&mut self, fx: &mut Vec<Effect>) {
        self.staged = None;
        if let Some(old) = self.session.take() {
            debug!("[machine] releasing session {}", old.id);
            fx.push(Effect::Notify(PlayerNotice::SessionReleased { session: old.id }));
        }
    }

    fn seek(&mut self, t: f64, fx: &mut Vec<Effect>) {
        let Some(session) = self.session.as_mut() else {
            debug!("[machine] seek ignored: no video");
            return;
        };
        let mut t = if t.is_finite() { t.max(0.0) } else { 0.0 };
        if session.duration > 0.0 {
            t = t.min(session.duration);
        }
        session.current_time = t;
        debug!("[machine] seek → {}", format_time(t));
        fx.push(Effect::Seek(t));

        // Off-cycle sample; same single-flight rule, state left as is.
        if self.config.sample_on_seek && self.slot.is_empty() {
            self.begin_sample(fx);
        }
    }

    // ── Transport events ──────────────────────────────────────────────────────

    fn on_transport(&mut self, ev: TransportEvent, fx: &mut Vec<Effect>) {
        match ev {
            TransportEvent::MetadataReady { duration } => {
                if let Some(s) = self.session.as_mut() {
                    s.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
                }
            }
            TransportEvent::TimeUpdate(t) => {
                if !t.is_finite() {
                    warn!("[machine] ignoring time update {t}");
                    return;
                }
                if let Some(s) = self.session.as_mut() {
                    s.current_time = if s.duration > 0.0 { t.clamp(0.0, s.duration) } else { t.max(0.0) };
                }
            }
            TransportEvent::Played => match self.state {
                PlaybackState::NoVideo => warn!("[machine] transport played with no video loaded"),
                PlaybackState::Playing | PlaybackState::ProcessingFrame => {}
                PlaybackState::Ready => {
                    fx.push(Effect::StartSampler);
                    self.state = PlaybackState::Playing;
                }
            },
            TransportEvent::Paused => self.leave_playing(fx),
            TransportEvent::Ended => {
                if let Some(s) = self.session.as_mut() {
                    if s.duration > 0.0 {
                        s.current_time = s.duration;
                    }
                }
                self.leave_playing(fx);
            }
        }
    }

    fn leave_playing(&mut self, fx: &mut Vec<Effect>) {
        if self.state.is_playing() {
            fx.push(Effect::StopSampler);
            self.state = PlaybackState::Ready;
        }
    }

    // ── Sampling ──────────────────────────────────────────────────────────────

    fn on_sample_requested(&mut self, fx: &mut Vec<Effect>) {
        if self.state != PlaybackState::Playing || !self.slot.is_empty() {
            return;
        }
        if self.begin_sample(fx) {
            self.state = PlaybackState::ProcessingFrame;
        }
    }

    /// Claim the slot and ask the runner for a frame. Returns false when there
    /// is no Session to sample.
    fn begin_sample(&mut self, fx: &mut Vec<Effect>) -> bool {
        let Some(session) = self.session.as_ref() else {
            warn!("[machine] {}", PlayerError::MissingResource("session"));
            return false;
        };
        let tag = RequestTag { request: self.next_request, session: session.id };
        self.next_request += 1;
        self.slot = InferenceSlot::InFlight { tag, frame_time: session.current_time };
        fx.push(Effect::CaptureFrame { tag });
        true
    }

    fn on_frame_captured(&mut self, tag: RequestTag, frame: VideoFrame, fx: &mut Vec<Effect>) {
        if self.slot.tag() != Some(tag) {
            warn!("[machine] frame for unknown request #{} dropped", tag.request);
            return;
        }
        if !frame.is_well_formed() {
            self.on_capture_failed(tag, format!("malformed {}x{} frame", frame.width, frame.height), fx);
            return;
        }

        let small  = downscale(&frame, self.config.target_width);
        let colors: Arc<[u8]> = colors_from_frame(&small, self.config.color_gamma).into();

        if let InferenceSlot::InFlight { frame_time, .. } = &mut self.slot {
            *frame_time = small.timestamp;
        }

        // First frame of a Session may show colors before depth arrives.
        if self.config.early_colors && self.buffers.positions.is_none() {
            self.buffers.colors = Some(Arc::clone(&colors));
            self.buffers.epoch  = Some(tag.session);
        }

        self.staged = Some(StagedColors {
            tag,
            pixels: small.width as usize * small.height as usize,
            colors,
        });
        fx.push(Effect::SubmitInference { tag, frame: small });
    }

    fn on_capture_failed(&mut self, tag: RequestTag, msg: String, fx: &mut Vec<Effect>) {
        if self.slot.tag() != Some(tag) {
            return;
        }
        warn!("[machine] capture for request #{} failed: {msg}", tag.request);
        self.finish_request();
        fx.push(Effect::Notify(PlayerNotice::InferenceFailed { request: tag.request, msg }));
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    fn on_resolved(&mut self, tag: RequestTag, outcome: InferenceOutcome, fx: &mut Vec<Effect>) {
        let InferenceSlot::InFlight { tag: current_tag, frame_time } = self.slot else {
            warn!("[machine] resolution for request #{} with no request in flight", tag.request);
            return;
        };
        if current_tag != tag {
            warn!("[machine] resolution for unknown request #{} dropped", tag.request);
            return;
        }
        let staged = self.staged.take().filter(|s| s.tag == tag);
        self.finish_request();

        let result = if self.session.as_ref().map(|s| s.id) == Some(tag.session) {
            self.build_buffers(tag, outcome, staged)
        } else {
            Err(PlayerError::StaleResult { session: tag.session, request: tag.request })
        };

        match result {
            Ok(buffers) => {
                let points = buffers.point_count();
                self.buffers = buffers;
                fx.push(Effect::Notify(PlayerNotice::FramePublished {
                    session: tag.session,
                    request: tag.request,
                    points,
                    frame_time,
                }));
            }
            Err(e) if e.is_user_visible() => {
                warn!("[machine] request #{}: {e}", tag.request);
                fx.push(Effect::Notify(PlayerNotice::InferenceFailed {
                    request: tag.request,
                    msg:     e.to_string(),
                }));
            }
            Err(e) => debug!("[machine] {e}"),
        }
    }

    /// Turn a successful resolution into a complete, paired buffer set.
    fn build_buffers(
        &self,
        tag:     RequestTag,
        outcome: InferenceOutcome,
        staged:  Option<StagedColors>,
    ) -> Result<RenderBuffers, PlayerError> {
        let depth  = outcome?;
        depth.check()?;
        let staged = staged.ok_or(PlayerError::MissingResource("staged colors"))?;
        if depth.pixel_count() != staged.pixels {
            return Err(InferenceError::Malformed(format!(
                "{}x{} depth for a {}-pixel frame", depth.width, depth.height, staged.pixels,
            )).into());
        }
        let positions: Arc<[f32]> = positions_from_depth(&depth, self.config.z_scale).into();
        Ok(RenderBuffers {
            positions: Some(positions),
            colors:    Some(staged.colors),
            epoch:     Some(tag.session),
            request:   Some(tag.request),
        })
    }

    /// Clear the slot and fall back from ProcessingFrame.
    fn finish_request(&mut self) {
        self.slot = InferenceSlot::Empty;
        if self.state == PlaybackState::ProcessingFrame {
            self.state = PlaybackState::Playing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_types::DepthMap;

    fn machine() -> Machine {
        Machine::new(PlayerConfig { sample_on_seek: false, ..PlayerConfig::default() })
    }

    fn frame(w: u32, h: u32) -> VideoFrame {
        VideoFrame { timestamp: 0.5, width: w, height: h, data: vec![200; (w * h * 4) as usize] }
    }

    fn cmd(m: &mut Machine, c: PlayerCommand) -> Vec<Effect> {
        m.step(PlayerEvent::Command(c))
    }

    fn transport(m: &mut Machine, ev: TransportEvent) -> Vec<Effect> {
        m.step(PlayerEvent::Transport(ev))
    }

    /// SetupVideo + Played echo.
    fn playing(m: &mut Machine, src: &str) {
        cmd(m, PlayerCommand::SetupVideo(src.into()));
        assert_eq!(cmd(m, PlayerCommand::Play), vec![Effect::Play]);
        assert_eq!(transport(m, TransportEvent::Played), vec![Effect::StartSampler]);
    }

    fn capture_tag(fx: &[Effect]) -> RequestTag {
        fx.iter()
            .find_map(|e| match e {
                Effect::CaptureFrame { tag } => Some(*tag),
                _ => None,
            })
            .expect("no CaptureFrame effect")
    }

    /// Tick, then answer the capture with a w×h frame.
    fn sample(m: &mut Machine, w: u32, h: u32) -> RequestTag {
        let tag = capture_tag(&m.step(PlayerEvent::SampleRequested));
        let fx  = m.step(PlayerEvent::FrameCaptured { tag, frame: frame(w, h) });
        assert!(matches!(fx.as_slice(), [Effect::SubmitInference { .. }]));
        tag
    }

    fn resolve(m: &mut Machine, tag: RequestTag, outcome: InferenceOutcome) -> Vec<Effect> {
        m.step(PlayerEvent::InferenceResolved { tag, outcome })
    }

    fn depth_2x2() -> InferenceOutcome {
        Ok(DepthMap::from_samples(2, 2, vec![10, 20, 30, 40]))
    }

    #[test]
    fn setup_video_enters_ready() {
        let mut m = machine();
        let fx = cmd(&mut m, PlayerCommand::SetupVideo("v1".into()));
        assert_eq!(m.state(), PlaybackState::Ready);
        assert_eq!(fx[0], Effect::SetSource("v1".into()));
        assert!(m.snapshot().has_video);
    }

    #[test]
    fn play_waits_for_transport_echo() {
        let mut m = machine();
        cmd(&mut m, PlayerCommand::SetupVideo("v1".into()));
        cmd(&mut m, PlayerCommand::Play);
        assert_eq!(m.state(), PlaybackState::Ready);
        transport(&mut m, TransportEvent::Played);
        assert_eq!(m.state(), PlaybackState::Playing);
        assert!(m.snapshot().is_playing);
    }

    #[test]
    fn user_play_on_transport_starts_sampler() {
        let mut m = machine();
        cmd(&mut m, PlayerCommand::SetupVideo("v1".into()));
        assert_eq!(transport(&mut m, TransportEvent::Played), vec![Effect::StartSampler]);
    }

    #[test]
    fn play_and_pause_are_idempotent() {
        let mut m = machine();
        playing(&mut m, "v1");
        assert!(cmd(&mut m, PlayerCommand::Play).is_empty());
        assert!(transport(&mut m, TransportEvent::Played).is_empty());
        assert_eq!(m.state(), PlaybackState::Playing);

        assert_eq!(transport(&mut m, TransportEvent::Paused), vec![Effect::StopSampler]);
        assert!(cmd(&mut m, PlayerCommand::Pause).is_empty());
        assert!(transport(&mut m, TransportEvent::Paused).is_empty());
        assert_eq!(m.state(), PlaybackState::Ready);
    }

    #[test]
    fn commands_without_video_are_noops() {
        let mut m = machine();
        assert!(cmd(&mut m, PlayerCommand::Play).is_empty());
        assert!(cmd(&mut m, PlayerCommand::Pause).is_empty());
        assert!(cmd(&mut m, PlayerCommand::Seek(3.0)).is_empty());
        assert!(m.step(PlayerEvent::SampleRequested).is_empty());
        assert_eq!(m.state(), PlaybackState::NoVideo);
    }

    #[test]
    fn tick_claims_slot_and_enters_processing() {
        let mut m = machine();
        playing(&mut m, "v1");
        let fx = m.step(PlayerEvent::SampleRequested);
        assert_eq!(m.state(), PlaybackState::ProcessingFrame);
        let tag = capture_tag(&fx);
        assert_eq!(Some(tag.session), m.session().map(|s| s.id));
        assert!(!m.slot().is_empty());
    }

    #[test]
    fn tick_while_busy_is_dropped() {
        let mut m = machine();
        playing(&mut m, "v1");
        let first = sample(&mut m, 4, 4);
        assert!(m.step(PlayerEvent::SampleRequested).is_empty());
        assert_eq!(m.slot().tag(), Some(first));
    }

    #[test]
    fn tick_while_ready_is_dropped() {
        let mut m = machine();
        cmd(&mut m, PlayerCommand::SetupVideo("v1".into()));
        assert!(m.step(PlayerEvent::SampleRequested).is_empty());
        assert!(m.slot().is_empty());
    }

    #[test]
    fn resolution_publishes_paired_buffers() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        let fx  = resolve(&mut m, tag, depth_2x2());
        assert_eq!(m.state(), PlaybackState::Playing);
        assert!(m.slot().is_empty());
        let snap = m.snapshot();
        assert_eq!(snap.positions().map(|p| p.len()), Some(12));
        assert_eq!(snap.colors().map(|c| c.len()), Some(12));
        assert_eq!(snap.buffers.epoch, Some(tag.session));
        assert!(matches!(fx[0], Effect::Notify(PlayerNotice::FramePublished { points: 4, .. })));
    }

    #[test]
    fn failure_keeps_buffers_and_returns_to_playing() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        resolve(&mut m, tag, depth_2x2());
        let before = m.buffers().clone();

        let tag = sample(&mut m, 2, 2);
        let fx  = resolve(&mut m, tag, Err(InferenceError::Rejected("boom".into())));
        assert_eq!(m.state(), PlaybackState::Playing);
        assert_eq!(m.buffers(), &before);
        assert!(matches!(fx[0], Effect::Notify(PlayerNotice::InferenceFailed { .. })));
    }

    #[test]
    fn new_session_discards_in_flight_result() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        let fx  = cmd(&mut m, PlayerCommand::SetupVideo("v2".into()));
        assert!(fx.contains(&Effect::StopSampler));
        assert_eq!(m.state(), PlaybackState::Ready);
        // Still occupied by the stale request.
        assert_eq!(m.slot().tag(), Some(tag));

        assert!(resolve(&mut m, tag, depth_2x2()).is_empty());
        assert!(m.slot().is_empty());
        assert!(m.buffers().positions.is_none());
        assert!(m.buffers().colors.is_none());
    }

    #[test]
    fn stale_slot_blocks_new_session_ticks() {
        let mut m = machine();
        playing(&mut m, "v1");
        let stale = sample(&mut m, 2, 2);
        cmd(&mut m, PlayerCommand::SetupVideo("v2".into()));
        transport(&mut m, TransportEvent::Played);
        assert_eq!(m.state(), PlaybackState::Playing);
        assert!(m.step(PlayerEvent::SampleRequested).is_empty());

        resolve(&mut m, stale, depth_2x2());
        assert_eq!(m.state(), PlaybackState::Playing);
        assert!(!m.step(PlayerEvent::SampleRequested).is_empty());
    }

    #[test]
    fn stale_failure_is_silent() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        cmd(&mut m, PlayerCommand::SetupVideo("v2".into()));
        assert!(resolve(&mut m, tag, Err(InferenceError::Disconnected)).is_empty());
    }

    #[test]
    fn pause_mid_flight_still_applies_current_session_result() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        assert_eq!(transport(&mut m, TransportEvent::Paused), vec![Effect::StopSampler]);
        assert_eq!(m.state(), PlaybackState::Ready);

        resolve(&mut m, tag, depth_2x2());
        assert_eq!(m.state(), PlaybackState::Ready);
        assert_eq!(m.buffers().point_count(), 4);
    }

    #[test]
    fn play_then_pause_without_ticks_never_samples() {
        let mut m = machine();
        playing(&mut m, "v1");
        assert_eq!(transport(&mut m, TransportEvent::Paused), vec![Effect::StopSampler]);
        assert_eq!(m.state(), PlaybackState::Ready);
        assert!(m.slot().is_empty());
    }

    #[test]
    fn ended_behaves_like_pause() {
        let mut m = machine();
        playing(&mut m, "v1");
        transport(&mut m, TransportEvent::MetadataReady { duration: 8.0 });
        assert_eq!(transport(&mut m, TransportEvent::Ended), vec![Effect::StopSampler]);
        assert_eq!(m.state(), PlaybackState::Ready);
        assert_eq!(m.snapshot().current_time, 8.0);
    }

    #[test]
    fn reset_returns_to_no_video_and_clears() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        resolve(&mut m, tag, depth_2x2());
        let fx = cmd(&mut m, PlayerCommand::Reset);
        assert_eq!(fx[0], Effect::StopSampler);
        assert_eq!(fx[1], Effect::UnloadSource);
        assert_eq!(m.state(), PlaybackState::NoVideo);
        assert!(m.buffers().is_empty());
        assert!(!m.snapshot().has_video);
    }

    #[test]
    fn buffers_survive_session_replacement() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        resolve(&mut m, tag, depth_2x2());
        cmd(&mut m, PlayerCommand::SetupVideo("v2".into()));
        assert_eq!(m.buffers().point_count(), 4);
        assert_eq!(m.buffers().epoch, Some(tag.session));
    }

    #[test]
    fn seek_updates_time_and_clamps() {
        let mut m = machine();
        cmd(&mut m, PlayerCommand::SetupVideo("v1".into()));
        transport(&mut m, TransportEvent::MetadataReady { duration: 10.0 });
        assert_eq!(cmd(&mut m, PlayerCommand::Seek(4.0)), vec![Effect::Seek(4.0)]);
        assert_eq!(m.snapshot().current_time, 4.0);
        assert_eq!(cmd(&mut m, PlayerCommand::Seek(99.0)), vec![Effect::Seek(10.0)]);
        assert_eq!(cmd(&mut m, PlayerCommand::Seek(-1.0)), vec![Effect::Seek(0.0)]);
    }

    #[test]
    fn seek_triggers_off_cycle_sample_when_idle() {
        let mut m = Machine::new(PlayerConfig::default());
        cmd(&mut m, PlayerCommand::SetupVideo("v1".into()));
        let fx = cmd(&mut m, PlayerCommand::Seek(2.0));
        assert_eq!(fx[0], Effect::Seek(2.0));
        capture_tag(&fx);
        assert_eq!(m.state(), PlaybackState::Ready);

        // Busy: second seek does not claim another request.
        let fx = cmd(&mut m, PlayerCommand::Seek(3.0));
        assert_eq!(fx, vec![Effect::Seek(3.0)]);
    }

    #[test]
    fn mismatched_depth_size_is_failure() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = sample(&mut m, 3, 3);
        let fx  = resolve(&mut m, tag, depth_2x2());
        assert!(matches!(fx[0], Effect::Notify(PlayerNotice::InferenceFailed { .. })));
        assert!(m.buffers().positions.is_none());
    }

    #[test]
    fn published_frame_reports_capture_time() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        let fx  = resolve(&mut m, tag, depth_2x2());
        assert!(matches!(
            fx[0],
            Effect::Notify(PlayerNotice::FramePublished { frame_time, .. }) if frame_time == 0.5
        ));
    }

    #[test]
    fn non_finite_time_update_is_ignored() {
        let mut m = machine();
        cmd(&mut m, PlayerCommand::SetupVideo("v1".into()));
        transport(&mut m, TransportEvent::MetadataReady { duration: 10.0 });
        transport(&mut m, TransportEvent::TimeUpdate(3.0));
        transport(&mut m, TransportEvent::TimeUpdate(f64::NAN));
        transport(&mut m, TransportEvent::TimeUpdate(f64::INFINITY));
        assert_eq!(m.snapshot().current_time, 3.0);
        transport(&mut m, TransportEvent::TimeUpdate(42.0));
        assert_eq!(m.snapshot().current_time, 10.0);
    }

    #[test]
    fn capture_failure_frees_slot() {
        let mut m = machine();
        playing(&mut m, "v1");
        let tag = capture_tag(&m.step(PlayerEvent::SampleRequested));
        m.step(PlayerEvent::CaptureFailed { tag, msg: "no frame".into() });
        assert!(m.slot().is_empty());
        assert_eq!(m.state(), PlaybackState::Playing);
    }

    #[test]
    fn early_colors_only_before_first_positions() {
        let mut m = Machine::new(PlayerConfig { early_colors: true, sample_on_seek: false, ..Default::default() });
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        assert!(m.buffers().colors.is_some());
        assert!(m.buffers().positions.is_none());

        // Orphan colors go away with their Session.
        cmd(&mut m, PlayerCommand::SetupVideo("v2".into()));
        assert!(m.buffers().is_empty());
        resolve(&mut m, tag, depth_2x2());
        assert!(m.buffers().is_empty());
    }

    #[test]
    fn early_colors_never_mix_with_older_positions() {
        let mut m = Machine::new(PlayerConfig { early_colors: true, sample_on_seek: false, ..Default::default() });
        playing(&mut m, "v1");
        let tag = sample(&mut m, 2, 2);
        resolve(&mut m, tag, depth_2x2());
        let published = m.buffers().clone();

        sample(&mut m, 2, 2);
        assert_eq!(m.buffers(), &published);
    }

    #[test]
    fn downscales_before_staging() {
        let mut m = Machine::new(PlayerConfig { target_width: 2, sample_on_seek: false, ..Default::default() });
        playing(&mut m, "v1");
        let tag = capture_tag(&m.step(PlayerEvent::SampleRequested));
        let fx  = m.step(PlayerEvent::FrameCaptured { tag, frame: frame(8, 4) });
        match &fx[0] {
            Effect::SubmitInference { frame, .. } => assert_eq!((frame.width, frame.height), (2, 1)),
            other => panic!("unexpected effect {other:?}"),
        }
    }
}
