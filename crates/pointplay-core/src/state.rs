// crates/pointplay-core/src/state.rs
//
// Player data owned by the Machine — no threads, no runtime handles.
//
// Ownership: Session, InferenceSlot and RenderBuffers are only ever written
// by Machine::step. Collaborators read them through PlayerSnapshot.

use std::sync::Arc;

use uuid::Uuid;

use crate::media_types::RequestTag;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    NoVideo,
    Ready,
    Playing,
    /// Playing, with a request for the current Session in flight.
    ProcessingFrame,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::ProcessingFrame)
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackState::NoVideo         => "no_video",
            PlaybackState::Ready           => "ready",
            PlaybackState::Playing         => "playing",
            PlaybackState::ProcessingFrame => "processing_frame",
        }
    }
}

/// The currently loaded video. Replaced wholesale on SetupVideo.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub id:           Uuid,
    pub source:       String,
    /// Seconds; 0 until the transport reports metadata.
    pub duration:     f64,
    pub current_time: f64,
}

impl Session {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id:           Uuid::new_v4(),
            source:       source.into(),
            duration:     0.0,
            current_time: 0.0,
        }
    }
}

/// Single-flight marker. At most one request is outstanding at a time.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum InferenceSlot {
    #[default]
    Empty,
    InFlight {
        tag:        RequestTag,
        /// Transport time of the sampled frame.
        frame_time: f64,
    },
}

impl InferenceSlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, InferenceSlot::Empty)
    }

    pub fn tag(&self) -> Option<RequestTag> {
        match self {
            InferenceSlot::Empty                => None,
            InferenceSlot::InFlight { tag, .. } => Some(*tag),
        }
    }
}

/// Last published point cloud. `positions` is flat xyz triples, `colors` flat
/// rgb triples; when both are present they come from the same frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderBuffers {
    pub positions: Option<Arc<[f32]>>,
    pub colors:    Option<Arc<[u8]>>,
    /// Session whose frame produced the buffers.
    pub epoch:     Option<Uuid>,
    /// Request number of the frame, if positions are present.
    pub request:   Option<u64>,
}

impl RenderBuffers {
    pub fn point_count(&self) -> usize {
        self.positions.as_ref().map(|p| p.len() / 3).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_none() && self.colors.is_none()
    }
}

/// Observable outputs, copied out after every processed event.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerSnapshot {
    pub state:          PlaybackState,
    pub is_playing:     bool,
    pub has_video:      bool,
    pub current_time:   f64,
    pub duration:       f64,
    pub source:         Option<String>,
    pub buffers:        RenderBuffers,
    /// True while a request is outstanding (current or stale Session).
    pub inference_busy: bool,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            state:          PlaybackState::NoVideo,
            is_playing:     false,
            has_video:      false,
            current_time:   0.0,
            duration:       0.0,
            source:         None,
            buffers:        RenderBuffers::default(),
            inference_busy: false,
        }
    }
}

impl PlayerSnapshot {
    pub fn positions(&self) -> Option<&[f32]> {
        self.buffers.positions.as_deref()
    }

    pub fn colors(&self) -> Option<&[u8]> {
        self.buffers.colors.as_deref()
    }
}
