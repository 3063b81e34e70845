// crates/pointplay-core/src/media_types.rs
//
// Types that flow across the channels between pointplay-media and the core.
// No threads, no codecs — just plain data.

use uuid::Uuid;

use crate::error::InferenceError;

/// A raw frame captured from the video transport. RGBA, tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub timestamp: f64,
    pub width:     u32,
    pub height:    u32,
    pub data:      Vec<u8>,
}

impl VideoFrame {
    /// True when `data` holds exactly `width * height` RGBA pixels.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * 4
    }
}

/// Compressed still frame handed to the inference channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub width:  u32,
    pub height: u32,
    /// PNG bytes.
    pub bytes:  Vec<u8>,
}

/// Depth estimate for one frame. Samples are normalised to 0–255; when
/// `channels > 1` only the first channel of each pixel is depth.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub width:    u32,
    pub height:   u32,
    pub channels: u32,
    pub data:     Vec<u8>,
}

impl DepthMap {
    /// Single-channel map from row-major samples.
    pub fn from_samples(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, channels: 1, data }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Reject maps whose metadata disagrees with their payload.
    pub fn check(&self) -> Result<(), InferenceError> {
        if self.width == 0 || self.height == 0 || self.channels == 0 {
            return Err(InferenceError::Malformed(format!(
                "{}x{}x{} map", self.width, self.height, self.channels,
            )));
        }
        let expected = self.pixel_count() * self.channels as usize;
        if self.data.len() != expected {
            return Err(InferenceError::Malformed(format!(
                "expected {expected} samples, got {}", self.data.len(),
            )));
        }
        Ok(())
    }

    /// Depth value of pixel `i`.
    #[inline]
    pub fn sample(&self, i: usize) -> u8 {
        self.data[i * self.channels as usize]
    }
}

/// Lifecycle events emitted by a video transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEvent {
    MetadataReady { duration: f64 },
    TimeUpdate(f64),
    /// Playback started — by the orchestrator or directly on the transport.
    Played,
    /// Playback paused — by the orchestrator or directly on the transport.
    Paused,
    Ended,
}

/// Binds an inference request to the Session it was issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTag {
    /// Monotonic per-machine request number.
    pub request: u64,
    pub session: Uuid,
}

/// Resolution of one inference request, as delivered back to the machine.
pub type InferenceOutcome = Result<DepthMap, InferenceError>;

/// Diagnostics sent to the collaborator. Never required for correctness.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotice {
    /// The inference backend finished loading.
    BackendReady { backend: String },
    /// A new video replaced the previous one.
    SessionStarted { session: Uuid, source: String },
    SessionReleased { session: Uuid },
    /// A point cloud was published. `frame_time` is the video time of the
    /// frame it was built from.
    FramePublished { session: Uuid, request: u64, points: usize, frame_time: f64 },
    /// Inference failed; the point cloud keeps its previous contents.
    InferenceFailed { request: u64, msg: String },
    /// The transport rejected a command.
    TransportError { msg: String },
}
