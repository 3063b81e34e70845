// crates/pointplay-media/src/lib.rs
//
// Runtime side of the player: the collaborators the state machine talks to
// and the thin runner that executes its effects.
//
// To add a new collaborator:
//   1. Create a new module file here
//   2. Add `pub mod mymodule;` below
//   3. Wire its effect in orchestrator.rs (Orchestrator::execute)

pub mod encode;
pub mod inference;
pub mod orchestrator;
pub mod sampler;
pub mod transport;

// Re-export the main public API so front ends import from one place.
pub use inference::{DepthEstimator, InferenceChannel, InferenceWorker, LumaDepthEstimator, PendingDepth};
pub use orchestrator::{EventSink, Orchestrator, PlayerHandle};
pub use sampler::FrameSampler;
pub use transport::{SyntheticTransport, VideoTransport};
pub use pointplay_core::media_types::{DepthMap, EncodedImage, PlayerNotice, TransportEvent, VideoFrame};
