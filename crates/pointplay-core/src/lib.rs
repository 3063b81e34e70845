// crates/pointplay-core/src/lib.rs
//
// Pure player data and the orchestration state machine.
// No threads, no channels, no IO beyond reading a config file — the runtime
// collaborators live in pointplay-media and talk to this crate through
// `Machine::step` and the `Effect` list it returns.

pub mod commands;
pub mod config;
pub mod error;
pub mod helpers;
pub mod machine;
pub mod media_types;
pub mod state;

pub use commands::PlayerCommand;
pub use config::PlayerConfig;
pub use error::{InferenceError, PlayerError};
pub use machine::{Effect, Machine, PlayerEvent};
