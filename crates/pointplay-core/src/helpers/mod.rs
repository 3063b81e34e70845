// crates/pointplay-core/src/helpers/mod.rs
//
// Pure, stateless helpers shared by the machine and the media runtime.

pub mod buffers;
pub mod frame;
pub mod time;
