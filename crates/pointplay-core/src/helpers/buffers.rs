// crates/pointplay-core/src/helpers/buffers.rs
//
// Frame → point colors and depth map → point positions.
//
// Both functions are deterministic and side-effect free. They are only
// ever called on data belonging to the current Session; the machine checks
// request tags (and DepthMap::check) before reaching here.
//
// Layout:
//   colors    — [r, g, b, r, g, b, ...]   one triple per pixel, row-major
//   positions — [x, y, z, x, y, z, ...]   one triple per depth sample
//
// The point grid spans x ∈ [-aspect, aspect), y ∈ (-1, 1] with row 0 at the
// top, and z ∈ [-z_scale/2, z_scale/2] growing with the depth sample.

use rayon::prelude::*;

use crate::media_types::{DepthMap, VideoFrame};

/// Lookup table mapping a byte to `round((v/255)^gamma * 255)`.
fn gamma_lut(gamma: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        let n = v as f32 / 255.0;
        *slot = (n.powf(gamma) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// RGBA frame → gamma-adjusted RGB triples. Alpha is dropped.
///
/// Precondition: `frame.is_well_formed()`.
///
/// ```
/// use pointplay_core::media_types::VideoFrame;
/// use pointplay_core::helpers::buffers::colors_from_frame;
/// let f = VideoFrame { timestamp: 0.0, width: 1, height: 1, data: vec![255, 0, 255, 255] };
/// assert_eq!(colors_from_frame(&f, 1.8), vec![255, 0, 255]);
/// ```
pub fn colors_from_frame(frame: &VideoFrame, gamma: f32) -> Vec<u8> {
    debug_assert!(frame.is_well_formed(), "colors_from_frame: malformed frame");
    let lut   = gamma_lut(gamma);
    let count = frame.data.len() / 4;
    let mut out = vec![0u8; count * 3];
    out.par_chunks_exact_mut(3)
        .zip(frame.data.par_chunks_exact(4))
        .for_each(|(dst, px)| {
            dst[0] = lut[px[0] as usize];
            dst[1] = lut[px[1] as usize];
            dst[2] = lut[px[2] as usize];
        });
    out
}

/// Depth map → xyz triples, one per sample.
///
/// Precondition: `depth.check().is_ok()`.
pub fn positions_from_depth(depth: &DepthMap, z_scale: f32) -> Vec<f32> {
    debug_assert!(depth.check().is_ok(), "positions_from_depth: malformed depth map");
    let w        = depth.width as usize;
    let (wf, hf) = (depth.width as f32, depth.height as f32);
    let aspect   = wf / hf;
    let mut out = vec![0.0f32; depth.pixel_count() * 3];
    out.par_chunks_exact_mut(3)
        .enumerate()
        .for_each(|(i, p)| {
            let col = (i % w) as f32;
            let row = (i / w) as f32;
            let z   = depth.sample(i) as f32 / 255.0;
            p[0] = (col / wf) * aspect * 2.0 - aspect;
            p[1] = (1.0 - row / hf) * 2.0 - 1.0;
            p[2] = z * z_scale - z_scale / 2.0;
        });
    out
}
