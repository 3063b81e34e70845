// crates/pointplay-core/src/helpers/frame.rs
//
// Capture-side frame sizing. Inference runs on a small still, and the
// colors are computed from that same still so colors and depth line up
// pixel for pixel.

use crate::media_types::VideoFrame;

/// Output size for a `width × height` source scaled to `target_width`.
///
/// Aspect ratio is preserved and the height floors, never below 1.
/// Sources already at or below the target width keep their size.
///
/// ```
/// use pointplay_core::helpers::frame::scaled_size;
/// assert_eq!(scaled_size(1920, 1080, 320), (320, 180));
/// assert_eq!(scaled_size(200, 100, 320), (200, 100));
/// ```
pub fn scaled_size(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    if width <= target_width || width == 0 {
        return (width, height);
    }
    let factor = target_width as f64 / width as f64;
    let h = ((height as f64 * factor).floor() as u32).max(1);
    (target_width, h)
}

/// Nearest-neighbour downscale of an RGBA frame to `target_width`.
pub fn downscale(frame: &VideoFrame, target_width: u32) -> VideoFrame {
    let (out_w, out_h) = scaled_size(frame.width, frame.height, target_width);
    if (out_w, out_h) == (frame.width, frame.height) {
        return frame.clone();
    }

    let (src_w, src_h) = (frame.width as usize, frame.height as usize);
    let mut data = Vec::with_capacity(out_w as usize * out_h as usize * 4);
    for y in 0..out_h as usize {
        let sy = (y * src_h / out_h as usize).min(src_h - 1);
        for x in 0..out_w as usize {
            let sx  = (x * src_w / out_w as usize).min(src_w - 1);
            let off = (sy * src_w + sx) * 4;
            data.extend_from_slice(&frame.data[off..off + 4]);
        }
    }

    VideoFrame { timestamp: frame.timestamp, width: out_w, height: out_h, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tall_source_keeps_aspect() {
        assert_eq!(scaled_size(640, 1280, 320), (320, 640));
    }

    #[test]
    fn thin_strip_never_collapses() {
        assert_eq!(scaled_size(4000, 1, 320), (320, 1));
    }

    #[test]
    fn downscale_picks_source_pixels() {
        // 4x2 frame where each pixel's red channel is its column index.
        let mut data = Vec::new();
        for _row in 0..2 {
            for col in 0..4u8 {
                data.extend_from_slice(&[col, 0, 0, 255]);
            }
        }
        let f   = VideoFrame { timestamp: 1.5, width: 4, height: 2, data };
        let out = downscale(&f, 2);
        assert_eq!((out.width, out.height), (2, 1));
        assert!(out.is_well_formed());
        assert_eq!(out.data[0], 0);
        assert_eq!(out.data[4], 2);
        assert_eq!(out.timestamp, 1.5);
    }
}
