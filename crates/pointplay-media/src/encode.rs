// crates/pointplay-media/src/encode.rs
//
// Request payload codec. Captured frames travel to the inference worker as
// PNG stills; the worker decodes them back to RGBA before estimating depth.

use std::io::Cursor;

use anyhow::{bail, Context, Result};

use pointplay_core::media_types::{EncodedImage, VideoFrame};

/// Compress an RGBA frame into a PNG payload.
pub fn encode_png(frame: &VideoFrame) -> Result<EncodedImage> {
    if !frame.is_well_formed() {
        bail!("cannot encode malformed {}x{} frame ({} bytes)", frame.width, frame.height, frame.data.len());
    }

    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, frame.width, frame.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        // Stills are tiny and short-lived — favour speed.
        encoder.set_compression(png::Compression::Fast);
        let mut writer = encoder.write_header().context("png header")?;
        writer.write_image_data(&frame.data).context("png data")?;
        writer.finish().context("png finish")?;
    }

    Ok(EncodedImage { width: frame.width, height: frame.height, bytes })
}

/// Decode a PNG payload into an RGBA frame. 8-bit gray, gray+alpha, RGB
/// and RGBA inputs are accepted.
pub fn decode_png(bytes: &[u8], timestamp: f64) -> Result<VideoFrame> {
    let decoder    = png::Decoder::new(Cursor::new(bytes));
    let mut reader = decoder.read_info().context("png info")?;
    let size       = reader.output_buffer_size().context("png output size overflow")?;
    let mut buf    = vec![0u8; size];
    let info       = reader.next_frame(&mut buf).context("png frame")?;

    if info.bit_depth != png::BitDepth::Eight {
        bail!("unsupported png bit depth {:?}", info.bit_depth);
    }
    let raw = &buf[..info.buffer_size()];
    let data = match info.color_type {
        png::ColorType::Rgba => raw.to_vec(),
        png::ColorType::Rgb => raw
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        png::ColorType::Grayscale => raw
            .iter()
            .flat_map(|&g| [g, g, g, 255])
            .collect(),
        png::ColorType::GrayscaleAlpha => raw
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        other => bail!("unsupported png color type {other:?}"),
    };

    Ok(VideoFrame { timestamp, width: info.width, height: info.height, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_payload_is_png() {
        let f   = VideoFrame { timestamp: 0.0, width: 3, height: 2, data: vec![7; 24] };
        let img = encode_png(&f).unwrap();
        assert_eq!(&img.bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!((img.width, img.height), (3, 2));
        let back = decode_png(&img.bytes, 1.0).unwrap();
        assert_eq!(back.data, f.data);
        assert_eq!(back.timestamp, 1.0);
    }

    #[test]
    fn malformed_frame_is_rejected() {
        let f = VideoFrame { timestamp: 0.0, width: 3, height: 2, data: vec![0; 5] };
        assert!(encode_png(&f).is_err());
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(decode_png(b"not a png", 0.0).is_err());
    }
}
