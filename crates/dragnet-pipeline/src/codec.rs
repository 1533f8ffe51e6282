// crates/dragnet-pipeline/src/codec.rs
//
// Image decode glue for the disk loader. The pipeline treats decoding as an
// external concern; this module is the one place that knows it is PNG
// underneath, so swapping the codec touches nothing else.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};
use dragnet_core::image::{Image, CHANNELS};

/// Decode `path` into a planar f32 image, values in `[0, 1]`.
///
/// Grayscale input is replicated across the three channels; alpha is
/// dropped. Anything but 8-bit depth is rejected.
pub fn load_image(path: &Path) -> Result<Image> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let decoder = png::Decoder::new(BufReader::new(file));
    let mut reader = decoder
        .read_info()
        .with_context(|| format!("reading PNG header of {}", path.display()))?;

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .with_context(|| format!("decoding {}", path.display()))?;

    if info.bit_depth != png::BitDepth::Eight {
        bail!("{}: unsupported bit depth {:?}", path.display(), info.bit_depth);
    }
    let samples = match info.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        other => bail!("{}: unsupported color type {:?}", path.display(), other),
    };

    // Gray and gray+alpha carry one color sample; RGB(A) carry three.
    let color_samples: usize = if samples >= 3 { 3 } else { 1 };

    let (w, h) = (info.width, info.height);
    let mut im = Image::new(w, h, CHANNELS);
    let plane = (w * h) as usize;
    for px in 0..plane {
        let src = &buf[px * samples..];
        for c in 0..CHANNELS as usize {
            let sample = src[c.min(color_samples - 1)];
            im.data[c * plane + px] = sample as f32 / 255.0;
        }
    }
    Ok(im)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_png;

    #[test]
    fn rgb_png_decodes_to_planar_unit_floats() {
        let dir = tempfile::tempdir().unwrap();
        // 2x1: red pixel then blue pixel.
        let path = write_png(dir.path(), "rb.png", 2, 1, &[255, 0, 0, 0, 0, 255]);

        let im = load_image(&path).unwrap();
        assert_eq!((im.width, im.height, im.channels), (2, 1, 3));
        // Red plane.
        assert_eq!(im.at(0, 0, 0), 1.0);
        assert_eq!(im.at(0, 0, 1), 0.0);
        // Blue plane.
        assert_eq!(im.at(2, 0, 0), 0.0);
        assert_eq!(im.at(2, 0, 1), 1.0);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_image(Path::new("/nonexistent/frame.png")).is_err());
    }
}
