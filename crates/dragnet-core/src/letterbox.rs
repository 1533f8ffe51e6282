// crates/dragnet-core/src/letterbox.rs
//
// Letterbox fit: resize preserving aspect ratio, pad the rest with neutral
// gray. Shared by the disk loader and by anything that needs to know where
// a frame landed inside the detector input.

use crate::image::Image;

/// Largest `(w, h)` that fits inside `(target_w, target_h)` while keeping
/// the source aspect ratio. At least one axis matches the target exactly.
///
/// ```
/// use dragnet_core::letterbox::fit;
/// assert_eq!(fit(1920, 1080, 416, 416), (416, 234));
/// assert_eq!(fit(1080, 1920, 416, 416), (234, 416));
/// ```
pub fn fit(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    if target_w * src_h < target_h * src_w {
        (target_w, (src_h * target_w / src_w).max(1))
    } else {
        ((src_w * target_h / src_h).max(1), target_h)
    }
}

/// Letterbox `src` into a `target_w` x `target_h` canvas: bilinear resize to
/// the `fit` dimensions, centered, padding filled with 0.5.
pub fn letterbox(src: &Image, target_h: u32, target_w: u32) -> Image {
    let (new_w, new_h) = fit(src.width, src.height, target_w, target_h);
    let resized = resize_bilinear(src, new_w, new_h);

    let mut out = Image::new(target_w, target_h, src.channels);
    out.data.fill(0.5);

    let dx = (target_w - new_w) / 2;
    let dy = (target_h - new_h) / 2;
    for c in 0..src.channels {
        for y in 0..new_h {
            for x in 0..new_w {
                out.set(c, y + dy, x + dx, resized.at(c, y, x));
            }
        }
    }
    out
}

/// Plain bilinear resample of a planar image.
fn resize_bilinear(src: &Image, new_w: u32, new_h: u32) -> Image {
    let mut out = Image::new(new_w, new_h, src.channels);

    // Scale factors map output pixel centers back into source coordinates.
    let sx = if new_w > 1 { (src.width - 1) as f32 / (new_w - 1) as f32 } else { 0.0 };
    let sy = if new_h > 1 { (src.height - 1) as f32 / (new_h - 1) as f32 } else { 0.0 };

    for c in 0..src.channels {
        for y in 0..new_h {
            let fy = y as f32 * sy;
            let y0 = fy.floor() as u32;
            let y1 = (y0 + 1).min(src.height - 1);
            let wy = fy - y0 as f32;
            for x in 0..new_w {
                let fx = x as f32 * sx;
                let x0 = fx.floor() as u32;
                let x1 = (x0 + 1).min(src.width - 1);
                let wx = fx - x0 as f32;

                let top = src.at(c, y0, x0) * (1.0 - wx) + src.at(c, y0, x1) * wx;
                let bot = src.at(c, y1, x0) * (1.0 - wx) + src.at(c, y1, x1) * wx;
                out.set(c, y, x, top * (1.0 - wy) + bot * wy);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_aspect_and_touches_target() {
        // Wide source: width pinned, height scaled down.
        assert_eq!(fit(200, 100, 50, 50), (50, 25));
        // Tall source: height pinned.
        assert_eq!(fit(100, 200, 50, 50), (25, 50));
        // Exact match passes through.
        assert_eq!(fit(50, 50, 50, 50), (50, 50));
    }

    #[test]
    fn letterbox_pads_with_gray() {
        let mut src = Image::new(4, 2, 3);
        src.data.fill(1.0);
        let out = letterbox(&src, 4, 4);

        assert_eq!((out.width, out.height), (4, 4));
        // 4x2 into 4x4: content occupies rows 1..3, gray bands above/below.
        assert_eq!(out.at(0, 0, 0), 0.5);
        assert_eq!(out.at(0, 3, 3), 0.5);
        assert_eq!(out.at(0, 1, 0), 1.0);
        assert_eq!(out.at(2, 2, 3), 1.0);
    }

    #[test]
    fn uniform_source_stays_uniform_through_resize() {
        let mut src = Image::new(7, 5, 3);
        src.data.fill(0.25);
        let out = resize_bilinear(&src, 3, 9);
        assert!(out.data.iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn single_pixel_source_does_not_divide_by_zero() {
        let mut src = Image::new(1, 1, 3);
        src.data.fill(0.75);
        // A square 1x1 source scales to fill the whole canvas.
        let out = letterbox(&src, 4, 4);
        assert!(out.data.iter().all(|&v| (v - 0.75).abs() < 1e-6));
    }
}
