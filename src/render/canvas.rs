//! Straight-alpha RGBA canvas operations.
//!
//! The card canvas is a straight-alpha `RgbaImage`. Layers produced by the
//! vector rasterizer arrive premultiplied and are bridged back to straight
//! alpha before compositing. All blend math is 8-bit fixed point.

use image::RgbaImage;

use crate::foundation::error::{CardforgeError, CardforgeResult};
use crate::spec::model::Color;

/// Straight (non-premultiplied) RGBA pixel.
pub type StraightRgba8 = [u8; 4];

/// New canvas of the given size filled with one color.
pub fn new_canvas(width: u32, height: u32, background: Color) -> RgbaImage {
    RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([background.r, background.g, background.b, background.a]),
    )
}

/// Straight-alpha source-over blend of one pixel.
pub fn over(dst: StraightRgba8, src: StraightRgba8) -> StraightRgba8 {
    let sa = u32::from(src[3]);
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = u32::from(dst[3]);

    // out_a scaled by 255 to keep the channel division exact.
    let blend = da * (255 - sa);
    let out_a_255 = sa * 255 + blend;
    if out_a_255 == 0 {
        return [0, 0, 0, 0];
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let num = u32::from(src[i]) * sa * 255 + u32::from(dst[i]) * blend;
        out[i] = ((num + out_a_255 / 2) / out_a_255) as u8;
    }
    out[3] = ((out_a_255 + 127) / 255) as u8;
    out
}

/// Composite a full-canvas layer over the canvas in place.
pub fn composite_layer_in_place(dst: &mut [u8], layer: &[u8]) -> CardforgeResult<()> {
    if dst.len() != layer.len() || !dst.len().is_multiple_of(4) {
        return Err(CardforgeError::render(
            "composite_layer_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(layer.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Paste `src` onto `canvas` at `(x, y)`, clipping regions outside the canvas.
///
/// With `masked`, the source alpha channel acts as a per-pixel lerp mask over
/// all four destination channels. Without it, source pixels replace
/// destination pixels outright.
pub fn paste(canvas: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64, masked: bool) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let (sw, sh) = (i64::from(src.width()), i64::from(src.height()));

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + sw).min(cw);
    let y1 = (y + sh).min(ch);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for cy in y0..y1 {
        for cx in x0..x1 {
            let sp = src.get_pixel((cx - x) as u32, (cy - y) as u32).0;
            if masked {
                let dp = canvas.get_pixel(cx as u32, cy as u32).0;
                canvas.put_pixel(cx as u32, cy as u32, image::Rgba(lerp_by_mask(dp, sp, sp[3])));
            } else {
                canvas.put_pixel(cx as u32, cy as u32, image::Rgba(sp));
            }
        }
    }
}

/// Lerp every destination channel toward the source by `mask`, alpha included.
fn lerp_by_mask(dst: StraightRgba8, src: StraightRgba8, mask: u8) -> StraightRgba8 {
    let m = u16::from(mask);
    let inv = 255 - m;
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = ((u16::from(src[i]) * m + u16::from(dst[i]) * inv + 127) / 255) as u8;
    }
    out
}

/// Convert a premultiplied RGBA8 buffer to a straight-alpha image.
pub fn premul_to_straight(premul: &[u8], width: u32, height: u32) -> CardforgeResult<RgbaImage> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| CardforgeError::render("layer size overflow"))?;
    if premul.len() != expected {
        return Err(CardforgeError::render(
            "premul_to_straight expects a width*height*4 buffer",
        ));
    }

    let mut out = vec![0u8; premul.len()];
    for (d, s) in out.chunks_exact_mut(4).zip(premul.chunks_exact(4)) {
        let a = u32::from(s[3]);
        if a == 0 {
            continue;
        }
        for i in 0..3 {
            d[i] = ((u32::from(s[i]) * 255 + a / 2) / a).min(255) as u8;
        }
        d[3] = s[3];
    }
    RgbaImage::from_raw(width, height, out)
        .ok_or_else(|| CardforgeError::render("layer buffer did not match dimensions"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_opaque_src_replaces_dst() {
        assert_eq!(over([0, 0, 0, 255], [200, 10, 30, 255]), [200, 10, 30, 255]);
    }

    #[test]
    fn over_transparent_src_is_noop() {
        assert_eq!(over([7, 8, 9, 40], [255, 255, 255, 0]), [7, 8, 9, 40]);
    }

    #[test]
    fn over_onto_transparent_keeps_src() {
        assert_eq!(over([0, 0, 0, 0], [100, 110, 120, 200]), [100, 110, 120, 200]);
    }

    #[test]
    fn over_half_alpha_blends_channels() {
        let out = over([0, 0, 0, 255], [255, 255, 255, 128]);
        assert_eq!(out[3], 255);
        assert!(out[0] > 120 && out[0] < 135);
    }

    #[test]
    fn composite_layer_validates_lengths() {
        let mut dst = vec![0u8; 8];
        assert!(composite_layer_in_place(&mut dst, &[0u8; 4]).is_err());
        let mut odd = vec![0u8; 6];
        assert!(composite_layer_in_place(&mut odd, &[0u8; 6]).is_err());
        assert!(composite_layer_in_place(&mut dst, &[0u8; 8]).is_ok());
    }

    #[test]
    fn paste_clips_negative_positions() {
        let mut canvas = new_canvas(4, 4, Color::rgba(0, 0, 0, 255));
        let src = RgbaImage::from_pixel(3, 3, image::Rgba([255, 0, 0, 255]));
        paste(&mut canvas, &src, -2, -2, false);
        // Only the 1x1 overlap lands.
        assert_eq!(canvas.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(1, 0).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(0, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn paste_off_canvas_is_noop() {
        let mut canvas = new_canvas(4, 4, Color::rgba(9, 9, 9, 255));
        let src = RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255]));
        paste(&mut canvas, &src, 10, 10, true);
        assert!(canvas.pixels().all(|p| p.0 == [9, 9, 9, 255]));
    }

    #[test]
    fn masked_paste_lerps_alpha_channel_too() {
        let mut canvas = new_canvas(1, 1, Color::rgba(0, 0, 0, 255));
        let src = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 0]));
        paste(&mut canvas, &src, 0, 0, true);
        // Mask 0 leaves the destination untouched.
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 0, 255]);

        let src = RgbaImage::from_pixel(1, 1, image::Rgba([200, 100, 50, 255]));
        paste(&mut canvas, &src, 0, 0, true);
        assert_eq!(canvas.get_pixel(0, 0).0, [200, 100, 50, 255]);
    }

    #[test]
    fn unmasked_paste_overwrites_pixels() {
        let mut canvas = new_canvas(1, 1, Color::rgba(0, 0, 0, 255));
        let src = RgbaImage::from_pixel(1, 1, image::Rgba([10, 20, 30, 0]));
        paste(&mut canvas, &src, 0, 0, false);
        assert_eq!(canvas.get_pixel(0, 0).0, [10, 20, 30, 0]);
    }

    #[test]
    fn premul_round_trips_to_straight() {
        // Premultiplied half-alpha mid gray.
        let premul = [64u8, 64, 64, 128];
        let img = premul_to_straight(&premul, 1, 1).unwrap();
        let px = img.get_pixel(0, 0).0;
        assert_eq!(px[3], 128);
        assert!((px[0] as i32 - 127).abs() <= 1);

        let zero = [0u8, 0, 0, 0];
        let img = premul_to_straight(&zero, 1, 1).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);

        assert!(premul_to_straight(&premul, 2, 1).is_err());
    }
}
