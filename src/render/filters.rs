//! Image filter pipeline.
//!
//! Filters run strictly in spec order. Crop variants all reduce to one
//! region copy that zero-pads outside the source, so negative trims extend
//! the canvas with transparent pixels instead of shrinking it.

use image::RgbaImage;
use image::imageops;

use crate::foundation::error::{CardforgeError, CardforgeResult};
use crate::spec::model::{Filter, FilterChain, FlipAxis};

/// Apply every filter of the chain, in order.
pub fn apply_chain(img: RgbaImage, chain: &FilterChain) -> CardforgeResult<RgbaImage> {
    let mut out = img;
    for filter in &chain.0 {
        out = apply(&out, *filter)?;
    }
    Ok(out)
}

fn apply(img: &RgbaImage, filter: Filter) -> CardforgeResult<RgbaImage> {
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    match filter {
        Filter::Crop { x1, y1, x2, y2 } => region_copy(img, x1, y1, x2 - x1, y2 - y1),
        Filter::CropTop(v) => region_copy(img, 0, v, w, h - v),
        Filter::CropBottom(v) => region_copy(img, 0, 0, w, h - v),
        Filter::CropLeft(v) => region_copy(img, v, 0, w - v, h),
        Filter::CropRight(v) => region_copy(img, 0, 0, w - v, h),
        Filter::CropBox { x, y, w, h } => region_copy(img, x, y, w, h),
        Filter::Resize { width, height } => resize(img, width, height),
        Filter::Rotate(angle) => Ok(rotate(img, angle)),
        Filter::Flip(axis) => Ok(match axis {
            FlipAxis::Horizontal => imageops::flip_horizontal(img),
            FlipAxis::Vertical => imageops::flip_vertical(img),
        }),
        Filter::Opacity(factor) => Ok(scale_alpha(img, factor)),
    }
}

/// Copy the `w x h` region at `(x, y)` into a fresh image, transparent
/// wherever the region leaves the source.
fn region_copy(img: &RgbaImage, x: i64, y: i64, w: i64, h: i64) -> CardforgeResult<RgbaImage> {
    if w < 0 || h < 0 {
        return Err(CardforgeError::render(format!(
            "crop region has negative size {w}x{h}"
        )));
    }
    let (out_w, out_h) = (w as u32, h as u32);
    let mut out = RgbaImage::new(out_w, out_h);

    let src_x0 = x.max(0);
    let src_y0 = y.max(0);
    let src_x1 = (x + w).min(i64::from(img.width()));
    let src_y1 = (y + h).min(i64::from(img.height()));
    for sy in src_y0..src_y1 {
        for sx in src_x0..src_x1 {
            let px = *img.get_pixel(sx as u32, sy as u32);
            out.put_pixel((sx - x) as u32, (sy - y) as u32, px);
        }
    }
    Ok(out)
}

/// Resize, computing a missing dimension from the aspect ratio.
///
/// Aspect math truncates toward zero, matching integer conversion of the
/// exact ratio.
fn resize(img: &RgbaImage, width: Option<u32>, height: Option<u32>) -> CardforgeResult<RgbaImage> {
    let (new_w, new_h) = match (width, height) {
        (None, None) => return Ok(img.clone()),
        (Some(w), Some(h)) => (w, h),
        (w, h) => {
            if img.width() == 0 || img.height() == 0 {
                return Err(CardforgeError::render("cannot resize an empty image"));
            }
            let aspect = f64::from(img.width()) / f64::from(img.height());
            match (w, h) {
                (Some(w), None) => (w, (f64::from(w) / aspect) as u32),
                (None, Some(h)) => ((f64::from(h) * aspect) as u32, h),
                _ => unreachable!("both-present and both-absent handled above"),
            }
        }
    };
    if new_w == 0 || new_h == 0 {
        return Err(CardforgeError::render(format!(
            "resize target {new_w}x{new_h} is empty"
        )));
    }
    Ok(imageops::resize(img, new_w, new_h, imageops::FilterType::CatmullRom))
}

/// Counter-clockwise rotation, expanding the canvas to fit.
///
/// Quarter turns take exact transpose paths; other angles go through an
/// inverse affine map with nearest sampling and transparent fill.
fn rotate(img: &RgbaImage, angle: f64) -> RgbaImage {
    let angle = angle.rem_euclid(360.0);
    if angle == 0.0 {
        img.clone()
    } else if angle == 90.0 {
        imageops::rotate270(img)
    } else if angle == 180.0 {
        imageops::rotate180(img)
    } else if angle == 270.0 {
        imageops::rotate90(img)
    } else {
        rotate_expand(img, angle)
    }
}

fn rotate_expand(img: &RgbaImage, angle: f64) -> RgbaImage {
    let (w, h) = (f64::from(img.width()), f64::from(img.height()));
    let (cx, cy) = (w / 2.0, h / 2.0);

    // Inverse map: output coordinates back into the source image.
    let rad = -angle.to_radians();
    let (sin, cos) = rad.sin_cos();
    let (a, b, d, e) = (cos, sin, -sin, cos);
    let c = a * (-cx) + b * (-cy) + cx;
    let f = d * (-cx) + e * (-cy) + cy;

    let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (x, y) in corners {
        let tx = a * x + b * y + c;
        let ty = d * x + e * y + f;
        min_x = min_x.min(tx);
        max_x = max_x.max(tx);
        min_y = min_y.min(ty);
        max_y = max_y.max(ty);
    }
    let new_w = (max_x.ceil() - min_x.floor()).max(0.0) as u32;
    let new_h = (max_y.ceil() - min_y.floor()).max(0.0) as u32;

    // Re-center the source inside the expanded canvas.
    let ox = -(f64::from(new_w) - w) / 2.0;
    let oy = -(f64::from(new_h) - h) / 2.0;
    let c2 = a * ox + b * oy + c;
    let f2 = d * ox + e * oy + f;

    let mut out = RgbaImage::new(new_w, new_h);
    for y in 0..new_h {
        for x in 0..new_w {
            let xs = a * (f64::from(x) + 0.5) + b * (f64::from(y) + 0.5) + c2;
            let ys = d * (f64::from(x) + 0.5) + e * (f64::from(y) + 0.5) + f2;
            let sx = xs.floor();
            let sy = ys.floor();
            if sx >= 0.0 && sy >= 0.0 && sx < w && sy < h {
                out.put_pixel(x, y, *img.get_pixel(sx as u32, sy as u32));
            }
        }
    }
    out
}

fn scale_alpha(img: &RgbaImage, factor: f64) -> RgbaImage {
    let factor = factor.clamp(0.0, 1.0);
    let mut out = img.clone();
    for px in out.pixels_mut() {
        px.0[3] = (f64::from(px.0[3]) * factor).round() as u8;
    }
    out
}
