//! Shared vector rasterization surface.
//!
//! Shape and text renderers draw each element onto its own transparent
//! layer through a [`vello_cpu::RenderContext`], and the resulting
//! premultiplied pixmap is bridged back to a straight-alpha image for
//! canvas compositing.

use image::RgbaImage;

use crate::foundation::error::{CardforgeError, CardforgeResult};
use crate::render::canvas;
use crate::spec::model::Color;

/// CPU rasterization surface.
///
/// The backing pixmap is cleared and reused between layers of the same
/// size, which is the common case for one card.
#[derive(Default)]
pub struct RasterSurface {
    pixmap: Option<vello_cpu::Pixmap>,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterize `draw` onto a transparent `width x height` layer.
    pub fn render_layer(
        &mut self,
        width: u32,
        height: u32,
        draw: impl FnOnce(&mut vello_cpu::RenderContext) -> CardforgeResult<()>,
    ) -> CardforgeResult<RgbaImage> {
        let (w16, h16) = checked_dims(width, height)?;
        let mut ctx = vello_cpu::RenderContext::new(w16, h16);
        draw(&mut ctx)?;
        ctx.flush();

        // render_to_pixmap composites over existing content, so the
        // reused pixmap must come back zeroed.
        let mut pixmap = match self.pixmap.take() {
            Some(mut p) if p.width() == w16 && p.height() == h16 => {
                p.data_as_u8_slice_mut().fill(0);
                p
            }
            _ => vello_cpu::Pixmap::new(w16, h16),
        };
        ctx.render_to_pixmap(&mut pixmap);
        let result = canvas::premul_to_straight(pixmap.data_as_u8_slice(), width, height);
        self.pixmap = Some(pixmap);
        result
    }
}

/// Validate raster dimensions against the u16 pixmap limit.
pub fn checked_dims(width: u32, height: u32) -> CardforgeResult<(u16, u16)> {
    if width == 0 || height == 0 {
        return Err(CardforgeError::validation(
            "canvas dimensions must be positive",
        ));
    }
    let w = width
        .try_into()
        .map_err(|_| CardforgeError::validation(format!("canvas width {width} exceeds u16")))?;
    let h = height
        .try_into()
        .map_err(|_| CardforgeError::validation(format!("canvas height {height} exceeds u16")))?;
    Ok((w, h))
}

/// Solid paint from a spec color.
pub fn paint_color(color: Color) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

/// Convert a kurbo path into the rasterizer's path type.
pub fn to_cpu_path(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dims_reject_zero_and_oversize() {
        assert!(checked_dims(0, 10).is_err());
        assert!(checked_dims(10, 0).is_err());
        assert!(checked_dims(70_000, 10).is_err());
        assert_eq!(checked_dims(250, 350).unwrap(), (250, 350));
    }

    #[test]
    fn empty_layer_is_fully_transparent() {
        let mut surface = RasterSurface::new();
        let layer = surface.render_layer(8, 8, |_| Ok(())).unwrap();
        assert!(layer.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn filled_rect_lands_in_layer() {
        let mut surface = RasterSurface::new();
        let layer = surface
            .render_layer(8, 8, |ctx| {
                ctx.set_paint(paint_color(Color::rgba(255, 0, 0, 255)));
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, 8.0, 4.0));
                Ok(())
            })
            .unwrap();
        assert_eq!(layer.get_pixel(4, 2).0, [255, 0, 0, 255]);
        assert_eq!(layer.get_pixel(4, 6).0, [0, 0, 0, 0]);
    }

    #[test]
    fn surface_reuse_survives_size_changes() {
        let mut surface = RasterSurface::new();
        surface.render_layer(8, 8, |_| Ok(())).unwrap();
        let layer = surface
            .render_layer(4, 6, |ctx| {
                ctx.set_paint(paint_color(Color::rgba(0, 255, 0, 255)));
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, 4.0, 6.0));
                Ok(())
            })
            .unwrap();
        assert_eq!(layer.dimensions(), (4, 6));
        assert_eq!(layer.get_pixel(2, 3).0, [0, 255, 0, 255]);
    }

    #[test]
    fn cpu_path_conversion_keeps_every_element() {
        let mut path = kurbo::BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((4.0, 0.0));
        path.quad_to((4.0, 4.0), (0.0, 4.0));
        path.curve_to((0.0, 2.0), (1.0, 1.0), (0.0, 0.0));
        path.close_path();
        let cpu = to_cpu_path(&path);
        assert_eq!(cpu.elements().len(), path.elements().len());
    }
}
