//! Shape element rendering.
//!
//! Every shape follows the same sequence: measure the intrinsic size,
//! resolve the origin, rasterize fill and outline onto a transparent layer,
//! then alpha-composite the layer onto the card. Closed curves and
//! rectangles draw their outline as an even-odd ring hugging the inside of
//! the boundary; polygon edges are stroked centered on the boundary.

use image::RgbaImage;
use kurbo::Shape;

use crate::foundation::error::{CardforgeError, CardforgeResult};
use crate::foundation::geometry::{BoundingBox, BoundsRegistry};
use crate::render::canvas;
use crate::render::position;
use crate::render::surface::{self, RasterSurface};
use crate::spec::model::{
    CircleElement, Color, EllipseElement, Placement, PolygonElement, RectangleElement,
    RegularPolygonElement, ShapeStyle, Vec2i,
};

/// Flattening tolerance for curved boundaries.
const PATH_TOLERANCE: f64 = 0.1;

/// Boundary geometry of one shape at its resolved origin.
struct ShapeGeometry {
    fill: kurbo::BezPath,
    outline: Outline,
}

enum Outline {
    /// Ring between the boundary and an inset copy; `None` means the inset
    /// swallowed the whole shape, which paints it entirely in outline color.
    Inset(Option<kurbo::BezPath>),
    /// Stroke centered on the boundary path.
    Centered,
}

pub fn draw_circle(
    surface: &mut RasterSurface,
    canvas: &mut RgbaImage,
    registry: &mut BoundsRegistry,
    element: &CircleElement,
) -> CardforgeResult<()> {
    if element.radius < 0 {
        return Err(CardforgeError::validation(
            "circle radius must not be negative",
        ));
    }
    let size = (element.radius * 2, element.radius * 2);
    composite_shape(
        surface,
        canvas,
        registry,
        &element.placement,
        &element.style,
        size,
        |x, y| {
            let r = element.radius as f64;
            let center = kurbo::Point::new(x + r, y + r);
            let inset = r - element.style.outline_width as f64;
            let inner =
                (inset > 0.0).then(|| kurbo::Circle::new(center, inset).to_path(PATH_TOLERANCE));
            Ok(ShapeGeometry {
                fill: kurbo::Circle::new(center, r).to_path(PATH_TOLERANCE),
                outline: Outline::Inset(inner),
            })
        },
    )
}

pub fn draw_ellipse(
    surface: &mut RasterSurface,
    canvas: &mut RgbaImage,
    registry: &mut BoundsRegistry,
    element: &EllipseElement,
) -> CardforgeResult<()> {
    let (w, h) = (element.size.x(), element.size.y());
    if w < 0 || h < 0 {
        return Err(CardforgeError::validation(
            "ellipse size must not be negative",
        ));
    }
    composite_shape(
        surface,
        canvas,
        registry,
        &element.placement,
        &element.style,
        (w, h),
        |x, y| {
            let rect = kurbo::Rect::new(x, y, x + w as f64, y + h as f64);
            let ow = element.style.outline_width as f64;
            let inner_rect = kurbo::Rect::new(x + ow, y + ow, x + w as f64 - ow, y + h as f64 - ow);
            let inner = (inner_rect.width() > 0.0 && inner_rect.height() > 0.0)
                .then(|| kurbo::Ellipse::from_rect(inner_rect).to_path(PATH_TOLERANCE));
            Ok(ShapeGeometry {
                fill: kurbo::Ellipse::from_rect(rect).to_path(PATH_TOLERANCE),
                outline: Outline::Inset(inner),
            })
        },
    )
}

pub fn draw_polygon(
    surface: &mut RasterSurface,
    canvas: &mut RgbaImage,
    registry: &mut BoundsRegistry,
    element: &PolygonElement,
) -> CardforgeResult<()> {
    let Some(bounds) = point_bounds(&element.points) else {
        return Ok(());
    };
    composite_shape(
        surface,
        canvas,
        registry,
        &element.placement,
        &element.style,
        (bounds.width(), bounds.height()),
        |x, y| {
            // Shift the point list so its own bounding-box minimum lands on
            // the resolved origin.
            let dx = x - bounds.x1 as f64;
            let dy = y - bounds.y1 as f64;
            let points = element
                .points
                .iter()
                .map(|p| (p.x() as f64 + dx, p.y() as f64 + dy));
            Ok(ShapeGeometry {
                fill: path_from_points(points),
                outline: Outline::Centered,
            })
        },
    )
}

pub fn draw_regular_polygon(
    surface: &mut RasterSurface,
    canvas: &mut RgbaImage,
    registry: &mut BoundsRegistry,
    element: &RegularPolygonElement,
) -> CardforgeResult<()> {
    if element.radius < 0 {
        return Err(CardforgeError::validation(
            "regular polygon radius must not be negative",
        ));
    }
    if element.sides < 3 {
        return Err(CardforgeError::validation(
            "regular polygon needs at least 3 sides",
        ));
    }
    let size = (element.radius * 2, element.radius * 2);
    composite_shape(
        surface,
        canvas,
        registry,
        &element.placement,
        &element.style,
        size,
        |x, y| {
            let r = element.radius as f64;
            let (cx, cy) = (x + r, y + r);
            let step = 360.0 / f64::from(element.sides);
            // Start from the bottom-left vertex so a zero rotation rests the
            // polygon on a flat bottom edge; rotation turns counter-clockwise.
            let start = 270.0 - step / 2.0 + element.rotation;
            let points = (0..element.sides).map(|i| {
                let theta = (start + step * f64::from(i)).to_radians();
                (cx + r * theta.cos(), cy - r * theta.sin())
            });
            Ok(ShapeGeometry {
                fill: path_from_points(points),
                outline: Outline::Centered,
            })
        },
    )
}

pub fn draw_rectangle(
    surface: &mut RasterSurface,
    canvas: &mut RgbaImage,
    registry: &mut BoundsRegistry,
    element: &RectangleElement,
) -> CardforgeResult<()> {
    let (w, h) = (element.size.x(), element.size.y());
    if w < 0 || h < 0 {
        return Err(CardforgeError::validation(
            "rectangle size must not be negative",
        ));
    }
    composite_shape(
        surface,
        canvas,
        registry,
        &element.placement,
        &element.style,
        (w, h),
        |x, y| {
            let on = element.corners.unwrap_or([true; 4]);
            let radius = element.corner_radius.max(0) as f64;
            let radii = |r: f64| {
                kurbo::RoundedRectRadii::new(
                    if on[0] { r } else { 0.0 },
                    if on[1] { r } else { 0.0 },
                    if on[2] { r } else { 0.0 },
                    if on[3] { r } else { 0.0 },
                )
            };
            let rect = kurbo::Rect::new(x, y, x + w as f64, y + h as f64);
            let fill = kurbo::RoundedRect::from_rect(rect, radii(radius)).to_path(PATH_TOLERANCE);
            let ow = element.style.outline_width as f64;
            let inner_rect = kurbo::Rect::new(x + ow, y + ow, x + w as f64 - ow, y + h as f64 - ow);
            let inner = (inner_rect.width() > 0.0 && inner_rect.height() > 0.0).then(|| {
                kurbo::RoundedRect::from_rect(inner_rect, radii((radius - ow).max(0.0)))
                    .to_path(PATH_TOLERANCE)
            });
            Ok(ShapeGeometry {
                fill,
                outline: Outline::Inset(inner),
            })
        },
    )
}

/// Shared tail of every shape: position, rasterize, composite, register.
fn composite_shape(
    surface: &mut RasterSurface,
    canvas: &mut RgbaImage,
    registry: &mut BoundsRegistry,
    placement: &Placement,
    style: &ShapeStyle,
    size: (i64, i64),
    geometry: impl FnOnce(f64, f64) -> CardforgeResult<ShapeGeometry>,
) -> CardforgeResult<()> {
    let (x, y) = position::resolve(placement, size, registry)?;
    let shape = geometry(x as f64, y as f64)?;

    let fill = style.color.map(|c| (surface::to_cpu_path(&shape.fill), c));
    let outline = match style.outline_color {
        Some(color) if style.outline_width > 0 => Some(match shape.outline {
            Outline::Inset(Some(inner)) => {
                let mut ring = shape.fill.clone();
                for el in inner.elements() {
                    ring.push(*el);
                }
                OutlineDraw::Ring(surface::to_cpu_path(&ring), color)
            }
            Outline::Inset(None) => OutlineDraw::Fill(surface::to_cpu_path(&shape.fill), color),
            Outline::Centered => OutlineDraw::Stroke(
                surface::to_cpu_path(&shape.fill),
                color,
                style.outline_width as f64,
            ),
        }),
        _ => None,
    };

    let (canvas_w, canvas_h) = canvas.dimensions();
    let layer = surface.render_layer(canvas_w, canvas_h, move |ctx| {
        if let Some((path, color)) = fill {
            ctx.set_fill_rule(vello_cpu::peniko::Fill::NonZero);
            ctx.set_paint(surface::paint_color(color));
            ctx.fill_path(&path);
        }
        match outline {
            Some(OutlineDraw::Ring(path, color)) => {
                ctx.set_fill_rule(vello_cpu::peniko::Fill::EvenOdd);
                ctx.set_paint(surface::paint_color(color));
                ctx.fill_path(&path);
            }
            Some(OutlineDraw::Fill(path, color)) => {
                ctx.set_fill_rule(vello_cpu::peniko::Fill::NonZero);
                ctx.set_paint(surface::paint_color(color));
                ctx.fill_path(&path);
            }
            Some(OutlineDraw::Stroke(path, color, width)) => {
                ctx.set_paint(surface::paint_color(color));
                ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
                ctx.stroke_path(&path);
            }
            None => {}
        }
        Ok(())
    })?;
    canvas::composite_layer_in_place(canvas, &layer)?;

    if let Some(id) = &placement.id {
        registry.insert(id.clone(), BoundingBox::new(x, y, x + size.0, y + size.1));
    }
    Ok(())
}

enum OutlineDraw {
    Ring(vello_cpu::kurbo::BezPath, Color),
    Fill(vello_cpu::kurbo::BezPath, Color),
    Stroke(vello_cpu::kurbo::BezPath, Color, f64),
}

fn path_from_points(points: impl IntoIterator<Item = (f64, f64)>) -> kurbo::BezPath {
    let mut path = kurbo::BezPath::new();
    let mut iter = points.into_iter();
    if let Some(first) = iter.next() {
        path.move_to(first);
        for p in iter {
            path.line_to(p);
        }
        path.close_path();
    }
    path
}

fn point_bounds(points: &[Vec2i]) -> Option<BoundingBox> {
    let first = points.first()?;
    let mut bounds = BoundingBox::new(first.x(), first.y(), first.x(), first.y());
    for p in &points[1..] {
        bounds.x1 = bounds.x1.min(p.x());
        bounds.y1 = bounds.y1.min(p.y());
        bounds.x2 = bounds.x2.max(p.x());
        bounds.y2 = bounds.y2.max(p.y());
    }
    Some(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::model::ElementSpec;
    use serde_json::json;

    fn blank_canvas(w: u32, h: u32) -> RgbaImage {
        canvas::new_canvas(w, h, Color::rgba(0, 0, 0, 0))
    }

    fn draw(value: serde_json::Value, canvas_img: &mut RgbaImage) -> BoundsRegistry {
        let mut surface = RasterSurface::new();
        let mut registry = BoundsRegistry::new();
        let result = match ElementSpec::from_value(&value).unwrap() {
            ElementSpec::Circle(el) => {
                draw_circle(&mut surface, canvas_img, &mut registry, &el)
            }
            ElementSpec::Ellipse(el) => {
                draw_ellipse(&mut surface, canvas_img, &mut registry, &el)
            }
            ElementSpec::Polygon(el) => {
                draw_polygon(&mut surface, canvas_img, &mut registry, &el)
            }
            ElementSpec::RegularPolygon(el) => {
                draw_regular_polygon(&mut surface, canvas_img, &mut registry, &el)
            }
            ElementSpec::Rectangle(el) => {
                draw_rectangle(&mut surface, canvas_img, &mut registry, &el)
            }
            other => panic!("not a shape: {}", other.kind()),
        };
        result.unwrap();
        registry
    }

    #[test]
    fn circle_fills_its_disc_and_registers_bounds() {
        let mut img = blank_canvas(20, 20);
        let registry = draw(
            json!({"type": "circle", "id": "dot", "radius": 5, "color": [255, 0, 0]}),
            &mut img,
        );
        assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(registry.get("dot"), Some(BoundingBox::new(0, 0, 10, 10)));
    }

    #[test]
    fn outline_ring_leaves_the_interior_clear() {
        let mut img = blank_canvas(16, 16);
        draw(
            json!({
                "type": "circle",
                "radius": 8,
                "outline_color": [0, 0, 255],
                "outline_width": 2,
            }),
            &mut img,
        );
        assert_eq!(img.get_pixel(8, 8).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(14, 8).0, [0, 0, 255, 255]);
    }

    #[test]
    fn wide_outline_swallows_the_shape() {
        let mut img = blank_canvas(10, 10);
        draw(
            json!({
                "type": "circle",
                "radius": 4,
                "outline_color": [0, 255, 0],
                "outline_width": 10,
            }),
            &mut img,
        );
        assert_eq!(img.get_pixel(4, 4).0, [0, 255, 0, 255]);
    }

    #[test]
    fn ellipse_fills_inside_its_box_only() {
        let mut img = blank_canvas(16, 8);
        let registry = draw(
            json!({"type": "ellipse", "id": "e", "size": [12, 6], "color": [9, 9, 9]}),
            &mut img,
        );
        assert_eq!(img.get_pixel(6, 3).0, [9, 9, 9, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(registry.get("e"), Some(BoundingBox::new(0, 0, 12, 6)));
    }

    #[test]
    fn polygon_without_points_draws_nothing() {
        let mut img = blank_canvas(8, 8);
        let registry = draw(
            json!({"type": "polygon", "id": "p", "points": [], "color": [1, 2, 3]}),
            &mut img,
        );
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
        assert_eq!(registry.get("p"), None);
    }

    #[test]
    fn polygon_points_shift_to_resolved_origin() {
        let mut img = blank_canvas(20, 20);
        let registry = draw(
            json!({
                "type": "polygon",
                "id": "tri",
                "points": [[100, 100], [110, 100], [105, 110]],
                "position": [2, 3],
                "color": [200, 0, 0],
            }),
            &mut img,
        );
        assert_eq!(registry.get("tri"), Some(BoundingBox::new(2, 3, 12, 13)));
        assert_eq!(img.get_pixel(7, 5).0, [200, 0, 0, 255]);
        assert_eq!(img.get_pixel(19, 19).0, [0, 0, 0, 0]);
    }

    #[test]
    fn unrotated_square_sits_axis_aligned() {
        // A 4-sided regular polygon resting on its flat bottom is an
        // axis-aligned square inset by r*(1 - cos 45) on every side.
        let mut img = blank_canvas(10, 10);
        let registry = draw(
            json!({
                "type": "regular-polygon",
                "id": "sq",
                "radius": 5,
                "sides": 4,
                "color": [0, 0, 0, 255],
            }),
            &mut img,
        );
        assert_eq!(img.get_pixel(5, 5).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 5).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(5, 0).0, [0, 0, 0, 0]);
        assert_eq!(registry.get("sq"), Some(BoundingBox::new(0, 0, 10, 10)));
    }

    #[test]
    fn too_few_sides_fail_validation() {
        let mut surface = RasterSurface::new();
        let mut img = blank_canvas(8, 8);
        let mut registry = BoundsRegistry::new();
        let el = match ElementSpec::from_value(
            &json!({"type": "regular-polygon", "radius": 4, "sides": 2}),
        )
        .unwrap()
        {
            ElementSpec::RegularPolygon(el) => el,
            _ => unreachable!(),
        };
        let err = draw_regular_polygon(&mut surface, &mut img, &mut registry, &el).unwrap_err();
        assert!(err.to_string().contains("at least 3 sides"));
    }

    #[test]
    fn rectangle_rounds_only_selected_corners() {
        let mut img = blank_canvas(10, 10);
        draw(
            json!({
                "type": "rectangle",
                "size": [10, 10],
                "corner_radius": 4,
                "corners": [true, false, false, false],
                "color": [50, 60, 70],
            }),
            &mut img,
        );
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(9, 0).0, [50, 60, 70, 255]);
        assert_eq!(img.get_pixel(9, 9).0, [50, 60, 70, 255]);
        assert_eq!(img.get_pixel(0, 9).0, [50, 60, 70, 255]);
    }

    #[test]
    fn anchor_offsets_by_intrinsic_size() {
        let mut img = blank_canvas(20, 20);
        let registry = draw(
            json!({
                "type": "circle",
                "id": "c",
                "radius": 5,
                "position": [10, 10],
                "anchor": "center",
                "color": [1, 1, 1],
            }),
            &mut img,
        );
        assert_eq!(registry.get("c"), Some(BoundingBox::new(5, 5, 15, 15)));
    }

    #[test]
    fn semi_transparent_fill_blends_over_canvas() {
        let mut img = RgbaImage::from_pixel(10, 10, image::Rgba([0, 0, 255, 255]));
        draw(
            json!({"type": "rectangle", "size": [10, 10], "color": [255, 0, 0, 128]}),
            &mut img,
        );
        let px = img.get_pixel(5, 5).0;
        assert!(px[0] > 100 && px[2] > 80, "expected a red/blue mix, got {px:?}");
        assert_eq!(px[3], 255);
    }
}
