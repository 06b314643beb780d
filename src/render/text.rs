//! Text rendering.
//!
//! Vector fonts are shaped with Parley and filled by the raster surface; when
//! no font is given or loading fails, a builtin bitmap face takes over so a
//! card never renders without its text. Wrapping happens before shaping, one
//! word at a time against the measured line width.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::foundation::error::{CardforgeError, CardforgeResult};
use crate::foundation::geometry::{BoundingBox, BoundsRegistry};
use crate::render::canvas;
use crate::render::position;
use crate::render::surface::RasterSurface;
use crate::spec::load;
use crate::spec::model::{Align, Color, TextElement};

/// RGBA8 brush carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct TextBrush {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl From<Color> for TextBrush {
    fn from(c: Color) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// Vector font registered with the shaping contexts, plus the glyph source
/// handed to the raster surface.
#[derive(Clone)]
struct VectorFont {
    family: String,
    glyphs: vello_cpu::peniko::FontData,
}

enum FontChoice {
    Vector(VectorFont),
    Bitmap,
}

/// Weight and slant derived from a `font_variant` name.
#[derive(Clone, Copy, Default)]
struct VariantStyle {
    weight: Option<parley::style::FontWeight>,
    style: Option<parley::style::FontStyle>,
}

// Native cell of the builtin bitmap face.
const BITMAP_CELL_W: u32 = 12;
const BITMAP_CELL_H: u32 = 24;

/// Shapes, measures and draws text elements.
///
/// Holds the Parley font and layout contexts plus a cache of fonts already
/// registered by path, so repeated cards reuse shaping state.
pub struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    fonts: HashMap<PathBuf, VectorFont>,
}

impl Default for TextEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            fonts: HashMap::new(),
        }
    }

    /// Draw one text element onto the card canvas and record its bounds.
    pub fn render(
        &mut self,
        surface: &mut RasterSurface,
        canvas: &mut RgbaImage,
        registry: &mut BoundsRegistry,
        element: &TextElement,
        base_dir: Option<&Path>,
    ) -> CardforgeResult<()> {
        let content = element.content();
        let font = self.resolve_font(element, base_dir);
        let variant = resolve_variant(element, &font);
        let brush = TextBrush::from(element.color);

        let lines: Vec<String> = match element.width.filter(|w| *w > 0.0) {
            Some(limit) => self.wrap(&content, limit, &font, element, variant, brush),
            None => content.split('\n').map(str::to_string).collect(),
        };

        // Shape each non-empty line once; measurement and drawing share the
        // layouts.
        let shaped: Vec<Option<parley::Layout<TextBrush>>> = match &font {
            FontChoice::Vector(vf) => lines
                .iter()
                .map(|line| {
                    if line.is_empty() {
                        None
                    } else {
                        Some(self.shape_line(line, &vf.family, element.font_size as f32, variant, brush))
                    }
                })
                .collect(),
            FontChoice::Bitmap => Vec::new(),
        };

        let dims: Vec<(f64, f64)> = match &font {
            FontChoice::Vector(_) => shaped
                .iter()
                .map(|l| l.as_ref().map_or((0.0, 0.0), measure_layout))
                .collect(),
            FontChoice::Bitmap => {
                let (cw, ch) = bitmap_cell(element.font_size);
                lines
                    .iter()
                    .map(|line| (line.chars().count() as f64 * f64::from(cw), f64::from(ch)))
                    .collect()
            }
        };

        let line_h = dims.iter().map(|d| d.1).fold(0.0, f64::max);
        let block_w = dims.iter().map(|d| d.0).fold(0.0, f64::max);
        let count = lines.len();
        let block_h = if count == 0 || (block_w == 0.0 && line_h == 0.0) {
            0.0
        } else {
            line_h * count as f64 + element.line_spacing * count.saturating_sub(1) as f64
        };
        let size = (block_w.ceil() as i64, block_h.ceil() as i64);

        let (x, y) = position::resolve(&element.placement, size, registry)?;

        if size.0 > 0 && size.1 > 0 {
            let (canvas_w, canvas_h) = canvas.dimensions();
            let layer = match &font {
                FontChoice::Vector(vf) => draw_vector_block(
                    surface,
                    (canvas_w, canvas_h),
                    vf,
                    &shaped,
                    &dims,
                    (x, y),
                    block_w,
                    line_h,
                    element,
                )?,
                FontChoice::Bitmap => draw_bitmap_block(
                    (canvas_w, canvas_h),
                    &lines,
                    &dims,
                    (x, y),
                    block_w,
                    line_h,
                    element,
                )?,
            };
            canvas::composite_layer_in_place(canvas, &layer)?;
        }

        if let Some(id) = &element.placement.id {
            registry.insert(id.clone(), BoundingBox::new(x, y, x + size.0, y + size.1));
        }
        Ok(())
    }

    fn resolve_font(&mut self, element: &TextElement, base_dir: Option<&Path>) -> FontChoice {
        let Some(font_path) = &element.font_path else {
            return FontChoice::Bitmap;
        };
        let path = load::resolve_asset_path(font_path, base_dir);
        match self.load_vector_font(&path) {
            Ok(vf) => FontChoice::Vector(vf),
            Err(e) => {
                tracing::error!(font = %path.display(), error = %e, "could not load font, using builtin");
                FontChoice::Bitmap
            }
        }
    }

    fn load_vector_font(&mut self, path: &Path) -> CardforgeResult<VectorFont> {
        if let Some(found) = self.fonts.get(path) {
            return Ok(found.clone());
        }
        let bytes = std::fs::read(path)
            .map_err(|e| CardforgeError::render(format!("read font {}: {e}", path.display())))?;
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| CardforgeError::render("font data contains no families"))?;
        let family = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| CardforgeError::render("registered font family has no name"))?
            .to_string();
        let loaded = VectorFont {
            family,
            glyphs: vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0),
        };
        self.fonts.insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    fn shape_line(
        &mut self,
        text: &str,
        family: &str,
        size_px: f32,
        variant: VariantStyle,
        brush: TextBrush,
    ) -> parley::Layout<TextBrush> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family.to_string())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));
        if let Some(weight) = variant.weight {
            builder.push_default(parley::style::StyleProperty::FontWeight(weight));
        }
        if let Some(style) = variant.style {
            builder.push_default(parley::style::StyleProperty::FontStyle(style));
        }
        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }

    /// Greedy word wrap against a pixel limit, preserving existing newlines.
    ///
    /// A word wider than the limit gets a line of its own; when it is the
    /// first word of an input line, the empty line it overflowed stays.
    fn wrap(
        &mut self,
        text: &str,
        limit: f64,
        font: &FontChoice,
        element: &TextElement,
        variant: VariantStyle,
        brush: TextBrush,
    ) -> Vec<String> {
        let mut wrapped = Vec::new();
        for line in text.split('\n') {
            let mut lines = vec![String::new()];
            for word in line.split_whitespace() {
                let candidate = match lines.last() {
                    Some(last) if !last.is_empty() => format!("{last} {word}"),
                    _ => word.to_string(),
                };
                if self.measure_line(&candidate, font, element, variant, brush).0 <= limit {
                    if let Some(slot) = lines.last_mut() {
                        *slot = candidate;
                    }
                } else {
                    lines.push(word.to_string());
                }
            }
            wrapped.append(&mut lines);
        }
        wrapped
    }

    fn measure_line(
        &mut self,
        line: &str,
        font: &FontChoice,
        element: &TextElement,
        variant: VariantStyle,
        brush: TextBrush,
    ) -> (f64, f64) {
        match font {
            FontChoice::Vector(vf) => {
                if line.is_empty() {
                    return (0.0, 0.0);
                }
                let layout = self.shape_line(line, &vf.family, element.font_size as f32, variant, brush);
                measure_layout(&layout)
            }
            FontChoice::Bitmap => {
                let (cw, ch) = bitmap_cell(element.font_size);
                (line.chars().count() as f64 * f64::from(cw), f64::from(ch))
            }
        }
    }
}

fn resolve_variant(element: &TextElement, font: &FontChoice) -> VariantStyle {
    let Some(variant) = &element.font_variant else {
        return VariantStyle::default();
    };
    if matches!(font, FontChoice::Bitmap) {
        tracing::warn!(variant = %variant, "font variant not supported for this font");
        return VariantStyle::default();
    }
    match variant.to_ascii_lowercase().as_str() {
        "bold" => VariantStyle {
            weight: Some(parley::style::FontWeight::BOLD),
            style: None,
        },
        "italic" => VariantStyle {
            weight: None,
            style: Some(parley::style::FontStyle::Italic),
        },
        "regular" | "normal" => VariantStyle::default(),
        _ => {
            tracing::warn!(variant = %variant, "font variant not supported for this font");
            VariantStyle::default()
        }
    }
}

fn measure_layout(layout: &parley::Layout<TextBrush>) -> (f64, f64) {
    let mut w = 0.0f64;
    let mut h = 0.0f64;
    for line in layout.lines() {
        let m = line.metrics();
        w = w.max(f64::from(m.advance));
        h += f64::from(m.ascent + m.descent + m.leading);
    }
    (w, h)
}

/// Horizontal shift of one line inside the block, per alignment.
fn align_offset(align: Align, block_w: f64, line_w: f64) -> f64 {
    let rem = (block_w - line_w).max(0.0);
    match align {
        Align::Left => 0.0,
        Align::Center => rem / 2.0,
        Align::Right => rem,
    }
}

/// Integer offsets within `width` of the pen, used to fake a text stroke by
/// overdrawing. Excludes the center.
fn stroke_offsets(width: u32) -> Vec<(i32, i32)> {
    let w = width as i32;
    let mut out = Vec::new();
    for dy in -w..=w {
        for dx in -w..=w {
            if (dx, dy) != (0, 0) && dx * dx + dy * dy <= w * w {
                out.push((dx, dy));
            }
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn draw_vector_block(
    surface: &mut RasterSurface,
    canvas_dims: (u32, u32),
    vf: &VectorFont,
    shaped: &[Option<parley::Layout<TextBrush>>],
    dims: &[(f64, f64)],
    origin: (i64, i64),
    block_w: f64,
    line_h: f64,
    element: &TextElement,
) -> CardforgeResult<RgbaImage> {
    let stroke = stroke_offsets(element.stroke_width);
    let stroke_color = element.stroke_color.unwrap_or(element.color);
    surface.render_layer(canvas_dims.0, canvas_dims.1, |ctx| {
        for (i, layout) in shaped.iter().enumerate() {
            let Some(layout) = layout else { continue };
            let dx = align_offset(element.align, block_w, dims[i].0);
            let lx = origin.0 as f64 + dx;
            let ly = origin.1 as f64 + (line_h + element.line_spacing) * i as f64;
            for &(ox, oy) in &stroke {
                draw_layout(
                    ctx,
                    layout,
                    &vf.glyphs,
                    (lx + f64::from(ox), ly + f64::from(oy)),
                    Some(stroke_color),
                );
            }
            draw_layout(ctx, layout, &vf.glyphs, (lx, ly), None);
        }
        Ok(())
    })
}

fn draw_layout(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrush>,
    glyph_source: &vello_cpu::peniko::FontData,
    origin: (f64, f64),
    color_override: Option<Color>,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::translate(origin));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let (r, g, b, a) = match color_override {
                Some(c) => (c.r, c.g, c.b, c.a),
                None => {
                    let brush = run.style().brush;
                    (brush.r, brush.g, brush.b, brush.a)
                }
            };
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(glyph_source)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}

/// Bitmap cell size for the requested font size, scaled from the native
/// 12x24 face and never smaller than one pixel.
fn bitmap_cell(font_size: f64) -> (u32, u32) {
    let scale = (font_size / f64::from(BITMAP_CELL_H)).max(0.0);
    let w = (f64::from(BITMAP_CELL_W) * scale).round().max(1.0) as u32;
    let h = (f64::from(BITMAP_CELL_H) * scale).round().max(1.0) as u32;
    (w, h)
}

fn draw_bitmap_block(
    canvas_dims: (u32, u32),
    lines: &[String],
    dims: &[(f64, f64)],
    origin: (i64, i64),
    block_w: f64,
    line_h: f64,
    element: &TextElement,
) -> CardforgeResult<RgbaImage> {
    let mut layer = RgbaImage::new(canvas_dims.0, canvas_dims.1);
    let glyphs = bitmap_glyphs(lines)?;
    let (cell_w, cell_h) = bitmap_cell(element.font_size);
    let stroke_color = element.stroke_color.unwrap_or(element.color);

    // Stroke passes land under the fill pass.
    let mut passes: Vec<(i64, i64, Color)> = stroke_offsets(element.stroke_width)
        .into_iter()
        .map(|(ox, oy)| (i64::from(ox), i64::from(oy), stroke_color))
        .collect();
    passes.push((0, 0, element.color));

    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let dx = align_offset(element.align, block_w, dims[i].0);
        let lx = origin.0 + dx.round() as i64;
        let ly = origin.1 + ((line_h + element.line_spacing) * i as f64).round() as i64;
        for &(ox, oy, color) in &passes {
            let mut pen_x = lx + ox;
            let top = ly + oy;
            for ch in line.chars() {
                if !ch.is_whitespace()
                    && let Some(grid) = glyphs.get(&ch)
                {
                    blit_glyph(&mut layer, grid, pen_x, top, cell_w, cell_h, color);
                }
                pen_x += i64::from(cell_w);
            }
        }
    }
    Ok(layer)
}

/// Rasterize every distinct glyph the lines need from the builtin face.
///
/// Characters the face does not cover render as a box outline.
fn bitmap_glyphs(lines: &[String]) -> CardforgeResult<HashMap<char, Vec<bool>>> {
    let mut font = spleen_font::PSF2Font::new(spleen_font::FONT_12X24)
        .map_err(|e| CardforgeError::render(format!("builtin font data: {e:?}")))?;
    let (w, h) = (BITMAP_CELL_W as usize, BITMAP_CELL_H as usize);
    let mut glyphs = HashMap::new();
    for line in lines {
        for ch in line.chars() {
            if ch.is_whitespace() || glyphs.contains_key(&ch) {
                continue;
            }
            let mut grid = vec![false; w * h];
            let utf8 = ch.to_string();
            match font.glyph_for_utf8(utf8.as_bytes()) {
                Some(rows) => {
                    for (gy, row) in rows.enumerate() {
                        for (gx, on) in row.enumerate() {
                            if on && gy < h && gx < w {
                                grid[gy * w + gx] = true;
                            }
                        }
                    }
                }
                None => outline_box(&mut grid, w, h),
            }
            glyphs.insert(ch, grid);
        }
    }
    Ok(glyphs)
}

fn outline_box(grid: &mut [bool], w: usize, h: usize) {
    for x in 0..w {
        grid[x] = true;
        grid[(h - 1) * w + x] = true;
    }
    for y in 0..h {
        grid[y * w] = true;
        grid[y * w + w - 1] = true;
    }
}

/// Nearest-neighbor blit of one glyph cell onto the layer.
fn blit_glyph(
    layer: &mut RgbaImage,
    grid: &[bool],
    x: i64,
    y: i64,
    cell_w: u32,
    cell_h: u32,
    color: Color,
) {
    let (layer_w, layer_h) = (i64::from(layer.width()), i64::from(layer.height()));
    let src_w = BITMAP_CELL_W as usize;
    for dy in 0..cell_h {
        for dx in 0..cell_w {
            let sx = dx as usize * src_w / cell_w as usize;
            let sy = dy as usize * BITMAP_CELL_H as usize / cell_h as usize;
            if !grid[sy * src_w + sx] {
                continue;
            }
            let px = x + i64::from(dx);
            let py = y + i64::from(dy);
            if px < 0 || py < 0 || px >= layer_w || py >= layer_h {
                continue;
            }
            let dst = layer.get_pixel(px as u32, py as u32).0;
            let blended = canvas::over(dst, [color.r, color.g, color.b, color.a]);
            layer.put_pixel(px as u32, py as u32, image::Rgba(blended));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::model::ElementSpec;
    use serde_json::json;

    fn text_el(value: serde_json::Value) -> TextElement {
        match ElementSpec::from_value(&value).unwrap() {
            ElementSpec::Text(t) => t,
            other => panic!("expected text element, got {}", other.kind()),
        }
    }

    fn blank_canvas(w: u32, h: u32) -> RgbaImage {
        canvas::new_canvas(w, h, Color::rgba(0, 0, 0, 0))
    }

    #[test]
    fn bitmap_cell_scales_with_font_size() {
        assert_eq!(bitmap_cell(24.0), (12, 24));
        assert_eq!(bitmap_cell(12.0), (6, 12));
        assert_eq!(bitmap_cell(48.0), (24, 48));
        assert_eq!(bitmap_cell(1.0), (1, 1));
    }

    #[test]
    fn stroke_offsets_form_a_disc() {
        assert!(stroke_offsets(0).is_empty());
        assert_eq!(stroke_offsets(1).len(), 4);
        assert_eq!(stroke_offsets(2).len(), 12);
        assert!(!stroke_offsets(1).contains(&(0, 0)));
    }

    #[test]
    fn align_offsets_split_the_remainder() {
        assert_eq!(align_offset(Align::Left, 100.0, 60.0), 0.0);
        assert_eq!(align_offset(Align::Center, 100.0, 60.0), 20.0);
        assert_eq!(align_offset(Align::Right, 100.0, 60.0), 40.0);
    }

    #[test]
    fn wrap_splits_on_measured_width() {
        let mut engine = TextEngine::new();
        // Bitmap cell at size 24 is 12px wide, so the limit fits five chars.
        let el = text_el(json!({"type": "text", "text": "x", "font_size": 24}));
        let lines = engine.wrap(
            "aaaa bb cc",
            60.0,
            &FontChoice::Bitmap,
            &el,
            VariantStyle::default(),
            TextBrush::default(),
        );
        assert_eq!(lines, vec!["aaaa".to_string(), "bb cc".to_string()]);
    }

    #[test]
    fn wrap_keeps_empty_line_before_overlong_first_word() {
        let mut engine = TextEngine::new();
        let el = text_el(json!({"type": "text", "text": "x", "font_size": 24}));
        let lines = engine.wrap(
            "abcdefgh",
            60.0,
            &FontChoice::Bitmap,
            &el,
            VariantStyle::default(),
            TextBrush::default(),
        );
        assert_eq!(lines, vec![String::new(), "abcdefgh".to_string()]);
    }

    #[test]
    fn wrap_preserves_manual_newlines() {
        let mut engine = TextEngine::new();
        let el = text_el(json!({"type": "text", "text": "x", "font_size": 24}));
        let lines = engine.wrap(
            "a\n\nb",
            600.0,
            &FontChoice::Bitmap,
            &el,
            VariantStyle::default(),
            TextBrush::default(),
        );
        assert_eq!(
            lines,
            vec!["a".to_string(), String::new(), "b".to_string()]
        );
    }

    #[test]
    fn bitmap_text_draws_and_registers_bounds() {
        let mut engine = TextEngine::new();
        let mut surface = RasterSurface::default();
        let mut canvas_img = blank_canvas(100, 50);
        let mut registry = BoundsRegistry::new();
        let el = text_el(json!({
            "type": "text",
            "text": "A",
            "id": "label",
            "font_size": 24,
            "position": [10, 10],
            "color": [255, 0, 0],
        }));

        engine
            .render(&mut surface, &mut canvas_img, &mut registry, &el, None)
            .unwrap();

        assert_eq!(
            registry.get("label"),
            Some(BoundingBox::new(10, 10, 22, 34))
        );
        let hit = canvas_img
            .pixels()
            .any(|p| p.0 == [255, 0, 0, 255]);
        assert!(hit, "glyph pixels should land on the canvas");
    }

    #[test]
    fn missing_font_file_falls_back_to_bitmap() {
        let mut engine = TextEngine::new();
        let mut surface = RasterSurface::default();
        let mut canvas_img = blank_canvas(80, 40);
        let mut registry = BoundsRegistry::new();
        let el = text_el(json!({
            "type": "text",
            "text": "hi",
            "font_path": "no/such/font.ttf",
            "font_size": 24,
            "color": [0, 0, 255],
        }));

        engine
            .render(&mut surface, &mut canvas_img, &mut registry, &el, None)
            .unwrap();
        assert!(canvas_img.pixels().any(|p| p.0 == [0, 0, 255, 255]));
    }

    #[test]
    fn unknown_relative_target_fails_the_element() {
        let mut engine = TextEngine::new();
        let mut surface = RasterSurface::default();
        let mut canvas_img = blank_canvas(80, 40);
        let mut registry = BoundsRegistry::new();
        let el = text_el(json!({
            "type": "text",
            "text": "hi",
            "relative_to": ["ghost", "center"],
        }));

        let err = engine
            .render(&mut surface, &mut canvas_img, &mut registry, &el, None)
            .unwrap_err();
        assert!(err.to_string().contains("'ghost'"));
    }

    #[test]
    fn unsupported_variant_is_ignored() {
        let el = text_el(json!({
            "type": "text",
            "text": "hi",
            "font_variant": "ultra-wide",
        }));
        let v = resolve_variant(&el, &FontChoice::Bitmap);
        assert!(v.weight.is_none() && v.style.is_none());
    }
}
