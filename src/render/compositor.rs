//! Per-card render loop.
//!
//! Walks the element list in order, dispatching each raw element value to
//! its renderer. Failures are confined to the element that caused them: the
//! compositor records a status per element and keeps drawing, so the card is
//! always carried to completion and saved once.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde_json::Value;

use crate::foundation::error::{CardforgeError, CardforgeResult};
use crate::foundation::geometry::{BoundingBox, BoundsRegistry};
use crate::render::canvas;
use crate::render::shapes;
use crate::render::surface::{self, RasterSurface};
use crate::render::text::TextEngine;
use crate::spec::model::{CardSpec, ElementSpec};

/// Outcome of drawing one element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementStatus {
    Rendered,
    /// Unknown `type` value, left out deliberately.
    Skipped,
    /// Conversion or draw failed; the message was also logged.
    Failed(String),
}

/// Aggregated per-element statuses of one card render.
#[derive(Clone, Debug, Default)]
pub struct RenderOutcome {
    pub statuses: Vec<ElementStatus>,
}

impl RenderOutcome {
    /// True when at least one element failed to draw.
    pub fn is_partial(&self) -> bool {
        self.failed() > 0
    }

    pub fn failed(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| matches!(s, ElementStatus::Failed(_)))
            .count()
    }
}

/// Renders one card specification onto its own canvas.
///
/// Owns everything a single card render touches: the canvas, the bounds
/// registry, and the rasterization contexts. Never shared across cards.
pub struct CardCompositor {
    spec: CardSpec,
    base_dir: Option<PathBuf>,
    surface: RasterSurface,
    text: TextEngine,
    canvas: RgbaImage,
    registry: BoundsRegistry,
}

impl CardCompositor {
    /// Set up the canvas and seed the registry with the card's own id.
    pub fn new(spec: CardSpec, base_dir: Option<&Path>) -> CardforgeResult<Self> {
        surface::checked_dims(spec.width, spec.height)?;
        let canvas = canvas::new_canvas(spec.width, spec.height, spec.background_color);
        let mut registry = BoundsRegistry::new();
        if let Some(id) = &spec.id {
            registry.insert(
                id.clone(),
                BoundingBox::new(0, 0, i64::from(spec.width), i64::from(spec.height)),
            );
        }
        Ok(Self {
            spec,
            base_dir: base_dir.map(Path::to_path_buf),
            surface: RasterSurface::new(),
            text: TextEngine::new(),
            canvas,
            registry,
        })
    }

    /// Draw every element in order, isolating per-element failures.
    pub fn render(&mut self) -> RenderOutcome {
        let elements = self.spec.elements.clone();
        let statuses = elements
            .iter()
            .enumerate()
            .map(|(index, value)| self.render_element(index, value))
            .collect();
        RenderOutcome { statuses }
    }

    /// Render the card and write it as a PNG, saving exactly once.
    pub fn build(&mut self, output_path: &Path) -> CardforgeResult<RenderOutcome> {
        let outcome = self.render();
        self.canvas.save(output_path).map_err(|e| {
            CardforgeError::render(format!("save card to {}: {e}", output_path.display()))
        })?;
        tracing::info!(path = %output_path.display(), "card saved");
        Ok(outcome)
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    fn render_element(&mut self, index: usize, value: &Value) -> ElementStatus {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !ElementSpec::is_known_kind(&kind) {
            tracing::warn!(index, kind = %kind, "skipping element of unknown type");
            return ElementStatus::Skipped;
        }
        match self.draw_element(value) {
            Ok(()) => ElementStatus::Rendered,
            Err(e) => {
                tracing::error!(index, kind = %kind, error = %e, "error drawing element");
                ElementStatus::Failed(e.to_string())
            }
        }
    }

    fn draw_element(&mut self, value: &Value) -> CardforgeResult<()> {
        let base = self.base_dir.as_deref();
        match ElementSpec::from_value(value)? {
            ElementSpec::Text(el) => self.text.render(
                &mut self.surface,
                &mut self.canvas,
                &mut self.registry,
                &el,
                base,
            ),
            ElementSpec::Image(el) => {
                crate::render::image::render(&mut self.canvas, &mut self.registry, &el, base)
            }
            ElementSpec::Circle(el) => {
                shapes::draw_circle(&mut self.surface, &mut self.canvas, &mut self.registry, &el)
            }
            ElementSpec::Ellipse(el) => {
                shapes::draw_ellipse(&mut self.surface, &mut self.canvas, &mut self.registry, &el)
            }
            ElementSpec::Polygon(el) => {
                shapes::draw_polygon(&mut self.surface, &mut self.canvas, &mut self.registry, &el)
            }
            ElementSpec::RegularPolygon(el) => shapes::draw_regular_polygon(
                &mut self.surface,
                &mut self.canvas,
                &mut self.registry,
                &el,
            ),
            ElementSpec::Rectangle(el) => shapes::draw_rectangle(
                &mut self.surface,
                &mut self.canvas,
                &mut self.registry,
                &el,
            ),
        }
    }
}
