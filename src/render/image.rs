//! Image element rendering.
//!
//! Decodes the referenced file, runs its filter pipeline, then pastes the
//! result onto the card. A file that cannot be read or decoded logs an error
//! and skips the element so the rest of the card still renders.

use std::path::Path;

use image::RgbaImage;

use crate::foundation::error::CardforgeResult;
use crate::foundation::geometry::{BoundingBox, BoundsRegistry};
use crate::render::canvas;
use crate::render::filters;
use crate::render::position;
use crate::spec::load;
use crate::spec::model::ImageElement;

/// Draw one image element onto the card canvas and record its bounds.
pub fn render(
    canvas: &mut RgbaImage,
    registry: &mut BoundsRegistry,
    element: &ImageElement,
    base_dir: Option<&Path>,
) -> CardforgeResult<()> {
    let path = load::resolve_asset_path(&element.path, base_dir);
    let decoded = match image::open(&path) {
        Ok(img) => img,
        Err(e) => {
            tracing::error!(image = %path.display(), error = %e, "image not found");
            return Ok(());
        }
    };
    // Filters can pad or fade regions to transparent, so a filtered source
    // always pastes through its alpha channel.
    let masked = decoded.color().has_alpha() || !element.filters.is_empty();
    let img = filters::apply_chain(decoded.into_rgba8(), &element.filters)?;

    let size = (i64::from(img.width()), i64::from(img.height()));
    let (x, y) = position::resolve(&element.placement, size, registry)?;

    canvas::paste(canvas, &img, x, y, masked);

    if let Some(id) = &element.placement.id {
        registry.insert(id.clone(), BoundingBox::new(x, y, x + size.0, y + size.1));
    }
    Ok(())
}
