//! Two-stage element placement.
//!
//! First the base point: either the absolute `position`, or an anchor point
//! on a previously drawn element plus `position` as an offset. Then the
//! element's own `anchor` shifts it so the named point of its measured size
//! lands on that base point.

use crate::foundation::error::{CardforgeError, CardforgeResult};
use crate::foundation::geometry::BoundsRegistry;
use crate::spec::model::Placement;

pub fn resolve(
    placement: &Placement,
    size: (i64, i64),
    registry: &BoundsRegistry,
) -> CardforgeResult<(i64, i64)> {
    let (px, py) = (placement.position.x(), placement.position.y());
    let (mut x, mut y) = match &placement.relative_to {
        Some(rel) => {
            let bounds = registry.get(rel.target()).ok_or_else(|| {
                CardforgeError::render(format!(
                    "element with id '{}' not found for relative positioning",
                    rel.target()
                ))
            })?;
            let (ax, ay) = rel.anchor().point_in(bounds);
            (ax + px, ay + py)
        }
        None => (px, py),
    };
    if let Some(anchor) = placement.anchor {
        let (ox, oy) = anchor.offset_in_size(size.0, size.1);
        x -= ox;
        y -= oy;
    }
    Ok((x, y))
}
