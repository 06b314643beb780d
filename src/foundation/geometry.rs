use serde::{Deserialize, Serialize};

/// Named reference point inside a rectangle.
///
/// Anchors serve double duty: locating a point inside a referenced element's
/// recorded bounds, and shifting an element against its own size so the named
/// point lands on the resolved position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    /// Resolve the anchor to an absolute point inside `bounds`.
    ///
    /// Midpoints use floor division so results stay on the integer pixel grid.
    pub fn point_in(self, bounds: BoundingBox) -> (i64, i64) {
        let BoundingBox { x1, y1, x2, y2 } = bounds;
        let mid_x = (x1 + x2).div_euclid(2);
        let mid_y = (y1 + y2).div_euclid(2);
        match self {
            Anchor::TopLeft => (x1, y1),
            Anchor::TopCenter => (mid_x, y1),
            Anchor::TopRight => (x2, y1),
            Anchor::MiddleLeft => (x1, mid_y),
            Anchor::Center => (mid_x, mid_y),
            Anchor::MiddleRight => (x2, mid_y),
            Anchor::BottomLeft => (x1, y2),
            Anchor::BottomCenter => (mid_x, y2),
            Anchor::BottomRight => (x2, y2),
        }
    }

    /// Resolve the anchor inside a `w x h` box originating at `(0, 0)`.
    pub fn offset_in_size(self, w: i64, h: i64) -> (i64, i64) {
        self.point_in(BoundingBox::from_size(w, h))
    }
}

/// Axis-aligned rectangle in canvas pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoundingBox {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box of the given size with its top-left corner at the origin.
    pub fn from_size(w: i64, h: i64) -> Self {
        Self::new(0, 0, w, h)
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }
}

/// Per-card map from element id to its drawn bounds.
///
/// Scoped to a single card render: created by the compositor, read by the
/// position resolver, discarded with the card. Re-inserting an id replaces
/// the stored bounds (last write wins).
#[derive(Clone, Debug, Default)]
pub struct BoundsRegistry {
    entries: Vec<(String, BoundingBox)>,
}

impl BoundsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, bounds: BoundingBox) {
        let id = id.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == id) {
            slot.1 = bounds;
        } else {
            self.entries.push((id, bounds));
        }
    }

    pub fn get(&self, id: &str) -> Option<BoundingBox> {
        self.entries
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, b)| *b)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
