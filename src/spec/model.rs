use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::foundation::error::{CardforgeError, CardforgeResult};
use crate::foundation::geometry::Anchor;

/// RGBA color parsed from a 3- or 4-channel integer sequence.
///
/// A missing alpha channel means fully opaque.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
}

impl TryFrom<Vec<u8>> for Color {
    type Error = String;

    fn try_from(channels: Vec<u8>) -> Result<Self, String> {
        match channels.as_slice() {
            [r, g, b] => Ok(Self::rgba(*r, *g, *b, 255)),
            [r, g, b, a] => Ok(Self::rgba(*r, *g, *b, *a)),
            other => Err(format!(
                "color needs 3 or 4 channels, got {}",
                other.len()
            )),
        }
    }
}

impl From<Color> for Vec<u8> {
    fn from(c: Color) -> Self {
        vec![c.r, c.g, c.b, c.a]
    }
}

/// Integer pixel vector, serialized as a two-element array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vec2i(pub i64, pub i64);

impl Vec2i {
    pub fn x(self) -> i64 {
        self.0
    }

    pub fn y(self) -> i64 {
        self.1
    }
}

/// Reference to another element's recorded bounds: `[id, anchor]`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RelativeTo(pub String, pub Anchor);

impl RelativeTo {
    pub fn target(&self) -> &str {
        &self.0
    }

    pub fn anchor(&self) -> Anchor {
        self.1
    }
}

/// Placement fields common to every element kind.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub id: Option<String>,
    /// Absolute position, or the offset from the resolved anchor point when
    /// `relative_to` is present.
    #[serde(default)]
    pub position: Vec2i,
    #[serde(default)]
    pub relative_to: Option<RelativeTo>,
    /// Anchor into the element's own bounds; the named point lands on the
    /// resolved position.
    #[serde(default)]
    pub anchor: Option<Anchor>,
}

/// Horizontal alignment of wrapped text lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

fn default_font_size() -> f64 {
    10.0
}

fn default_line_spacing() -> f64 {
    4.0
}

fn default_text_color() -> Color {
    Color::BLACK
}

#[derive(Clone, Debug, Deserialize)]
pub struct TextElement {
    #[serde(flatten)]
    pub placement: Placement,
    /// Raw text value. Macros may leave a number or null here, so the field
    /// stays untyped until [`TextElement::content`] renders it.
    #[serde(default)]
    pub text: Value,
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default)]
    pub font_variant: Option<String>,
    /// Maximum line width in pixels; absent or non-positive means no wrap.
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f64,
    #[serde(default)]
    pub align: Align,
    #[serde(default = "default_text_color")]
    pub color: Color,
    #[serde(default)]
    pub stroke_width: u32,
    #[serde(default)]
    pub stroke_color: Option<Color>,
}

impl TextElement {
    /// Text body with missing values substituted by a single space.
    pub fn content(&self) -> String {
        match &self.text {
            Value::Null => " ".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ImageElement {
    #[serde(flatten)]
    pub placement: Placement,
    pub path: String,
    #[serde(default)]
    pub filters: FilterChain,
}

fn default_outline_width() -> i64 {
    1
}

/// Fill and outline styling shared by all shape kinds.
#[derive(Clone, Debug, Deserialize)]
pub struct ShapeStyle {
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub outline_color: Option<Color>,
    #[serde(default = "default_outline_width")]
    pub outline_width: i64,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            color: None,
            outline_color: None,
            outline_width: 1,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CircleElement {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(flatten)]
    pub style: ShapeStyle,
    pub radius: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EllipseElement {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(flatten)]
    pub style: ShapeStyle,
    pub size: Vec2i,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PolygonElement {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(flatten)]
    pub style: ShapeStyle,
    #[serde(default)]
    pub points: Vec<Vec2i>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegularPolygonElement {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(flatten)]
    pub style: ShapeStyle,
    pub radius: i64,
    pub sides: u32,
    /// Rotation in degrees; zero rests the polygon on a flat bottom edge.
    #[serde(default)]
    pub rotation: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RectangleElement {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(flatten)]
    pub style: ShapeStyle,
    pub size: Vec2i,
    #[serde(default)]
    pub corner_radius: i64,
    /// Which corners round, as `[top-left, top-right, bottom-right,
    /// bottom-left]`; absent means all of them.
    #[serde(default)]
    pub corners: Option<[bool; 4]>,
}

/// One drawable unit of a card, discriminated by its `type` field.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElementSpec {
    Text(TextElement),
    Image(ImageElement),
    Circle(CircleElement),
    Ellipse(EllipseElement),
    Polygon(PolygonElement),
    RegularPolygon(RegularPolygonElement),
    Rectangle(RectangleElement),
}

impl ElementSpec {
    pub const KNOWN_KINDS: [&'static str; 7] = [
        "text",
        "image",
        "circle",
        "ellipse",
        "polygon",
        "regular-polygon",
        "rectangle",
    ];

    pub fn is_known_kind(kind: &str) -> bool {
        Self::KNOWN_KINDS.contains(&kind)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ElementSpec::Text(_) => "text",
            ElementSpec::Image(_) => "image",
            ElementSpec::Circle(_) => "circle",
            ElementSpec::Ellipse(_) => "ellipse",
            ElementSpec::Polygon(_) => "polygon",
            ElementSpec::RegularPolygon(_) => "regular-polygon",
            ElementSpec::Rectangle(_) => "rectangle",
        }
    }

    pub fn placement(&self) -> &Placement {
        match self {
            ElementSpec::Text(e) => &e.placement,
            ElementSpec::Image(e) => &e.placement,
            ElementSpec::Circle(e) => &e.placement,
            ElementSpec::Ellipse(e) => &e.placement,
            ElementSpec::Polygon(e) => &e.placement,
            ElementSpec::RegularPolygon(e) => &e.placement,
            ElementSpec::Rectangle(e) => &e.placement,
        }
    }

    pub fn from_value(value: &Value) -> CardforgeResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| CardforgeError::validation(format!("element: {e}")))
    }
}

/// One transform in an image element's filter pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Filter {
    Crop { x1: i64, y1: i64, x2: i64, y2: i64 },
    CropTop(i64),
    CropBottom(i64),
    CropLeft(i64),
    CropRight(i64),
    CropBox { x: i64, y: i64, w: i64, h: i64 },
    Resize { width: Option<u32>, height: Option<u32> },
    Rotate(f64),
    Flip(FlipAxis),
    Opacity(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

impl Filter {
    /// Parse one `name: params` filter entry.
    ///
    /// Returns `Ok(None)` for names and flip directions this engine does not
    /// know, which drops them from the chain without failing the element.
    fn from_entry(name: &str, params: Value) -> Result<Option<Filter>, String> {
        fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, String> {
            serde_json::from_value(params).map_err(|e| e.to_string())
        }

        let filter = match name {
            "crop" => {
                let [x1, y1, x2, y2]: [i64; 4] = parse(params)?;
                Filter::Crop { x1, y1, x2, y2 }
            }
            "crop_top" => Filter::CropTop(parse(params)?),
            "crop_bottom" => Filter::CropBottom(parse(params)?),
            "crop_left" => Filter::CropLeft(parse(params)?),
            "crop_right" => Filter::CropRight(parse(params)?),
            "crop_box" => {
                let [x, y, w, h]: [i64; 4] = parse(params)?;
                Filter::CropBox { x, y, w, h }
            }
            "resize" => {
                let (width, height): (Option<u32>, Option<u32>) = parse(params)?;
                Filter::Resize { width, height }
            }
            "rotate" => Filter::Rotate(parse(params)?),
            "flip" => match params.as_str() {
                Some("horizontal") => Filter::Flip(FlipAxis::Horizontal),
                Some("vertical") => Filter::Flip(FlipAxis::Vertical),
                _ => return Ok(None),
            },
            "opacity" => Filter::Opacity(parse(params)?),
            _ => return Ok(None),
        };
        Ok(Some(filter))
    }
}

/// Ordered filter pipeline parsed from a `name: params` mapping.
///
/// Document order is preserved; filters apply exactly in the order written.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterChain(pub Vec<Filter>);

impl FilterChain {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FilterChain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        let mut ops = Vec::with_capacity(entries.len());
        for (name, params) in entries {
            match Filter::from_entry(&name, params) {
                Ok(Some(op)) => ops.push(op),
                Ok(None) => tracing::debug!(filter = %name, "ignoring unsupported filter"),
                Err(msg) => {
                    return Err(serde::de::Error::custom(format!("filter '{name}': {msg}")));
                }
            }
        }
        Ok(FilterChain(ops))
    }
}

fn default_card_width() -> u32 {
    250
}

fn default_card_height() -> u32 {
    350
}

fn default_background() -> Color {
    Color::rgba(255, 255, 255, 0)
}

/// Top-level card description.
///
/// Elements stay as raw document values here; they are converted to typed
/// [`ElementSpec`]s one at a time during rendering so a malformed element
/// fails in isolation.
#[derive(Clone, Debug, Deserialize)]
pub struct CardSpec {
    #[serde(default = "default_card_width")]
    pub width: u32,
    #[serde(default = "default_card_height")]
    pub height: u32,
    #[serde(default = "default_background")]
    pub background_color: Color,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub elements: Vec<Value>,
}

impl CardSpec {
    pub fn from_value(doc: &Value) -> CardforgeResult<Self> {
        serde_json::from_value(doc.clone())
            .map_err(|e| CardforgeError::validation(format!("card spec: {e}")))
    }
}
