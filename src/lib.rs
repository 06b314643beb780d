//! Cardforge renders print-ready card decks from declarative specifications.
//!
//! A deck is a card layout (YAML or JSON) plus a `;`-separated data table;
//! every table row fills the layout's `%column%` macros and renders as its
//! own PNG. [`DeckOrchestrator`] drives the per-row fan-out,
//! [`CardCompositor`] draws one card, and [`PdfExporter`] tiles the
//! finished images onto printable pages.
#![forbid(unsafe_code)]

pub mod data;
pub mod deck;
pub mod export;
pub mod foundation;
pub mod project;
pub mod render;
pub mod spec;

pub use data::{CellValue, DataRow, DataTable};
pub use deck::{DataSource, DeckOrchestrator, DeckReport};
pub use export::{ExportOptions, PageSize, PdfExporter};
pub use foundation::error::{CardforgeError, CardforgeResult};
pub use foundation::geometry::{Anchor, BoundingBox, BoundsRegistry};
pub use render::compositor::{CardCompositor, RenderOutcome};
pub use spec::model::{CardSpec, ElementSpec};
