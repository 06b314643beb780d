//! Deck orchestration: one card per data row.
//!
//! The spec document is parsed once and kept pristine; every row resolves
//! its macros against that original tree and renders independently on a
//! worker pool. A failing row is logged and never stops its siblings.

use std::path::{Path, PathBuf};

use anyhow::Context;
use rayon::prelude::*;
use serde_json::Value;

use crate::data::{DataRow, DataTable};
use crate::foundation::error::{CardforgeError, CardforgeResult};
use crate::render::compositor::{CardCompositor, RenderOutcome};
use crate::spec::load;
use crate::spec::macros;
use crate::spec::model::CardSpec;

/// Where the deck's tabular data comes from.
#[derive(Clone, Debug)]
pub enum DataSource {
    /// Conventional location; an absent file silently falls back to
    /// single-card mode.
    Default(PathBuf),
    /// Caller-named location; an absent file is an error.
    Explicit(PathBuf),
    /// No data, render the spec as a single card.
    None,
}

/// Result of one card build within a deck.
#[derive(Debug)]
pub struct CardBuildReport {
    /// 1-based card number, also the output filename index.
    pub card_number: usize,
    pub result: CardforgeResult<RenderOutcome>,
}

/// Per-card results of a whole deck build.
#[derive(Debug, Default)]
pub struct DeckReport {
    pub cards: Vec<CardBuildReport>,
}

impl DeckReport {
    pub fn produced(&self) -> usize {
        self.cards.iter().filter(|c| c.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.cards.len() - self.produced()
    }
}

/// Builds every card of a deck from one spec document and its data table.
#[derive(Debug)]
pub struct DeckOrchestrator {
    spec_doc: Value,
    base_dir: Option<PathBuf>,
    data: Option<DataTable>,
    threads: Option<usize>,
}

impl DeckOrchestrator {
    /// Load the spec document and, when present, the data table.
    ///
    /// The spec stays an untyped tree here: macros may fill any field, so
    /// each row converts it to a typed card only after resolution.
    pub fn new(
        spec_path: &Path,
        data: DataSource,
        threads: Option<usize>,
    ) -> CardforgeResult<Self> {
        let spec_doc = load::load_document(spec_path)?;
        let base_dir = spec_path.parent().map(Path::to_path_buf);
        let data = match data {
            DataSource::None => None,
            DataSource::Default(path) => {
                if path.exists() {
                    Some(DataTable::from_path(&path)?)
                } else {
                    tracing::info!(
                        path = %path.display(),
                        "no data file found, building a single card"
                    );
                    None
                }
            }
            DataSource::Explicit(path) => {
                if !path.exists() {
                    return Err(CardforgeError::data(format!(
                        "data file not found: {}",
                        path.display()
                    )));
                }
                Some(DataTable::from_path(&path)?)
            }
        };
        Ok(Self {
            spec_doc,
            base_dir,
            data,
            threads,
        })
    }

    /// Render every card into `output_dir`, creating it if needed.
    pub fn build_deck(&self, output_dir: &Path) -> CardforgeResult<DeckReport> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("creating output directory {}", output_dir.display()))?;

        let Some(table) = &self.data else {
            let result = self.build_card(None, output_dir, 1)?;
            return Ok(DeckReport {
                cards: vec![CardBuildReport {
                    card_number: 1,
                    result: Ok(result),
                }],
            });
        };

        let pool = build_thread_pool(self.threads)?;
        let cards = pool.install(|| {
            table
                .rows()
                .par_iter()
                .enumerate()
                .map(|(index, row)| {
                    let card_number = index + 1;
                    let result = self.build_card(Some(row), output_dir, card_number);
                    if let Err(e) = &result {
                        tracing::error!(card = card_number, error = %e, "error building card");
                    }
                    CardBuildReport {
                        card_number,
                        result,
                    }
                })
                .collect::<Vec<_>>()
        });
        Ok(DeckReport { cards })
    }

    fn build_card(
        &self,
        row: Option<&DataRow>,
        output_dir: &Path,
        card_number: usize,
    ) -> CardforgeResult<RenderOutcome> {
        let resolved = match row {
            Some(row) => macros::resolve(&self.spec_doc, row),
            None => self.spec_doc.clone(),
        };
        let spec = CardSpec::from_value(&resolved)?;
        let mut compositor = CardCompositor::new(spec, self.base_dir.as_deref())?;
        compositor.build(&output_dir.join(format!("card_{card_number}.png")))
    }
}

fn build_thread_pool(threads: Option<usize>) -> CardforgeResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(CardforgeError::validation(
            "worker thread count must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| CardforgeError::render(format!("failed to build worker pool: {e}")))
}
