use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use cardforge::deck::{DataSource, DeckOrchestrator};
use cardforge::export::{ExportOptions, PageSize, PdfExporter};
use cardforge::project::{self, InitOutcome};

#[derive(Parser, Debug)]
#[command(name = "cardforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new project with a starter deck.yaml and deck.csv.
    Init,
    /// Render every card of the deck as a PNG.
    Build(BuildArgs),
    /// Tile rendered card images onto a printable PDF.
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct BuildArgs {
    /// Output directory for the rendered cards.
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Deck specification file (YAML or JSON).
    #[arg(long, default_value = "deck.yaml")]
    spec: PathBuf,

    /// Card data table, one card per row [default: deck.csv].
    ///
    /// When left at the default, a missing file just builds a single card;
    /// a path given here must exist.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Worker threads for the card fan-out.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Folder holding the rendered card images.
    image_folder: PathBuf,

    /// Output PDF path.
    #[arg(long, default_value = "output.pdf")]
    output: PathBuf,

    /// Physical page size.
    #[arg(long, default_value = "A4")]
    page_size: String,

    /// Card width in millimeters.
    #[arg(long, default_value_t = 63.5)]
    width: f64,

    /// Card height in millimeters.
    #[arg(long, default_value_t = 88.9)]
    height: f64,

    /// Gap between cards in millimeters.
    #[arg(long, default_value_t = 0.0)]
    gap: f64,

    /// Horizontal and vertical page margins in millimeters.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], default_values_t = [2.0, 2.0])]
    margins: Vec<f64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Init => cmd_init(),
        Command::Build(args) => cmd_build(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn cmd_init() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("resolve working directory")?;
    match project::init_project(&cwd)? {
        InitOutcome::Created => println!("initialized new project from the starter templates"),
        InitOutcome::AlreadyInitialized => {
            println!("project already initialized, leaving deck.yaml and deck.csv alone")
        }
    }
    Ok(())
}

fn cmd_build(args: BuildArgs) -> anyhow::Result<()> {
    if !args.spec.exists() {
        anyhow::bail!("spec file not found: {}", args.spec.display());
    }
    let data = match args.data {
        Some(path) => DataSource::Explicit(path),
        None => DataSource::Default(PathBuf::from("deck.csv")),
    };

    tracing::info!(output = %args.output.display(), "building deck");
    let deck = DeckOrchestrator::new(&args.spec, data, args.threads)?;
    let report = deck.build_deck(&args.output)?;
    tracing::info!(
        cards = report.produced(),
        failed = report.failed(),
        "deck built"
    );
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    if !args.image_folder.exists() {
        anyhow::bail!("image folder not found: {}", args.image_folder.display());
    }
    let options = ExportOptions {
        page_size: PageSize::parse(&args.page_size),
        card_width_mm: args.width,
        card_height_mm: args.height,
        gap_mm: args.gap,
        margins_mm: (args.margins[0], args.margins[1]),
    };
    PdfExporter::new(&args.image_folder, &args.output, &options)?.export()?;
    Ok(())
}
