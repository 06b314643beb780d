//! Print-and-play PDF export.
//!
//! Lays rendered card images out on fixed-size pages, picking whichever of
//! the two cell orientations packs more cards per page. Images embed as
//! 8-bit RGB XObjects, with their alpha channel as a DeviceGray soft mask
//! when present.

use std::path::{Path, PathBuf};

use anyhow::Context;
use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref};

use crate::foundation::error::{CardforgeError, CardforgeResult};

const MM_TO_PT: f64 = 72.0 / 25.4;
const A4_PORTRAIT: (f64, f64) = (210.0 * MM_TO_PT, 297.0 * MM_TO_PT);

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Physical page format, in PDF points.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PageSize {
    A4,
}

impl PageSize {
    /// Only A4 is supported; anything else falls back to it.
    pub fn parse(name: &str) -> Self {
        if !name.eq_ignore_ascii_case("a4") {
            tracing::warn!(page_size = name, "unsupported page size, using A4");
        }
        PageSize::A4
    }

    pub fn dimensions(self) -> (f64, f64) {
        match self {
            PageSize::A4 => A4_PORTRAIT,
        }
    }
}

/// Physical layout of the export, all lengths in millimeters.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub page_size: PageSize,
    pub card_width_mm: f64,
    pub card_height_mm: f64,
    pub gap_mm: f64,
    pub margins_mm: (f64, f64),
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            card_width_mm: 63.5,
            card_height_mm: 88.9,
            gap_mm: 0.0,
            margins_mm: (2.0, 2.0),
        }
    }
}

struct Layout {
    cols: usize,
    rows: usize,
    rotated: bool,
}

/// Tiles the images of a folder onto the pages of a single PDF.
pub struct PdfExporter {
    image_paths: Vec<PathBuf>,
    output_path: PathBuf,
    page_size: (f64, f64),
    card_width: f64,
    card_height: f64,
    gap: f64,
    margins: (f64, f64),
}

impl PdfExporter {
    /// Scan `image_folder` for card images and fix the physical layout.
    pub fn new(
        image_folder: &Path,
        output_path: &Path,
        options: &ExportOptions,
    ) -> CardforgeResult<Self> {
        Ok(Self {
            image_paths: scan_images(image_folder)?,
            output_path: output_path.to_path_buf(),
            page_size: options.page_size.dimensions(),
            card_width: options.card_width_mm * MM_TO_PT,
            card_height: options.card_height_mm * MM_TO_PT,
            gap: options.gap_mm * MM_TO_PT,
            margins: (
                options.margins_mm.0 * MM_TO_PT,
                options.margins_mm.1 * MM_TO_PT,
            ),
        })
    }

    pub fn image_count(&self) -> usize {
        self.image_paths.len()
    }

    /// Write the PDF. An empty folder still produces a document, with zero
    /// pages; cells that cannot fit the page even once are an error.
    pub fn export(&self) -> CardforgeResult<()> {
        let (page_w, page_h) = self.page_size;
        let layout = self.best_layout();
        if layout.cols == 0 || layout.rows == 0 {
            return Err(CardforgeError::validation(
                "the images are too large to fit on the page",
            ));
        }

        let (cell_w, cell_h) = if layout.rotated {
            (self.card_height, self.card_width)
        } else {
            (self.card_width, self.card_height)
        };
        let total_w = layout.cols as f64 * cell_w + (layout.cols - 1) as f64 * self.gap;
        let total_h = layout.rows as f64 * cell_h + (layout.rows - 1) as f64 * self.gap;
        let start_x = (page_w - total_w) / 2.0;
        let start_y = (page_h - total_h) / 2.0;

        let mut pdf = Pdf::new();
        let catalog_id = Ref::new(1);
        let page_tree_id = Ref::new(2);
        pdf.catalog(catalog_id).pages(page_tree_id);

        let mut next_id = 3;
        let mut page_refs = Vec::new();
        for chunk in self.image_paths.chunks(layout.cols * layout.rows) {
            let page_id = Ref::new(next_id);
            let content_id = Ref::new(next_id + 1);
            next_id += 2;

            let mut content = Content::new();
            let mut page_images: Vec<(String, Ref)> = Vec::new();
            for (slot, path) in chunk.iter().enumerate() {
                let image_id = Ref::new(next_id);
                next_id += 1;
                let (px_w, px_h) = embed_image(&mut pdf, path, image_id, &mut next_id)?;
                let name = format!("I{}", image_id.get());

                let col = slot % layout.cols;
                let row = slot / layout.cols;
                let x = start_x + col as f64 * (cell_w + self.gap);
                let y = start_y + row as f64 * (cell_h + self.gap);
                if layout.rotated {
                    draw_rotated(&mut content, &name, x, y, cell_w, cell_h, px_w, px_h);
                } else {
                    draw_cell(&mut content, &name, x, y, cell_w, cell_h, px_w, px_h);
                }
                page_images.push((name, image_id));
            }

            pdf.stream(content_id, &content.finish());
            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, page_w as f32, page_h as f32));
            page.parent(page_tree_id);
            page.contents(content_id);
            {
                let mut resources = page.resources();
                let mut xobjects = resources.x_objects();
                for (name, id) in &page_images {
                    xobjects.pair(Name(name.as_bytes()), *id);
                }
            }
            page.finish();
            page_refs.push(page_id);
        }

        {
            let mut pages = pdf.pages(page_tree_id);
            if page_refs.is_empty() {
                pages.count(0);
            } else {
                pages
                    .kids(page_refs.iter().copied())
                    .count(page_refs.len() as i32);
            }
        }

        std::fs::write(&self.output_path, pdf.finish())
            .with_context(|| format!("writing PDF to {}", self.output_path.display()))?;
        tracing::info!(
            path = %self.output_path.display(),
            images = self.image_paths.len(),
            pages = page_refs.len(),
            "PDF exported"
        );
        Ok(())
    }

    /// Try both cell orientations and keep whichever fits strictly more
    /// cards per page; ties stay unrotated.
    fn best_layout(&self) -> Layout {
        let (page_w, page_h) = self.page_size;
        let mut best = Layout {
            cols: 0,
            rows: 0,
            rotated: false,
        };
        let mut best_fit = 0;
        for rotated in [false, true] {
            let (cell_w, cell_h) = if rotated {
                (self.card_height, self.card_width)
            } else {
                (self.card_width, self.card_height)
            };
            let cols = ((page_w - 2.0 * self.margins.0 + self.gap) / (cell_w + self.gap)) as i64;
            let rows = ((page_h - 2.0 * self.margins.1 + self.gap) / (cell_h + self.gap)) as i64;
            let cols = cols.max(0) as usize;
            let rows = rows.max(0) as usize;
            if cols * rows > best_fit {
                best_fit = cols * rows;
                best = Layout {
                    cols,
                    rows,
                    rotated,
                };
            }
        }
        best
    }
}

fn scan_images(folder: &Path) -> CardforgeResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(folder).map_err(|e| {
        CardforgeError::data(format!("read image folder {}: {e}", folder.display()))
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| {
                CardforgeError::data(format!("read image folder {}: {e}", folder.display()))
            })?
            .path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Write the RGB XObject (plus SMask when the source has alpha) and return
/// the pixel dimensions.
fn embed_image(
    pdf: &mut Pdf,
    path: &Path,
    image_id: Ref,
    next_id: &mut i32,
) -> CardforgeResult<(u32, u32)> {
    let decoded = image::open(path)
        .map_err(|e| CardforgeError::render(format!("decode image {}: {e}", path.display())))?;

    if decoded.color().has_alpha() {
        let rgba = decoded.into_rgba8();
        let (w, h) = rgba.dimensions();
        let mut rgb = Vec::with_capacity(w as usize * h as usize * 3);
        let mut alpha = Vec::with_capacity(w as usize * h as usize);
        for px in rgba.pixels() {
            rgb.extend_from_slice(&px.0[..3]);
            alpha.push(px.0[3]);
        }

        let smask_id = Ref::new(*next_id);
        *next_id += 1;
        {
            let mut smask = pdf.image_xobject(smask_id, &alpha);
            smask.width(w as i32);
            smask.height(h as i32);
            smask.color_space().device_gray();
            smask.bits_per_component(8);
        }
        let mut xobject = pdf.image_xobject(image_id, &rgb);
        xobject.width(w as i32);
        xobject.height(h as i32);
        xobject.color_space().device_rgb();
        xobject.bits_per_component(8);
        xobject.s_mask(smask_id);
        Ok((w, h))
    } else {
        let rgb = decoded.into_rgb8();
        let (w, h) = rgb.dimensions();
        let mut xobject = pdf.image_xobject(image_id, rgb.as_raw());
        xobject.width(w as i32);
        xobject.height(h as i32);
        xobject.color_space().device_rgb();
        xobject.bits_per_component(8);
        Ok((w, h))
    }
}

/// Aspect-preserving fit of a `px_w`x`px_h` image into a box, centered.
/// Returns draw size and the offset inside the box.
fn fit_box(box_w: f64, box_h: f64, px_w: u32, px_h: u32) -> (f64, f64, f64, f64) {
    if px_w == 0 || px_h == 0 {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let scale = (box_w / px_w as f64).min(box_h / px_h as f64);
    let w = px_w as f64 * scale;
    let h = px_h as f64 * scale;
    (w, h, (box_w - w) / 2.0, (box_h - h) / 2.0)
}

fn draw_cell(
    content: &mut Content,
    name: &str,
    x: f64,
    y: f64,
    cell_w: f64,
    cell_h: f64,
    px_w: u32,
    px_h: u32,
) {
    let (w, h, dx, dy) = fit_box(cell_w, cell_h, px_w, px_h);
    content.save_state();
    content.transform([
        w as f32,
        0.0,
        0.0,
        h as f32,
        (x + dx) as f32,
        (y + dy) as f32,
    ]);
    content.x_object(Name(name.as_bytes()));
    content.restore_state();
}

/// The frame turns 90 degrees around the cell center, then the image draws
/// into its natural-orientation box centered there.
fn draw_rotated(
    content: &mut Content,
    name: &str,
    x: f64,
    y: f64,
    cell_w: f64,
    cell_h: f64,
    px_w: u32,
    px_h: u32,
) {
    let (w, h, dx, dy) = fit_box(cell_h, cell_w, px_w, px_h);
    let cx = x + cell_w / 2.0;
    let cy = y + cell_h / 2.0;
    content.save_state();
    content.transform([1.0, 0.0, 0.0, 1.0, cx as f32, cy as f32]);
    content.transform([0.0, 1.0, -1.0, 0.0, 0.0, 0.0]);
    content.transform([
        w as f32,
        0.0,
        0.0,
        h as f32,
        (-cell_h / 2.0 + dx) as f32,
        (-cell_w / 2.0 + dy) as f32,
    ]);
    content.x_object(Name(name.as_bytes()));
    content.restore_state();
}
