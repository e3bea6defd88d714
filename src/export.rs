//! Save processed text as a file the user can download.
//!
//! Two formats: plain `.txt`, and an A4 `.pdf` with a title, the creation
//! date and the text word-wrapped underneath.  When the PDF cannot be built
//! (e.g. the font file is unreadable) the text is saved as `.txt` instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use printpdf::*;

const PDF_TITLE: &str = "Обработанный текст";
/// Characters per body line.
const WRAP_WIDTH: usize = 90;

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN: Mm = Mm(17.6);
const TOP: Mm = Mm(279.4);
const LINE_HEIGHT: Mm = Mm(4.9);

/// TrueType fonts with Cyrillic coverage, tried in order.  The built-in
/// Helvetica only covers Latin-1.
const UNICODE_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

// ---------------------------------------------------------------------------
// ExportFormat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Txt,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "txt" => Ok(ExportFormat::Txt),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(format!("unknown export format '{other}' (expected txt or pdf)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Save `text` in `format` under `dir` and return the written path.
pub fn export(dir: &Path, user_id: u64, text: &str, format: ExportFormat) -> Result<PathBuf> {
    match format {
        ExportFormat::Txt => export_txt(dir, user_id, text),
        ExportFormat::Pdf => export_pdf(dir, user_id, text),
    }
}

/// Write `text` to `<dir>/text_<user>_<YYYYmmdd_HHMMSS>.txt` and return the
/// path.  Creates `dir` when missing.
pub fn export_txt(dir: &Path, user_id: u64, text: &str) -> Result<PathBuf> {
    let path = target_path(dir, user_id, &Local::now(), ExportFormat::Txt)?;
    std::fs::write(&path, text)
        .with_context(|| format!("cannot write {}", path.display()))?;
    log::info!("exported {} chars to {}", text.chars().count(), path.display());
    Ok(path)
}

/// Write `text` as a PDF using the first Cyrillic-capable system font found
/// (built-in Helvetica otherwise).
pub fn export_pdf(dir: &Path, user_id: u64, text: &str) -> Result<PathBuf> {
    let font = find_unicode_font();
    export_pdf_with_font(dir, user_id, text, font.as_deref())
}

/// Write `text` as a PDF rendered with the TrueType font at `font`, or the
/// built-in Helvetica when `None`.  Falls back to [`export_txt`] when the
/// PDF cannot be built.
pub fn export_pdf_with_font(
    dir: &Path,
    user_id: u64,
    text: &str,
    font: Option<&Path>,
) -> Result<PathBuf> {
    let now = Local::now();
    let path = target_path(dir, user_id, &now, ExportFormat::Pdf)?;

    let bytes = match render_pdf(text, &now, font) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("PDF export failed ({e:#}); saving as TXT instead");
            return export_txt(dir, user_id, text);
        }
    };

    std::fs::write(&path, bytes)
        .with_context(|| format!("cannot write {}", path.display()))?;
    log::info!("exported {} chars to {}", text.chars().count(), path.display());
    Ok(path)
}

fn target_path(
    dir: &Path,
    user_id: u64,
    now: &DateTime<Local>,
    format: ExportFormat,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create export dir {}", dir.display()))?;
    let timestamp = now.format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("text_{user_id}_{timestamp}.{}", format.extension())))
}

fn find_unicode_font() -> Option<PathBuf> {
    UNICODE_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

fn render_pdf(text: &str, created: &DateTime<Local>, font: Option<&Path>) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(PDF_TITLE, PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");

    let (title_font, body_font) = match font {
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("cannot read font {}", path.display()))?;
            let title = doc
                .add_external_font(data.as_slice())
                .map_err(|e| anyhow!("cannot load font {}: {e}", path.display()))?;
            let body = doc
                .add_external_font(data.as_slice())
                .map_err(|e| anyhow!("cannot load font {}: {e}", path.display()))?;
            (title, body)
        }
        None => {
            let title = doc
                .add_builtin_font(BuiltinFont::HelveticaBold)
                .map_err(|e| anyhow!("cannot add font: {e}"))?;
            let body = doc
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(|e| anyhow!("cannot add font: {e}"))?;
            (title, body)
        }
    };

    let mut current_layer = doc.get_page(page).get_layer(layer);
    let mut y = TOP;

    current_layer.use_text(PDF_TITLE, 14.0, MARGIN, y, &title_font);
    y -= Mm(10.6);
    let created = format!("Создано: {}", created.format("%d.%m.%Y %H:%M"));
    current_layer.use_text(created, 10.0, MARGIN, y, &body_font);
    y -= Mm(14.1);

    for line in wrap_text(text, WRAP_WIDTH) {
        if y < MARGIN {
            let (new_page, new_layer) = doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
            current_layer = doc.get_page(new_page).get_layer(new_layer);
            y = TOP;
        }
        current_layer.use_text(line, 11.0, MARGIN, y, &body_font);
        y -= LINE_HEIGHT;
    }

    doc.save_to_bytes()
        .map_err(|e| anyhow!("cannot render PDF: {e}"))
}

/// Greedy word wrap to `width` characters per line.  Paragraph breaks are
/// kept; words longer than `width` are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(width) {
                let piece_len = piece.len();
                if current_len > 0 && current_len + 1 + piece_len > width {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                if current_len > 0 {
                    current.push(' ');
                    current_len += 1;
                }
                current.extend(piece);
                current_len += piece_len;
            }
        }
        lines.push(current);
    }

    lines
}
