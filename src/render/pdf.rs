use std::path::Path;

use anyhow::{Context, Result};
use genpdf::elements::{Break, FramedElement, LinearLayout, PageBreak, Paragraph, UnorderedList};
use genpdf::fonts::{self, Font, FontFamily};
use genpdf::style::{Color, Style};
use genpdf::{Element, Margins, Mm, PaperSize, Position};
use tracing::info;

use super::{Document, Flowable, TOC_TITLE};
use crate::config::RenderConfig;

pub const BODY_FONT: &str = "LiberationSans";
pub const MONO_FONT: &str = "LiberationMono";

const MARGIN_PT: f64 = 72.0;
const BODY_SIZE: u8 = 10;
const LINE_PT: f64 = 12.0;

pub fn pt_to_mm(pt: f64) -> f64 {
    pt * 25.4 / 72.0
}

/// Heading sizes: 24pt for level 1, shrinking by 2pt per level after that.
pub fn heading_size(level: u8) -> u8 {
    if level <= 1 {
        24
    } else {
        24u8.saturating_sub(level.min(6) * 2)
    }
}

/// Write the document to `config.output`. Nothing is written on failure.
pub fn write(doc: &Document, config: &RenderConfig) -> Result<()> {
    let body = fonts::from_files(&config.fonts_dir, BODY_FONT, None).with_context(|| {
        format!("Failed to load font '{}' from {}", BODY_FONT, config.fonts_dir.display())
    })?;
    let mono = fonts::from_files(&config.fonts_dir, MONO_FONT, None).with_context(|| {
        format!("Failed to load font '{}' from {}", MONO_FONT, config.fonts_dir.display())
    })?;

    let mut pdf = genpdf::Document::new(body);
    let mono = pdf.add_font_family(mono);
    pdf.set_title(doc.title.clone());
    pdf.set_paper_size(PaperSize::Letter);
    pdf.set_font_size(BODY_SIZE);
    pdf.set_page_decorator(FooterDecorator::new(&config.title));

    for flowable in &doc.flowables {
        push_flowable(&mut pdf, flowable, mono);
    }

    write_rendered(&config.output, |buf| {
        pdf.render(buf).context("Failed to render PDF")?;
        Ok(())
    })?;
    info!(
        "Wrote {} ({} flowables, {} forced page breaks, {} TOC entries)",
        config.output.display(),
        doc.flowables.len(),
        doc.page_breaks(),
        doc.outline.len()
    );
    Ok(())
}

/// Render into memory first; `path` is only created once rendering succeeded.
fn write_rendered<F>(path: &Path, render: F) -> Result<()>
where
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let mut buf = Vec::new();
    render(&mut buf)?;
    std::fs::write(path, buf).with_context(|| format!("Failed to write {}", path.display()))
}

fn push_flowable(pdf: &mut genpdf::Document, flowable: &Flowable, mono: FontFamily<Font>) {
    match flowable {
        Flowable::Title(text) | Flowable::GroupHeading(text) | Flowable::PageTitle(text) => {
            pdf.push(Paragraph::new(text.as_str()).styled(Style::new().bold().with_font_size(24)));
        }
        Flowable::TocTitle => {
            pdf.push(Paragraph::new(TOC_TITLE).styled(Style::new().bold().with_font_size(24)));
            pdf.push(Break::new(1.0));
        }
        Flowable::TocEntry { text, level } => {
            let indent = pt_to_mm(f64::from(level.saturating_sub(1)) * 20.0);
            pdf.push(
                Paragraph::new(text.as_str())
                    .styled(Style::new().with_font_size(12))
                    .padded(Margins::trbl(1.0, 0.0, 1.0, indent)),
            );
        }
        Flowable::SourceUrl(url) => {
            pdf.push(
                Paragraph::new(format!("Source: {}", url)).styled(
                    Style::new()
                        .italic()
                        .with_font_size(10)
                        .with_color(Color::Rgb(0, 0, 255)),
                ),
            );
        }
        Flowable::Heading { text, level } => {
            let indent = pt_to_mm(f64::from(level.saturating_sub(1)) * 10.0);
            pdf.push(
                Paragraph::new(text.as_str())
                    .styled(Style::new().bold().with_font_size(heading_size(*level)))
                    .padded(Margins::trbl(0.0, 0.0, 0.0, indent)),
            );
        }
        Flowable::Paragraph(text) => pdf.push(Paragraph::new(text.as_str())),
        Flowable::Code { lines, .. } => {
            let style = Style::new().with_font_family(mono).with_font_size(9);
            let mut layout = LinearLayout::vertical();
            for line in lines {
                layout.push(Paragraph::new(keep_indent(line)).styled(style));
            }
            pdf.push(
                FramedElement::new(layout.padded(Margins::trbl(1.5, 1.5, 1.5, 1.5)))
                    .padded(Margins::trbl(3.5, 7.0, 3.5, 7.0)),
            );
        }
        Flowable::List(items) => {
            let mut list = UnorderedList::new();
            for item in items {
                list.push(Paragraph::new(item.as_str()));
            }
            pdf.push(list.padded(Margins::trbl(0.0, 0.0, 0.0, pt_to_mm(20.0))));
        }
        Flowable::Spacer(points) => pdf.push(Break::new(points / LINE_PT)),
        Flowable::PageBreak => pdf.push(PageBreak::new()),
    }
}

/// Leading spaces would be swallowed by word wrapping; pin them with NBSPs.
fn keep_indent(line: &str) -> String {
    let trimmed = line.trim_start_matches(' ');
    let pad = line.len() - trimmed.len();
    format!("{}{}", "\u{a0}".repeat(pad), trimmed)
}

/// Reserves the page margins and prints the course title and page number at
/// the bottom of every page.
struct FooterDecorator {
    title: String,
    page: usize,
}

impl FooterDecorator {
    fn new(title: &str) -> Self {
        FooterDecorator {
            title: title.to_string(),
            page: 0,
        }
    }
}

impl genpdf::PageDecorator for FooterDecorator {
    fn decorate_page<'a>(
        &mut self,
        context: &genpdf::Context,
        mut area: genpdf::render::Area<'a>,
        style: Style,
    ) -> Result<genpdf::render::Area<'a>, genpdf::error::Error> {
        self.page += 1;
        let margin = pt_to_mm(MARGIN_PT);
        area.add_margins(Margins::trbl(margin, margin, margin / 2.0, margin));

        let footer = style.with_font_size(9);
        let line = footer.line_height(&context.font_cache);
        let size = area.size();
        let y = size.height - line;

        area.print_str(&context.font_cache, Position::new(Mm::from(0.0), y), footer, &self.title)?;
        let label = format!("Page {}", self.page);
        let width = footer.str_width(&context.font_cache, &label);
        area.print_str(&context.font_cache, Position::new(size.width - width, y), footer, &label)?;

        area.set_height(y - Mm::from(pt_to_mm(MARGIN_PT / 2.0)));
        Ok(area)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    #[test]
    fn heading_sizes_shrink_with_level() {
        assert_eq!(heading_size(1), 24);
        assert_eq!(heading_size(2), 20);
        assert_eq!(heading_size(6), 12);
    }

    #[test]
    fn inch_margin_in_mm() {
        assert!((pt_to_mm(MARGIN_PT) - 25.4).abs() < 1e-9);
    }

    #[test]
    fn indentation_survives() {
        assert_eq!(keep_indent("    x = 1"), "\u{a0}\u{a0}\u{a0}\u{a0}x = 1");
        assert_eq!(keep_indent("y"), "y");
    }

    #[test]
    fn failed_render_leaves_no_file() {
        let dir = std::env::temp_dir().join("course_scraper_failed_render");
        std::fs::create_dir_all(&dir).unwrap();
        let output = dir.join("out.pdf");
        let _ = std::fs::remove_file(&output);

        let result = write_rendered(&output, |buf| {
            buf.extend_from_slice(b"%PDF-1.3 partial");
            bail!("page size exceeded")
        });
        assert!(result.is_err());
        assert!(!output.exists());

        write_rendered(&output, |buf| {
            buf.extend_from_slice(b"%PDF-1.3");
            Ok(())
        })
        .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"%PDF-1.3");
        std::fs::remove_file(&output).unwrap();
    }

    #[test]
    fn missing_fonts_fail_without_output() {
        let dir = std::env::temp_dir().join("course_scraper_no_fonts");
        let output = dir.join("out.pdf");
        let config = RenderConfig {
            output: output.clone(),
            fonts_dir: dir.join("missing"),
            title: "T".into(),
        };
        let doc = crate::collector::Collector::new().layout("T");
        assert!(write(&doc, &config).is_err());
        assert!(!output.exists());
    }
}
