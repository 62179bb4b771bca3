pub mod pdf;

use crate::collector::Group;
use crate::parser::ContentBlock;

pub const TOC_TITLE: &str = "Table of Contents";

// Vertical gaps, in points.
pub const TITLE_GAP: f64 = 30.0;
pub const SOURCE_GAP: f64 = 14.4;
pub const BLOCK_GAP: f64 = 7.2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub text: String,
    pub level: u8,
}

/// Renderer-independent layout element.
#[derive(Debug, Clone, PartialEq)]
pub enum Flowable {
    Title(String),
    TocTitle,
    TocEntry { text: String, level: u8 },
    GroupHeading(String),
    PageTitle(String),
    SourceUrl(String),
    Heading { text: String, level: u8 },
    Paragraph(String),
    /// Lines already carry their line numbers.
    Code { language: String, lines: Vec<String> },
    List(Vec<String>),
    Spacer(f64),
    PageBreak,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub outline: Vec<OutlineEntry>,
    pub flowables: Vec<Flowable>,
}

impl Document {
    /// Number of `PageBreak`s, i.e. forced page boundaries.
    pub fn page_breaks(&self) -> usize {
        self.flowables
            .iter()
            .filter(|f| matches!(f, Flowable::PageBreak))
            .count()
    }
}

/// Lay out the collected groups: title page, table of contents, body.
///
/// The outline is computed first from every heading block in reading order,
/// then the body is produced in a second pass over the same groups.
pub fn layout(title: &str, groups: &[Group<'_>]) -> Document {
    let outline = build_outline(groups);

    let mut flowables = vec![
        Flowable::Title(title.to_string()),
        Flowable::Spacer(TITLE_GAP),
        Flowable::PageBreak,
        Flowable::TocTitle,
    ];
    flowables.extend(outline.iter().map(|e| Flowable::TocEntry {
        text: e.text.clone(),
        level: e.level,
    }));
    flowables.push(Flowable::PageBreak);
    flowables.extend(build_body(groups));

    Document {
        title: title.to_string(),
        outline,
        flowables,
    }
}

pub fn build_outline(groups: &[Group<'_>]) -> Vec<OutlineEntry> {
    groups
        .iter()
        .flat_map(|g| g.pages.iter())
        .flat_map(|p| p.headings())
        .map(|(text, level)| OutlineEntry {
            text: text.to_string(),
            level,
        })
        .collect()
}

pub fn build_body(groups: &[Group<'_>]) -> Vec<Flowable> {
    let mut out = Vec::new();
    for group in groups {
        out.push(Flowable::GroupHeading(group.heading.clone()));
        out.push(Flowable::PageBreak);

        for page in &group.pages {
            if !page.title.is_empty() {
                out.push(Flowable::PageTitle(page.title.clone()));
            }
            out.push(Flowable::SourceUrl(page.url.clone()));
            out.push(Flowable::Spacer(SOURCE_GAP));

            for block in &page.blocks {
                out.push(block_flowable(block));
                if matches!(block, ContentBlock::Heading { .. } | ContentBlock::Code { .. }) {
                    out.push(Flowable::Spacer(BLOCK_GAP));
                }
            }
            out.push(Flowable::PageBreak);
        }
    }
    out
}

fn block_flowable(block: &ContentBlock) -> Flowable {
    match block {
        ContentBlock::Heading { text, level } => Flowable::Heading {
            text: text.clone(),
            level: *level,
        },
        ContentBlock::Paragraph { text } => Flowable::Paragraph(text.clone()),
        ContentBlock::Code { text, language } => Flowable::Code {
            language: language.clone(),
            lines: number_lines(text),
        },
        ContentBlock::List { items, .. } => Flowable::List(items.clone()),
    }
}

/// Prefix each line with its 1-based number, left-aligned to three columns.
pub fn number_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:<3} {}", i + 1, line))
        .collect()
}

// ── Tests ──
