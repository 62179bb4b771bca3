pub mod blocks;
pub mod content;
pub mod links;

use scraper::Html;

pub use blocks::ContentBlock;

/// How headings are visited while walking a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeadingOrder {
    /// Every h1 on the page, then every h2, down to h6.
    #[default]
    LevelMajor,
    /// Headings in the order they appear in the document.
    Document,
}

/// Normalize a page into content blocks.
pub fn extract(doc: &Html, order: HeadingOrder) -> Vec<ContentBlock> {
    content::extract_blocks(doc, order)
}
