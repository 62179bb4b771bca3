use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::blocks::{join_text, normalize_code, ContentBlock, DEFAULT_LANGUAGE};
use super::HeadingOrder;

static MAIN_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("main").unwrap());
static ARTICLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article").unwrap());
static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());
static HEADING_SELS: LazyLock<[Selector; 6]> = LazyLock::new(|| {
    std::array::from_fn(|i| Selector::parse(&format!("h{}", i + 1)).unwrap())
});
static ANY_HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());
static HIGHLIGHT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".highlight").unwrap());
static CODE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("code").unwrap());
static LANGUAGE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[class*="language-"]"#).unwrap());
static LI_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());
static LANGUAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"language-(\w+)").unwrap());

/// Primary content container: `main`, then `article`, then `body`.
pub fn find_container(doc: &Html) -> Option<ElementRef<'_>> {
    [&*MAIN_SEL, &*ARTICLE_SEL, &*BODY_SEL]
        .into_iter()
        .find_map(|sel| doc.select(sel).next())
}

pub fn extract_blocks(doc: &Html, order: HeadingOrder) -> Vec<ContentBlock> {
    let Some(container) = find_container(doc) else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    match order {
        // All h1s first, then all h2s, and so on.
        HeadingOrder::LevelMajor => {
            for (idx, sel) in HEADING_SELS.iter().enumerate() {
                for heading in container.select(sel) {
                    emit_heading_run(heading, idx as u8 + 1, &mut blocks);
                }
            }
        }
        HeadingOrder::Document => {
            for heading in container.select(&ANY_HEADING_SEL) {
                if let Some(level) = heading_level(heading.value().name()) {
                    emit_heading_run(heading, level, &mut blocks);
                }
            }
        }
    }
    blocks
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Emit the heading itself, then every classifiable sibling up to the next
/// heading.
fn emit_heading_run(heading: ElementRef<'_>, level: u8, blocks: &mut Vec<ContentBlock>) {
    let text = join_text(heading.text());
    if !text.is_empty() {
        blocks.push(ContentBlock::Heading { text, level });
    }

    for sibling in heading.next_siblings().filter_map(ElementRef::wrap) {
        if is_or_contains(sibling, &ANY_HEADING_SEL) {
            break;
        }
        if let Some(block) = classify(sibling) {
            blocks.push(block);
        }
    }
}

fn is_or_contains(el: ElementRef<'_>, sel: &Selector) -> bool {
    sel.matches(&el) || el.select(sel).next().is_some()
}

fn classify(el: ElementRef<'_>) -> Option<ContentBlock> {
    let tag = el.value().name();
    if tag == "p" {
        paragraph(el)
    } else if tag == "pre" || is_or_contains(el, &HIGHLIGHT_SEL) {
        code(el)
    } else if tag == "ul" || tag == "ol" {
        list(el)
    } else {
        None
    }
}

fn paragraph(el: ElementRef<'_>) -> Option<ContentBlock> {
    let text = join_text(el.text());
    (!text.is_empty()).then_some(ContentBlock::Paragraph { text })
}

fn code(el: ElementRef<'_>) -> Option<ContentBlock> {
    let source = if CODE_SEL.matches(&el) {
        Some(el)
    } else {
        el.select(&CODE_SEL).next()
    }
    .or_else(|| (el.value().name() == "pre").then_some(el))?;

    let text = normalize_code(&source.text().collect::<String>());
    if text.is_empty() {
        return None;
    }
    let language = detect_language(el).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    Some(ContentBlock::Code { text, language })
}

fn detect_language(el: ElementRef<'_>) -> Option<String> {
    std::iter::once(el)
        .filter(|e| LANGUAGE_SEL.matches(e))
        .chain(el.select(&LANGUAGE_SEL))
        .find_map(|e| {
            let class = e.value().attr("class")?;
            LANGUAGE_RE.captures(class).map(|c| c[1].to_string())
        })
}

fn list(el: ElementRef<'_>) -> Option<ContentBlock> {
    let items: Vec<String> = el
        .select(&LI_SEL)
        .map(|li| join_text(li.text()))
        .filter(|t| !t.is_empty())
        .collect();
    (!items.is_empty()).then_some(ContentBlock::List { items, level: 1 })
}

// ── Tests ──
