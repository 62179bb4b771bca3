use std::collections::HashSet;
use std::sync::LazyLock;

use reqwest::Url;
use scraper::{Html, Selector};

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// In-course links on a page: every `a[href]` resolved against the page URL,
/// fragment removed, kept only under `base`. First-seen order, no duplicates.
pub fn discover_links(doc: &Html, page_url: &str, base: &str) -> Vec<String> {
    let Ok(page) = Url::parse(page_url) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in doc.select(&ANCHOR_SEL) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = page.join(href.trim()) else {
            continue;
        };
        url.set_fragment(None);
        let url = String::from(url);
        if !url.starts_with(base) || seen.contains(&url) {
            continue;
        }
        seen.insert(url.clone());
        links.push(url);
    }

    links
}

// ── Tests ──
