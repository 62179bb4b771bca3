use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::record::PageRecord;
use crate::render::{self, Document};

static UNIT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(bonus-)?unit(\d+)$").unwrap());

/// Order given to pages the legacy slug table does not know.
pub const UNKNOWN_ORDER: usize = 999;

/// Canonical order for early-course slugs, used when a page carries no
/// curriculum position of its own.
pub fn legacy_order(slug: &str) -> usize {
    match slug {
        // unit 0
        "introduction" => 1,
        "onboarding" => 2,
        "discord101" => 3,
        // unit 1
        "what-are-agents" => 1,
        "what-are-llms" => 2,
        "messages-and-special-tokens" => 3,
        "tools" => 4,
        "agent-steps-and-structure" => 5,
        "thoughts" => 6,
        "actions" => 7,
        "observations" => 8,
        "dummy-agent-library" => 9,
        "tutorial" => 10,
        "quiz1" => 11,
        "quiz2" => 12,
        "final-quiz" => 13,
        "conclusion" => 14,
        _ => UNKNOWN_ORDER,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Unit(String),
    /// Pages without a curriculum placement, bucketed by crawl depth.
    Depth(u32),
}

impl GroupKey {
    pub fn for_record(record: &PageRecord) -> Self {
        match &record.placement {
            Some(p) => GroupKey::Unit(p.unit.clone()),
            None => GroupKey::Depth(record.depth),
        }
    }

    /// Main units by number, then bonus units by number, then anything else.
    fn sort_key(&self) -> (u8, u64, &str) {
        match self {
            GroupKey::Unit(id) => match UNIT_ID_RE.captures(id) {
                Some(caps) => {
                    let n = caps[2].parse().unwrap_or(u64::MAX);
                    let rank = if caps.get(1).is_some() { 1 } else { 0 };
                    (rank, n, id.as_str())
                }
                None => (2, 0, id.as_str()),
            },
            GroupKey::Depth(d) => (3, u64::from(*d), ""),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Unit(id) => write!(f, "{}", id),
            GroupKey::Depth(d) => write!(f, "depth_{}", d),
        }
    }
}

/// One unit (or depth bucket) with its pages in reading order.
#[derive(Debug)]
pub struct Group<'a> {
    pub heading: String,
    pub pages: Vec<&'a PageRecord>,
}

/// Accumulates page records for the final document.
#[derive(Debug, Default)]
pub struct Collector {
    groups: HashMap<GroupKey, Vec<PageRecord>>,
    count: usize,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: PageRecord) {
        self.count += 1;
        self.groups
            .entry(GroupKey::for_record(&record))
            .or_default()
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Groups and pages in document order.
    pub fn ordered_groups(&self) -> Vec<Group<'_>> {
        let mut keys: Vec<&GroupKey> = self.groups.keys().collect();
        keys.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        keys.into_iter()
            .map(|key| {
                let mut pages: Vec<&PageRecord> = self.groups[key].iter().collect();
                pages.sort_by(|a, b| {
                    page_order(a)
                        .cmp(&page_order(b))
                        .then_with(|| a.url.cmp(&b.url))
                });
                Group {
                    heading: group_heading(key, &pages),
                    pages,
                }
            })
            .collect()
    }

    pub fn layout(&self, title: &str) -> Document {
        render::layout(title, &self.ordered_groups())
    }
}

fn page_order(record: &PageRecord) -> usize {
    match &record.placement {
        Some(p) => p.unit_order,
        None => legacy_order(record.slug()),
    }
}

fn group_heading(key: &GroupKey, pages: &[&PageRecord]) -> String {
    let GroupKey::Unit(id) = key else {
        return key.to_string();
    };
    let label = match UNIT_ID_RE.captures(id) {
        Some(caps) if caps.get(1).is_some() => format!("Bonus Unit {}", &caps[2]),
        Some(caps) => format!("Unit {}", &caps[2]),
        None => id.clone(),
    };
    let unit_title = pages
        .iter()
        .find_map(|p| p.placement.as_ref())
        .map(|p| p.unit_title.as_str())
        .filter(|t| !t.is_empty());
    match unit_title {
        Some(t) => format!("{}: {}", label, t),
        None => label,
    }
}

// ── Tests ──
