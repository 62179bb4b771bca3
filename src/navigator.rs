use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::Html;
use tracing::debug;

use crate::curriculum::{CurriculumTable, Section, Unit, UnitKind};
use crate::frontier::{FetchRequest, DISCOVERED, PRIMARY, UNIT_TRANSITION};
use crate::parser::{self, links, HeadingOrder};
use crate::record::{LessonType, PageRecord, Placement};

static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(bonus-)?unit(\d+)").unwrap());
static MAIN_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^unit(\d+)$").unwrap());

/// Why a URL did not map onto the curriculum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Miss {
    OutsideBase,
    NoUnitToken,
    UnknownUnit(String),
    UnknownSection { unit: String, path: String },
}

impl fmt::Display for Miss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Miss::OutsideBase => write!(f, "outside the course base URL"),
            Miss::NoUnitToken => write!(f, "no unit in path"),
            Miss::UnknownUnit(unit) => write!(f, "unknown unit '{}'", unit),
            Miss::UnknownSection { unit, path } => {
                write!(f, "unknown section '{}' in {}", path, unit)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub unit: &'a Unit,
    pub section: &'a Section,
    /// 0-based index of the section within its unit.
    pub position: usize,
    pub global_order: usize,
}

/// Found section, or the reason the page is ignored.
pub type Resolution<'a> = Result<Resolved<'a>, Miss>;

/// Result of handing one fetched page to the navigator.
#[derive(Debug)]
pub enum PageOutcome {
    /// The URL was processed earlier in this run. Nothing emitted.
    AlreadyVisited,
    /// Not a curriculum page; only discovered links are followed.
    Ignored { miss: Miss, requests: Vec<FetchRequest> },
    Recorded {
        record: PageRecord,
        requests: Vec<FetchRequest>,
    },
}

/// Walks the curriculum: maps fetched URLs to sections and decides what to
/// fetch next.
pub struct Navigator {
    table: Arc<CurriculumTable>,
    base: String,
    heading_order: HeadingOrder,
    visited: HashSet<String>,
}

impl Navigator {
    pub fn new(table: Arc<CurriculumTable>, base: &str) -> Self {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Navigator {
            table,
            base,
            heading_order: HeadingOrder::default(),
            visited: HashSet::new(),
        }
    }

    pub fn with_heading_order(mut self, order: HeadingOrder) -> Self {
        self.heading_order = order;
        self
    }

    pub fn table(&self) -> &CurriculumTable {
        &self.table
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(&self.canonical_url(url))
    }

    /// Query and fragment dropped; trailing slashes trimmed below the base.
    /// Every URL that reaches the visited set or a record goes through here.
    pub fn canonical_url(&self, url: &str) -> String {
        let url = url.split(['?', '#']).next().unwrap_or_default();
        match url.strip_prefix(self.base.as_str()) {
            Some(rest) => format!("{}{}", self.base, rest.trim_end_matches('/')),
            None => url.to_string(),
        }
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn url_for(&self, unit: &str, path: &str) -> String {
        format!("{}{}/{}", self.base, unit, path)
    }

    /// Map a URL onto a curriculum section.
    pub fn resolve(&self, url: &str) -> Resolution<'_> {
        let rest = url.strip_prefix(self.base.as_str()).ok_or(Miss::OutsideBase)?;
        let rest = rest.split(['?', '#']).next().unwrap_or_default();

        let token = UNIT_RE.find(rest).ok_or(Miss::NoUnitToken)?;
        let unit_id = token.as_str();
        let path = rest[token.end()..].trim_matches('/');

        let unit_idx = self
            .table
            .unit_index(unit_id)
            .ok_or_else(|| Miss::UnknownUnit(unit_id.to_string()))?;
        let unit = &self.table.units()[unit_idx];
        let position = unit
            .section_index(path)
            .ok_or_else(|| Miss::UnknownSection {
                unit: unit_id.to_string(),
                path: path.to_string(),
            })?;

        Ok(Resolved {
            unit,
            section: &unit.sections[position],
            position,
            global_order: self.table.sections_before(unit_idx) + position,
        })
    }

    /// Handle a fetched page. Each URL is processed once per run.
    pub fn process_page(&mut self, url: &str, doc: &Html, depth: u32) -> PageOutcome {
        let url = self.canonical_url(url);
        if !self.visited.insert(url.clone()) {
            return PageOutcome::AlreadyVisited;
        }
        let url = url.as_str();

        match self.resolve(url) {
            Ok(resolved) => {
                let record = self.record_for(&resolved, url, doc, depth);
                let mut requests = self.next_requests(&resolved, depth);
                requests.extend(self.discovered_requests(doc, url, depth));
                PageOutcome::Recorded { record, requests }
            }
            Err(miss) => {
                debug!("Ignoring {}: {}", url, miss);
                let requests = match miss {
                    Miss::OutsideBase => Vec::new(),
                    _ => self.discovered_requests(doc, url, depth),
                };
                PageOutcome::Ignored { miss, requests }
            }
        }
    }

    /// Build the record for a page without touching the visited set.
    pub fn build_record(&self, url: &str, doc: &Html, depth: u32) -> Option<PageRecord> {
        let url = self.canonical_url(url);
        let resolved = self.resolve(&url).ok()?;
        Some(self.record_for(&resolved, &url, doc, depth))
    }

    fn record_for(&self, resolved: &Resolved<'_>, url: &str, doc: &Html, depth: u32) -> PageRecord {
        let Resolved {
            unit,
            section,
            position,
            global_order,
        } = *resolved;

        PageRecord {
            url: url.to_string(),
            title: section.title.clone(),
            blocks: parser::extract(doc, self.heading_order),
            depth,
            placement: Some(Placement {
                unit: unit.id.clone(),
                unit_title: unit.title.clone(),
                unit_order: position + 1,
                kind: unit.kind,
                sub_section: section.sub_section.clone(),
                optional: section.optional,
                quiz: section.quiz,
                conclusion: section.conclusion,
                lesson_type: LessonType::classify(section),
                global_order,
            }),
        }
    }

    /// Primary follow-up: the next section, or the first section of the next
    /// main unit once a main unit is exhausted.
    pub fn next_requests(&self, resolved: &Resolved<'_>, depth: u32) -> Vec<FetchRequest> {
        let unit = resolved.unit;
        let candidate = match unit.sections.get(resolved.position + 1) {
            Some(next) => Some((self.url_for(&unit.id, &next.path), PRIMARY)),
            None if unit.kind == UnitKind::Main => self
                .next_main_unit(&unit.id)
                .map(|next| (self.url_for(&next.id, &next.sections[0].path), UNIT_TRANSITION)),
            None => None,
        };

        candidate
            .filter(|(url, _)| !self.visited.contains(url))
            .map(|(url, priority)| FetchRequest::new(url, priority, depth + 1))
            .into_iter()
            .collect()
    }

    fn next_main_unit(&self, unit_id: &str) -> Option<&Unit> {
        let caps = MAIN_UNIT_RE.captures(unit_id)?;
        let n: u32 = caps[1].parse().ok()?;
        self.table
            .unit(&format!("unit{}", n + 1))
            .filter(|u| u.kind == UnitKind::Main)
    }

    fn discovered_requests(&self, doc: &Html, url: &str, depth: u32) -> Vec<FetchRequest> {
        links::discover_links(doc, url, &self.base)
            .into_iter()
            .map(|link| self.canonical_url(&link))
            .filter(|link| !self.visited.contains(link))
            .map(|link| FetchRequest::new(link, DISCOVERED, depth + 1))
            .collect()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://huggingface.co/learn/agents-course/";

    fn course() -> Navigator {
        Navigator::new(Arc::new(CurriculumTable::agents_course()), BASE)
    }

    fn small() -> Navigator {
        let table = CurriculumTable::new(vec![
            Unit::new(
                "unit1",
                "One",
                UnitKind::Main,
                vec![
                    Section::new("a", "A"),
                    Section::new("b", "B"),
                    Section::new("c", "C"),
                ],
            ),
            Unit::new(
                "unit2",
                "Two",
                UnitKind::Main,
                vec![Section::new("a", "A"), Section::new("b", "B")],
            ),
        ])
        .unwrap();
        Navigator::new(Arc::new(table), BASE)
    }

    fn empty_page() -> Html {
        Html::parse_document("<html><body><main></main></body></html>")
    }

    #[test]
    fn global_order_follows_declaration() {
        let nav = course();
        let a = nav.resolve(&format!("{BASE}unit1/introduction")).unwrap().global_order;
        let b = nav.resolve(&format!("{BASE}unit1/tutorial")).unwrap().global_order;
        let c = nav.resolve(&format!("{BASE}unit2/introduction")).unwrap().global_order;
        assert!(a < b && b < c);
    }

    #[test]
    fn global_order_strictly_increasing_over_table() {
        let nav = course();
        let mut last = None;
        for unit in nav.table().units() {
            for section in &unit.sections {
                let order = nav.resolve(&nav.url_for(&unit.id, &section.path)).unwrap().global_order;
                if let Some(prev) = last {
                    assert!(order > prev, "{}/{} not after {}", unit.id, section.path, prev);
                }
                last = Some(order);
            }
        }
        assert_eq!(last, Some(nav.table().section_count() - 1));
    }

    #[test]
    fn second_section_of_second_unit() {
        let nav = small();
        let r = nav.resolve(&format!("{BASE}unit2/b")).unwrap();
        assert_eq!(r.global_order, 4);
        assert_eq!(r.position, 1);
    }

    #[test]
    fn bonus_units_resolve_and_order_by_table() {
        let nav = course();
        let bonus = nav.resolve(&format!("{BASE}bonus-unit1/introduction")).unwrap();
        assert_eq!(bonus.unit.id, "bonus-unit1");
        let unit4_last = nav.resolve(&format!("{BASE}unit4/additional-readings")).unwrap();
        assert_eq!(bonus.global_order, unit4_last.global_order + 1);
    }

    #[test]
    fn nested_paths_and_trailing_slash() {
        let nav = course();
        let r = nav
            .resolve(&format!("{BASE}unit2/smolagents/tools/?utm=x#top"))
            .unwrap();
        assert_eq!(r.section.path, "smolagents/tools");
        assert_eq!(r.section.sub_section.as_deref(), Some("2.1"));
    }

    #[test]
    fn misses_are_explicit() {
        let nav = course();
        assert_eq!(
            nav.resolve("https://example.com/unit1/introduction").unwrap_err(),
            Miss::OutsideBase
        );
        assert_eq!(nav.resolve(BASE).unwrap_err(), Miss::NoUnitToken);
        assert_eq!(
            nav.resolve(&format!("{BASE}unit9/introduction")).unwrap_err(),
            Miss::UnknownUnit("unit9".into())
        );
        assert!(matches!(
            nav.resolve(&format!("{BASE}unit1/nope")).unwrap_err(),
            Miss::UnknownSection { .. }
        ));
    }

    #[test]
    fn next_section_is_primary() {
        let mut nav = small();
        let outcome = nav.process_page(&format!("{BASE}unit1/a"), &empty_page(), 0);
        let PageOutcome::Recorded { requests, .. } = outcome else {
            panic!("expected a record");
        };
        assert_eq!(requests, vec![FetchRequest::new(format!("{BASE}unit1/b"), PRIMARY, 1)]);
    }

    #[test]
    fn end_of_main_unit_moves_to_next_unit() {
        let mut nav = small();
        let outcome = nav.process_page(&format!("{BASE}unit1/c"), &empty_page(), 2);
        let PageOutcome::Recorded { requests, .. } = outcome else {
            panic!("expected a record");
        };
        assert_eq!(
            requests,
            vec![FetchRequest::new(format!("{BASE}unit2/a"), UNIT_TRANSITION, 3)]
        );
    }

    #[test]
    fn last_unit_and_bonus_units_stop() {
        let mut nav = course();
        let outcome = nav.process_page(&format!("{BASE}unit4/additional-readings"), &empty_page(), 0);
        assert!(matches!(outcome, PageOutcome::Recorded { ref requests, .. } if requests.is_empty()));

        let outcome = nav.process_page(&format!("{BASE}bonus-unit1/conclusion"), &empty_page(), 0);
        assert!(matches!(outcome, PageOutcome::Recorded { ref requests, .. } if requests.is_empty()));
    }

    #[test]
    fn visited_next_section_not_requested() {
        let mut nav = small();
        nav.process_page(&format!("{BASE}unit1/b"), &empty_page(), 0);
        let PageOutcome::Recorded { requests, .. } =
            nav.process_page(&format!("{BASE}unit1/a"), &empty_page(), 0)
        else {
            panic!("expected a record");
        };
        assert!(requests.is_empty());
    }

    #[test]
    fn discovered_links_are_low_priority() {
        let mut nav = small();
        let doc = Html::parse_document(
            r#"<html><body><main><a href="../unit2/b">x</a><a href="https://other.org/">y</a></main></body></html>"#,
        );
        let PageOutcome::Recorded { requests, .. } =
            nav.process_page(&format!("{BASE}unit1/a"), &doc, 0)
        else {
            panic!("expected a record");
        };
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1], FetchRequest::new(format!("{BASE}unit2/b"), DISCOVERED, 1));
    }

    #[test]
    fn unknown_page_emits_no_record_and_no_primary() {
        let mut nav = small();
        let doc = Html::parse_document(
            r#"<html><body><a href="unit1/a">start</a></body></html>"#,
        );
        let outcome = nav.process_page(BASE, &doc, 0);
        let PageOutcome::Ignored { miss, requests } = outcome else {
            panic!("expected ignored page");
        };
        assert_eq!(miss, Miss::NoUnitToken);
        assert!(requests.iter().all(|r| r.priority == DISCOVERED));
        assert_eq!(requests[0].url, format!("{BASE}unit1/a"));

        let outcome = nav.process_page("https://example.com/unit1/a", &doc, 0);
        assert!(matches!(outcome, PageOutcome::Ignored { ref requests, .. } if requests.is_empty()));
    }

    #[test]
    fn second_visit_is_a_no_op() {
        let mut nav = small();
        let url = format!("{BASE}unit1/a");
        let first = nav.process_page(&url, &empty_page(), 0);
        assert!(matches!(first, PageOutcome::Recorded { .. }));
        let second = nav.process_page(&url, &empty_page(), 0);
        assert!(matches!(second, PageOutcome::AlreadyVisited));
        assert_eq!(nav.visited_count(), 1);
    }

    #[test]
    fn url_variants_of_one_section_are_recorded_once() {
        let mut nav = course();
        let first = nav.process_page(&format!("{BASE}unit1/tools"), &empty_page(), 0);
        assert!(matches!(first, PageOutcome::Recorded { .. }));
        for variant in ["unit1/tools?fw=pt", "unit1/tools/", "unit1/tools/#top"] {
            let outcome = nav.process_page(&format!("{BASE}{variant}"), &empty_page(), 0);
            assert!(matches!(outcome, PageOutcome::AlreadyVisited), "{variant}");
        }
        assert_eq!(nav.visited_count(), 1);
        assert!(nav.is_visited(&format!("{BASE}unit1/tools?x=1")));
    }

    #[test]
    fn records_and_links_use_canonical_urls() {
        let mut nav = small();
        let doc = Html::parse_document(
            r#"<html><body><main><a href="../unit2/b/?ref=nav#x">x</a></main></body></html>"#,
        );
        let PageOutcome::Recorded { record, requests } =
            nav.process_page(&format!("{BASE}unit1/a/?utm=1"), &doc, 0)
        else {
            panic!("expected a record");
        };
        assert_eq!(record.url, format!("{BASE}unit1/a"));
        assert_eq!(requests[1].url, format!("{BASE}unit2/b"));

        let rebuilt = nav.build_record(&format!("{BASE}unit1/a/"), &doc, 0).unwrap();
        assert_eq!(rebuilt.url, record.url);
    }

    #[test]
    fn canonical_base_keeps_its_slash() {
        let nav = small();
        assert_eq!(nav.canonical_url(&format!("{BASE}?q=1")), BASE);
        assert_eq!(nav.canonical_url("https://other.org/x/?a"), "https://other.org/x/");
    }

    #[test]
    fn record_carries_placement() {
        let nav = course();
        let doc = Html::parse_document("<html><body><main><h1>Quiz</h1></main></body></html>");
        let record = nav
            .build_record(&format!("{BASE}unit2/llama-index/quiz1"), &doc, 4)
            .unwrap();
        let placement = record.placement.unwrap();
        assert_eq!(record.title, "Quick Quiz 1");
        assert_eq!(placement.unit, "unit2");
        assert_eq!(placement.unit_order, 18);
        assert_eq!(placement.sub_section.as_deref(), Some("2.2"));
        assert_eq!(placement.lesson_type, LessonType::Quiz);
        assert!(placement.quiz);
        assert_eq!(record.depth, 4);
        assert_eq!(record.blocks.len(), 1);
        assert!(!nav.is_visited(&record.url));
    }
}
