use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use rusqlite::Connection;
use scraper::Html;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::collector::Collector;
use crate::config::{CrawlConfig, BASE_BACKOFF_MS, MAX_RETRIES, REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::db::{self, CachedPage};
use crate::frontier::{FetchRequest, Frontier, PRIMARY};
use crate::navigator::{Navigator, PageOutcome};

/// Crawl stats returned after completion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub fetched: usize,
    pub cached: usize,
    pub errors: usize,
    pub recorded: usize,
    pub ignored: usize,
    pub duplicates: usize,
}

#[derive(Debug)]
pub struct FetchedPage {
    pub final_url: String,
    pub status: u16,
    pub html: String,
}

struct Fetched {
    request: FetchRequest,
    result: Result<FetchedPage>,
}

/// Single consumer of fetched pages. Everything that mutates navigation or
/// collection state goes through here, one page at a time.
pub struct Crawl<'a> {
    navigator: &'a mut Navigator,
    collector: &'a mut Collector,
    store: Option<&'a Connection>,
    frontier: Frontier,
    stats: CrawlStats,
    progress: ProgressBar,
}

impl<'a> Crawl<'a> {
    pub fn new(
        navigator: &'a mut Navigator,
        collector: &'a mut Collector,
        store: Option<&'a Connection>,
    ) -> Self {
        Crawl {
            navigator,
            collector,
            store,
            frontier: Frontier::new(),
            stats: CrawlStats::default(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn seed(&mut self, url: &str) {
        self.frontier.push(FetchRequest::new(url, PRIMARY, 0));
    }

    /// Run one fetched page through the navigator and queue its follow-ups.
    pub fn handle_page(&mut self, final_url: &str, html: &str, depth: u32) -> Result<()> {
        let outcome = {
            let doc = Html::parse_document(html);
            self.navigator.process_page(final_url, &doc, depth)
        };

        match outcome {
            PageOutcome::AlreadyVisited => {
                self.stats.duplicates += 1;
            }
            PageOutcome::Ignored { miss, requests } => {
                debug!("Skipped {} ({}), {} links queued", final_url, miss, requests.len());
                self.stats.ignored += 1;
                self.frontier.extend(requests);
            }
            PageOutcome::Recorded { record, requests } => {
                if let Some(conn) = self.store {
                    db::save_records(conn, std::slice::from_ref(&record))?;
                }
                self.progress.set_message(record.title.clone());
                self.progress.inc(1);
                self.collector.record(record);
                self.stats.recorded += 1;
                self.frontier.extend(requests);
            }
        }
        Ok(())
    }

    fn cached(&self, url: &str) -> Result<Option<CachedPage>> {
        match self.store {
            Some(conn) => db::cached_page(conn, url),
            None => Ok(None),
        }
    }

    /// Drain the frontier. Returns once nothing is queued and nothing is in
    /// flight, or the page cap is hit.
    pub async fn run(mut self, config: &CrawlConfig) -> Result<CrawlStats> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        let concurrency = config.concurrency.max(1);
        let (tx, mut rx) = mpsc::channel::<Fetched>(concurrency * 2);

        // interval() panics on a zero period.
        let mut pacer = tokio::time::interval(config.delay.max(Duration::from_millis(1)));
        pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight = 0usize;
        let mut started = 0usize;

        loop {
            while in_flight < concurrency {
                if config.max_pages.is_some_and(|max| started >= max) {
                    break;
                }
                let Some(request) = self.frontier.pop() else {
                    break;
                };
                if self.navigator.is_visited(&request.url) {
                    continue;
                }
                started += 1;

                if config.use_cache {
                    if let Some(page) = self.cached(&request.url)? {
                        self.stats.cached += 1;
                        self.handle_page(&page.final_url, &page.html, request.depth)?;
                        continue;
                    }
                }

                pacer.tick().await;
                in_flight += 1;
                let client = client.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = fetch_with_retry(&client, &request.url).await;
                    let _ = tx.send(Fetched { request, result }).await;
                });
            }

            if in_flight == 0 {
                break;
            }

            let Some(Fetched { request, result }) = rx.recv().await else {
                break;
            };
            in_flight -= 1;

            match result {
                Ok(page) => {
                    self.stats.fetched += 1;
                    if let Some(conn) = self.store {
                        db::save_page(
                            conn,
                            &CachedPage {
                                url: request.url.clone(),
                                final_url: page.final_url.clone(),
                                status: page.status,
                                html: page.html.clone(),
                                depth: request.depth,
                            },
                        )?;
                    }
                    self.handle_page(&page.final_url, &page.html, request.depth)?;
                }
                Err(e) => {
                    warn!("Fetch failed for {}: {:#}", request.url, e);
                    self.stats.errors += 1;
                }
            }
        }

        self.progress.finish_and_clear();
        if !self.frontier.is_empty() {
            info!("Page cap reached with {} URLs still queued", self.frontier.len());
        }
        info!(
            "Crawled {} pages ({} fetched, {} cached, {} errors), {} recorded, {} ignored, {} URLs scheduled",
            self.navigator.visited_count(),
            self.stats.fetched,
            self.stats.cached,
            self.stats.errors,
            self.stats.recorded,
            self.stats.ignored,
            self.frontier.scheduled(),
        );
        Ok(self.stats)
    }
}

/// Crawl the course from `config.start_url`, feeding every curriculum page
/// into `collector`.
pub async fn crawl(
    config: &CrawlConfig,
    navigator: &mut Navigator,
    collector: &mut Collector,
    store: Option<&Connection>,
) -> Result<CrawlStats> {
    let pb = ProgressBar::new(navigator.table().section_count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );

    let mut crawl = Crawl::new(navigator, collector, store).with_progress(pb);
    crawl.seed(&config.start_url);
    crawl.run(config).await
}

fn should_retry(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

async fn fetch_with_retry(client: &Client, url: &str) -> Result<FetchedPage> {
    let mut attempt = 0;
    loop {
        let page = fetch_one(client, url).await?;

        if !should_retry(page.status) || attempt == MAX_RETRIES {
            if !(200..300).contains(&page.status) {
                bail!("HTTP {}", page.status);
            }
            return Ok(page);
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "HTTP {} on {} (attempt {}/{}), backing off {:.1}s",
            page.status,
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

async fn fetch_one(client: &Client, url: &str) -> Result<FetchedPage> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {}", url))?;
    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let html = response.text().await.context("Failed to read response body")?;
    Ok(FetchedPage {
        final_url,
        status,
        html,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::curriculum::{CurriculumTable, Section, Unit, UnitKind};
    use crate::frontier::UNIT_TRANSITION;

    const BASE: &str = "https://huggingface.co/learn/agents-course/";

    fn navigator() -> Navigator {
        let table = CurriculumTable::new(vec![
            Unit::new(
                "unit1",
                "One",
                UnitKind::Main,
                vec![Section::new("a", "A"), Section::new("b", "B")],
            ),
            Unit::new("unit2", "Two", UnitKind::Main, vec![Section::new("a", "A")]),
        ])
        .unwrap();
        Navigator::new(Arc::new(table), BASE)
    }

    fn page_linking_to(href: &str) -> String {
        format!(r#"<html><body><main><h1>T</h1><a href="{href}">x</a></main></body></html>"#)
    }

    #[test]
    fn retry_statuses() {
        assert!(should_retry(429));
        assert!(should_retry(503));
        assert!(!should_retry(404));
        assert!(!should_retry(200));
    }

    #[test]
    fn follow_ups_are_queued_by_priority() {
        let mut nav = navigator();
        let mut collector = Collector::new();
        let mut crawl = Crawl::new(&mut nav, &mut collector, None);

        crawl
            .handle_page(&format!("{BASE}unit1/a"), &page_linking_to("../unit2/a"), 0)
            .unwrap();
        crawl
            .handle_page(&format!("{BASE}unit1/b"), &page_linking_to("a"), 1)
            .unwrap();

        // unit2/a was first seen as a plain link; the unit transition lifts it.
        let mut queued = Vec::new();
        while let Some(r) = crawl.frontier.pop() {
            queued.push((r.url, r.priority));
        }
        assert_eq!(
            queued,
            vec![
                (format!("{BASE}unit1/b"), PRIMARY),
                (format!("{BASE}unit2/a"), UNIT_TRANSITION),
            ]
        );
        assert_eq!(crawl.stats.recorded, 2);
    }

    #[test]
    fn repeated_page_is_counted_once() {
        let mut nav = navigator();
        let mut collector = Collector::new();
        {
            let mut crawl = Crawl::new(&mut nav, &mut collector, None);
            let html = page_linking_to("b");
            crawl.handle_page(&format!("{BASE}unit1/a"), &html, 0).unwrap();
            crawl.handle_page(&format!("{BASE}unit1/a"), &html, 0).unwrap();
            assert_eq!(crawl.stats.recorded, 1);
            assert_eq!(crawl.stats.duplicates, 1);
            assert_eq!(crawl.frontier.len(), 1);
        }
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn records_are_persisted() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let mut nav = navigator();
        let mut collector = Collector::new();
        let mut crawl = Crawl::new(&mut nav, &mut collector, Some(&conn));
        crawl
            .handle_page(&format!("{BASE}unit2/a"), &page_linking_to("#"), 0)
            .unwrap();
        crawl
            .handle_page(&format!("{BASE}unit7/a"), &page_linking_to("#"), 0)
            .unwrap();
        assert_eq!(crawl.stats.ignored, 1);
        let stored = db::fetch_records(&conn).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].placement.as_ref().unwrap().global_order, 2);
    }

    #[tokio::test]
    async fn cached_crawl_needs_no_network() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        for (path, next) in [("unit1/a", "b"), ("unit1/b", "../unit2/a"), ("unit2/a", "#")] {
            let url = format!("{BASE}{path}");
            db::save_page(
                &conn,
                &CachedPage {
                    url: url.clone(),
                    final_url: url,
                    status: 200,
                    html: page_linking_to(next),
                    depth: 0,
                },
            )
            .unwrap();
        }

        let config = CrawlConfig {
            base_url: BASE.to_string(),
            start_url: format!("{BASE}unit1/a"),
            delay: Duration::from_millis(1),
            ..CrawlConfig::default()
        };
        let mut nav = navigator();
        let mut collector = Collector::new();
        let mut crawl = Crawl::new(&mut nav, &mut collector, Some(&conn));
        crawl.seed(&config.start_url);
        let stats = crawl.run(&config).await.unwrap();

        assert_eq!(stats.cached, 3);
        assert_eq!(stats.fetched, 0);
        assert_eq!(stats.recorded, 3);
        let groups = collector.ordered_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].pages.len(), 2);
    }
}
