mod collector;
mod config;
mod crawler;
mod curriculum;
mod db;
mod frontier;
mod navigator;
mod parser;
mod record;
mod render;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use collector::Collector;
use config::{CrawlConfig, RenderConfig};
use curriculum::CurriculumTable;
use navigator::Navigator;
use parser::HeadingOrder;
use record::PageRecord;

#[derive(Parser)]
#[command(name = "course_scraper", about = "Crawl the Agents Course into a single PDF")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// SQLite file holding cached pages and records
    #[arg(long, global = true, default_value = config::DB_PATH)]
    db: PathBuf,
    /// Course root; only URLs under it are crawled
    #[arg(long, global = true, default_value = config::BASE_URL)]
    base_url: String,
    /// First page to fetch (default: unit0/introduction under the base URL)
    #[arg(long, global = true)]
    start_url: Option<String>,
    /// Output PDF path
    #[arg(short, long, global = true, default_value = config::OUTPUT_PATH)]
    output: PathBuf,
    /// Directory containing the LiberationSans and LiberationMono TTF files
    #[arg(long, global = true, default_value = config::FONTS_DIR)]
    fonts: PathBuf,
    /// Max fetches in flight
    #[arg(long, global = true, default_value_t = config::CONCURRENCY)]
    concurrency: usize,
    /// Pause between request starts, in milliseconds
    #[arg(long, global = true, default_value_t = config::DELAY_MS)]
    delay_ms: u64,
    /// Stop after this many pages
    #[arg(short = 'n', long, global = true)]
    max_pages: Option<usize>,
    /// Always hit the network, ignoring cached pages
    #[arg(long, global = true)]
    no_cache: bool,
    /// Walk headings in document order instead of level by level
    #[arg(long, global = true)]
    document_order: bool,
}

impl GlobalOpts {
    fn crawl_config(&self) -> CrawlConfig {
        let mut base_url = self.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let start_url = self
            .start_url
            .clone()
            .unwrap_or_else(|| format!("{}{}", base_url, config::START_PATH));
        CrawlConfig {
            base_url,
            start_url,
            concurrency: self.concurrency,
            delay: Duration::from_millis(self.delay_ms),
            max_pages: self.max_pages,
            use_cache: !self.no_cache,
            heading_order: if self.document_order {
                HeadingOrder::Document
            } else {
                HeadingOrder::LevelMajor
            },
        }
    }

    fn render_config(&self) -> RenderConfig {
        RenderConfig {
            output: self.output.clone(),
            fonts_dir: self.fonts.clone(),
            ..RenderConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the course, caching pages and storing page records
    Crawl,
    /// Re-extract records from cached pages (no network)
    Process,
    /// Build the PDF from stored records
    Render,
    /// Crawl + render in one pipeline
    Run,
    /// Show page store statistics
    Stats,
    /// Print the curriculum table with global order numbers
    Curriculum,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let crawl_config = cli.opts.crawl_config();
    let render_config = cli.opts.render_config();
    let table = Arc::new(CurriculumTable::agents_course());

    let result = match cli.command {
        Commands::Crawl => {
            let conn = db::connect(&cli.opts.db)?;
            db::init_schema(&conn)?;
            let mut navigator = new_navigator(&table, &crawl_config);
            let mut collector = Collector::new();
            let stats = crawler::crawl(&crawl_config, &mut navigator, &mut collector, Some(&conn)).await?;
            println!(
                "Done: {} pages recorded ({} fetched, {} cached, {} errors, {} ignored).",
                stats.recorded, stats.fetched, stats.cached, stats.errors, stats.ignored
            );
            Ok(())
        }
        Commands::Process => {
            let conn = db::connect(&cli.opts.db)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_cached_pages(&conn)?;
            if pages.is_empty() {
                println!("No cached pages. Run 'crawl' first.");
                return Ok(());
            }
            println!("Processing {} cached pages...", pages.len());
            let navigator = new_navigator(&table, &crawl_config);
            let records = process_pages(&navigator, &pages)?;
            db::clear_records(&conn)?;
            db::save_records(&conn, &records)?;
            println!("Saved {} records.", records.len());
            Ok(())
        }
        Commands::Render => {
            let conn = db::connect(&cli.opts.db)?;
            db::init_schema(&conn)?;
            let records = db::fetch_records(&conn)?;
            if records.is_empty() {
                println!("No records. Run 'crawl' or 'process' first.");
                return Ok(());
            }
            let mut collector = Collector::new();
            for record in records {
                collector.record(record);
            }
            render_collected(&collector, &render_config)
        }
        Commands::Run => {
            let conn = db::connect(&cli.opts.db)?;
            db::init_schema(&conn)?;

            // Phase 1: Crawl
            let t_crawl = Instant::now();
            let mut navigator = new_navigator(&table, &crawl_config);
            let mut collector = Collector::new();
            let stats = crawler::crawl(&crawl_config, &mut navigator, &mut collector, Some(&conn)).await?;
            println!(
                "Crawled {} pages ({} fetched, {} cached, {} errors) in {:.1}s",
                stats.recorded + stats.ignored,
                stats.fetched,
                stats.cached,
                stats.errors,
                t_crawl.elapsed().as_secs_f64()
            );
            if collector.is_empty() {
                println!("Nothing to render (no curriculum pages were recorded).");
                return Ok(());
            }

            // Phase 2: Render
            render_collected(&collector, &render_config)
        }
        Commands::Stats => {
            let conn = db::connect(&cli.opts.db)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Cached pages: {}", s.pages);
            println!("Records:      {} / {}", s.records, table.section_count());
            println!("Units:        {}", s.units);
            println!("Blocks:       {}", s.blocks);
            Ok(())
        }
        Commands::Curriculum => {
            print_curriculum(&table);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn new_navigator(table: &Arc<CurriculumTable>, config: &CrawlConfig) -> Navigator {
    Navigator::new(Arc::clone(table), &config.base_url).with_heading_order(config.heading_order)
}

fn render_collected(collector: &Collector, config: &RenderConfig) -> Result<()> {
    let document = collector.layout(&config.title);
    info!(
        "Rendering {} pages, {} headings in table of contents",
        collector.len(),
        document.outline.len()
    );
    render::pdf::write(&document, config)?;
    println!("Wrote {}", config.output.display());
    Ok(())
}

/// Rebuild records from cached HTML in parallel. Pages that redirected to the
/// same final URL yield a single record.
fn process_pages(navigator: &Navigator, pages: &[db::CachedPage]) -> Result<Vec<PageRecord>> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut by_url: BTreeMap<String, PageRecord> = BTreeMap::new();
    for chunk in pages.chunks(500) {
        let results: Vec<Option<PageRecord>> = chunk
            .par_iter()
            .map(|page| {
                let doc = scraper::Html::parse_document(&page.html);
                navigator.build_record(&page.final_url, &doc, page.depth)
            })
            .collect();
        for record in results.into_iter().flatten() {
            by_url.entry(record.url.clone()).or_insert(record);
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(by_url.into_values().collect())
}

fn print_curriculum(table: &CurriculumTable) {
    println!(
        "{:>3} | {:<12} | {:>2} | {:<4} | {:<36} | {:<40} | {}",
        "#", "Unit", "§", "Sub", "Path", "Title", "Flags"
    );
    println!("{}", "-".repeat(120));

    let mut global = 0;
    for unit in table.units() {
        for (i, section) in unit.sections.iter().enumerate() {
            let mut flags = Vec::new();
            if section.optional {
                flags.push("optional");
            }
            if section.quiz {
                flags.push("quiz");
            }
            if section.conclusion {
                flags.push("conclusion");
            }
            println!(
                "{:>3} | {:<12} | {:>2} | {:<4} | {:<36} | {:<40} | {}",
                global,
                unit.id,
                i + 1,
                section.sub_section.as_deref().unwrap_or(""),
                truncate(&section.path, 36),
                truncate(&section.title, 40),
                flags.join(",")
            );
            global += 1;
        }
    }

    println!(
        "\n{} units ({} main, {} bonus), {} sections",
        table.units().len(),
        table
            .units()
            .iter()
            .filter(|u| u.kind == curriculum::UnitKind::Main)
            .count(),
        table
            .units()
            .iter()
            .filter(|u| u.kind == curriculum::UnitKind::Bonus)
            .count(),
        table.section_count()
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
