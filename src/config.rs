use std::path::PathBuf;
use std::time::Duration;

use crate::parser::HeadingOrder;

pub const BASE_URL: &str = "https://huggingface.co/learn/agents-course/";
pub const START_PATH: &str = "unit0/introduction";
pub const DB_PATH: &str = "data/course.sqlite";
pub const OUTPUT_PATH: &str = "course_content.pdf";
pub const FONTS_DIR: &str = "fonts";
pub const DOCUMENT_TITLE: &str = "Hugging Face Agents Course";

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; course_scraper/0.1)";
pub const CONCURRENCY: usize = 8;
pub const DELAY_MS: u64 = 1000;
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
pub const MAX_RETRIES: u32 = 3;
pub const BASE_BACKOFF_MS: u64 = 2000;

/// Everything the crawl loop needs, assembled from CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: String,
    pub start_url: String,
    pub concurrency: usize,
    pub delay: Duration,
    pub max_pages: Option<usize>,
    pub use_cache: bool,
    pub heading_order: HeadingOrder,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            base_url: BASE_URL.to_string(),
            start_url: format!("{}{}", BASE_URL, START_PATH),
            concurrency: CONCURRENCY,
            delay: Duration::from_millis(DELAY_MS),
            max_pages: None,
            use_cache: true,
            heading_order: HeadingOrder::LevelMajor,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub output: PathBuf,
    pub fonts_dir: PathBuf,
    pub title: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            output: PathBuf::from(OUTPUT_PATH),
            fonts_dir: PathBuf::from(FONTS_DIR),
            title: DOCUMENT_TITLE.to_string(),
        }
    }
}
