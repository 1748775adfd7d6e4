//! Polite breadth-first site crawler.
//!
//! The crawl stays on the start URL's domain, seeds its frontier from
//! `sitemap.xml` when one is available, sleeps a randomized delay between
//! requests, and retries transient HTTP failures before recording a page as
//! failed.

use std::collections::{HashSet, VecDeque};
use std::thread;
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::urlnorm::{is_crawlable, normalize_url, same_domain};

/// Errors that abort a crawl before any page is fetched.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The start URL could not be normalized or is not fetchable.
    #[error("invalid start URL {url:?}: {reason}")]
    InvalidStartUrl {
        /// URL as given by the caller.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

/// One successfully fetched HTML page.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    /// Normalized page URL.
    pub url: String,
    /// Raw response body.
    pub html: String,
}

/// Outcome of a whole crawl.
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Fetched pages in visit order.
    pub pages: Vec<CrawledPage>,
    /// URLs taken off the frontier and requested.
    pub attempted: usize,
    /// URLs whose request and parse succeeded.
    pub succeeded: usize,
    /// URLs that exhausted their retries or returned unusable responses.
    pub failed: usize,
    /// Human-readable failure notes, one per failed URL.
    pub errors: Vec<String>,
}

/// Breadth-first crawler bound to one domain.
pub struct SiteCrawler {
    client: Client,
    config: CrawlConfig,
    links: Selector,
}

impl SiteCrawler {
    /// Builds a crawler with the configured user agent and timeout.
    pub fn new(config: CrawlConfig) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(CrawlError::ClientBuild)?;
        Ok(Self {
            client,
            config,
            links: Selector::parse("a[href]").expect("anchor selector"),
        })
    }

    /// Crawls outward from `start_url`, stopping at the page ceiling.
    pub fn crawl(&self, start_url: &str) -> Result<CrawlReport, CrawlError> {
        let start = normalize_url(start_url).map_err(|err| CrawlError::InvalidStartUrl {
            url: start_url.to_string(),
            reason: err.to_string(),
        })?;
        if !is_crawlable(&start) {
            return Err(CrawlError::InvalidStartUrl {
                url: start_url.to_string(),
                reason: "only http and https URLs with a host can be crawled".to_string(),
            });
        }

        let mut frontier: VecDeque<Url> = VecDeque::new();
        let mut enqueued: HashSet<String> = HashSet::new();
        frontier.push_back(start.clone());
        enqueued.insert(start.to_string());

        for url in self.sitemap_urls(&start) {
            if enqueued.insert(url.to_string()) {
                frontier.push_back(url);
            }
        }

        let mut report = CrawlReport::default();
        info!(start = %start, frontier = frontier.len(), "starting crawl");

        while let Some(url) = frontier.pop_front() {
            if report.pages.len() >= self.config.max_pages {
                info!(limit = self.config.max_pages, "page ceiling reached");
                break;
            }
            report.attempted += 1;

            let html = match self.fetch_with_retries(&url) {
                Ok(html) => html,
                Err(reason) => {
                    warn!(url = %url, %reason, "page fetch failed");
                    report.failed += 1;
                    report.errors.push(format!("{url}: {reason}"));
                    self.pause();
                    continue;
                }
            };

            for link in self.extract_links(&url, &html) {
                if same_domain(&start, &link)
                    && is_crawlable(&link)
                    && enqueued.insert(link.to_string())
                {
                    frontier.push_back(link);
                }
            }

            report.succeeded += 1;
            report.pages.push(CrawledPage {
                url: url.to_string(),
                html,
            });
            debug!(url = %url, fetched = report.pages.len(), "fetched page");

            if !frontier.is_empty() {
                self.pause();
            }
        }

        info!(
            pages = report.pages.len(),
            failed = report.failed,
            "crawl finished"
        );
        Ok(report)
    }

    /// Fetches one URL, retrying transient failures with a short backoff.
    fn fetch_with_retries(&self, url: &Url) -> Result<String, String> {
        let mut last_error = String::new();
        for attempt in 1..=self.config.retry_attempts.max(1) {
            match self.fetch_once(url) {
                Ok(Some(html)) => return Ok(html),
                Ok(None) => return Err("response is not HTML".to_string()),
                Err((retryable, reason)) => {
                    last_error = reason;
                    if !retryable {
                        break;
                    }
                    if attempt < self.config.retry_attempts {
                        debug!(url = %url, attempt, "retrying fetch");
                        thread::sleep(self.config.min_delay);
                    }
                }
            }
        }
        Err(last_error)
    }

    /// One fetch attempt. `Ok(None)` means a successful non-HTML response.
    fn fetch_once(&self, url: &Url) -> Result<Option<String>, (bool, String)> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| (true, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            return Err((retryable, format!("HTTP {status}")));
        }

        let html_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("text/html"))
            // No content type: assume HTML and let extraction decide.
            .unwrap_or(true);
        if !html_type {
            return Ok(None);
        }

        let body = response.text().map_err(|err| (true, err.to_string()))?;
        Ok(Some(body))
    }

    /// Same-domain links found in the page body, normalized.
    fn extract_links(&self, base: &Url, html: &str) -> Vec<Url> {
        let document = Html::parse_document(html);
        let mut links = Vec::new();
        for element in document.select(&self.links) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(joined) = base.join(href) else {
                debug!(href, "unparseable link, skipping");
                continue;
            };
            if let Ok(normalized) = normalize_url(joined.as_str()) {
                if is_crawlable(&normalized) {
                    links.push(normalized);
                }
            }
        }
        links
    }

    /// URLs listed in the site's `sitemap.xml`, or nothing when the sitemap
    /// is missing or malformed. Failure here never fails the crawl.
    fn sitemap_urls(&self, start: &Url) -> Vec<Url> {
        let Ok(sitemap_url) = start.join("/sitemap.xml") else {
            return Vec::new();
        };
        let body = match self.fetch_once(&sitemap_url) {
            Ok(Some(body)) => body,
            Ok(None) => {
                // Sitemaps are served as XML, so a non-HTML type is expected;
                // re-fetch the body without the type gate.
                match self.client.get(sitemap_url.clone()).send().and_then(|r| r.text()) {
                    Ok(body) => body,
                    Err(err) => {
                        debug!(%err, "sitemap fetch failed");
                        return Vec::new();
                    }
                }
            }
            Err((_, reason)) => {
                debug!(reason, "no usable sitemap");
                return Vec::new();
            }
        };

        let urls = parse_sitemap(&body);
        let mut seeds = Vec::new();
        for raw in urls {
            match normalize_url(&raw) {
                Ok(url) if same_domain(start, &url) && is_crawlable(&url) => seeds.push(url),
                Ok(_) => {}
                Err(err) => debug!(url = raw, %err, "skipping sitemap entry"),
            }
        }
        info!(seeds = seeds.len(), "seeded frontier from sitemap");
        seeds
    }

    /// Sleeps a randomized delay to avoid hammering the site.
    fn pause(&self) {
        let min = self.config.min_delay.as_millis() as u64;
        let max = self.config.max_delay.as_millis() as u64;
        let wait = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        thread::sleep(Duration::from_millis(wait));
    }
}

/// Extracts `<loc>` values from a sitemap urlset document.
fn parse_sitemap(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut in_loc = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref tag)) if tag.local_name().as_ref() == b"loc" => {
                in_loc = true;
            }
            Ok(Event::Text(text)) if in_loc => {
                if let Ok(value) = text.unescape() {
                    urls.push(value.trim().to_string());
                }
            }
            Ok(Event::End(ref tag)) if tag.local_name().as_ref() == b"loc" => {
                in_loc = false;
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                debug!(%err, "sitemap parse error");
                break;
            }
            _ => {}
        }
    }
    urls
}
