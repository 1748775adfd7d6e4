//! Command-line driver for the interlink pipeline.

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use interlink::{
    artifact_path, embedding_matrix, normalize_url, write_csv, write_json, ClusterSelector,
    Extractor, KMeansPartitioner, LinkPlanner, OpenAiEmbedder, Page, PipelineConfig, RunSummary,
    ScanStrategy, SiteCrawler, TextEmbedder,
};

/// Plans internal links for one website.
#[derive(Debug, Parser)]
#[command(name = "interlink", version, about)]
struct Cli {
    /// Start URL of the site to analyze.
    #[arg(long)]
    site: String,

    /// Maximum pages to crawl.
    #[arg(long, default_value_t = 100)]
    max_pages: usize,

    /// Smallest cluster count to evaluate.
    #[arg(long, default_value_t = 2)]
    min_clusters: usize,

    /// Largest cluster count to evaluate.
    #[arg(long, default_value_t = 15)]
    max_clusters: usize,

    /// Minimum words a page needs to enter clustering.
    #[arg(long, default_value_t = 200)]
    min_content_words: usize,

    /// How source pages are scanned for anchors.
    #[arg(long, value_enum, default_value = "full-page")]
    scan_strategy: ScanStrategy,

    /// Directory receiving the CSV and JSON artifacts.
    #[arg(long, default_value = ".")]
    output_dir: std::path::PathBuf,

    /// Skip the recommendation CSV.
    #[arg(long)]
    no_csv: bool,

    /// Skip the run summary JSON.
    #[arg(long)]
    no_json: bool,

    /// Embedding model name.
    #[arg(long, env = "INTERLINK_EMBED_MODEL", default_value = "text-embedding-3-small")]
    model: String,

    /// Base URL of the OpenAI-compatible embeddings endpoint.
    #[arg(
        long,
        env = "INTERLINK_EMBED_BASE_URL",
        default_value = "https://api.openai.com/v1"
    )]
    embed_base_url: String,

    /// API key for the embeddings endpoint.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "interlink=debug" } else { "interlink=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(cli: &Cli) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.crawl.max_pages = cli.max_pages;
    config.content.min_content_words = cli.min_content_words;
    config.clustering.min_clusters = cli.min_clusters;
    config.clustering.max_clusters = cli.max_clusters;
    config.linking.scan_strategy = cli.scan_strategy;
    config.output.output_dir = cli.output_dir.clone();
    config
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = build_config(&cli);
    config.validate().context("invalid configuration")?;

    let started = Instant::now();
    let site = normalize_url(&cli.site).context("invalid --site URL")?;
    info!(site = %site, "planning internal links");

    let crawler = SiteCrawler::new(config.crawl.clone())?;
    let report = crawler.crawl(site.as_str())?;
    let mut errors = report.errors.clone();
    if report.pages.is_empty() {
        bail!("crawl fetched no pages from {site}");
    }

    let extractor = Extractor::new();
    let mut pages = Vec::new();
    for crawled in &report.pages {
        let content = match extractor.extract(&crawled.html) {
            Ok(content) => content,
            Err(err) => {
                warn!(url = %crawled.url, %err, "dropping page");
                errors.push(format!("{}: {err}", crawled.url));
                continue;
            }
        };
        if content.word_count < config.content.min_content_words {
            info!(
                url = %crawled.url,
                words = content.word_count,
                "page below content floor, skipping"
            );
            continue;
        }
        pages.push(Page {
            url: crawled.url.clone(),
            title: content.title,
            text: content.text,
            word_count: content.word_count,
        });
    }
    info!(
        crawled = report.pages.len(),
        usable = pages.len(),
        "content extraction finished"
    );
    if pages.len() < 2 {
        bail!(
            "only {} usable pages after filtering; at least 2 are required",
            pages.len()
        );
    }

    let embedder = OpenAiEmbedder::new(
        cli.api_key.clone(),
        cli.embed_base_url.clone(),
        cli.model.clone(),
        config.content.max_embedding_chars,
        Duration::from_secs(30),
        config.crawl.retry_attempts,
        64,
    )?;
    let texts: Vec<String> = pages.iter().map(|page| page.text.clone()).collect();
    let vectors = embedder.embed(&texts).context("embedding failed")?;
    let matrix = embedding_matrix(&vectors)?;

    let selector = ClusterSelector::new(
        KMeansPartitioner::new(&config.clustering),
        config.clustering.clone(),
    );
    let selection = selector.select(&matrix)?;
    info!(
        clusters = selection.cluster_count,
        cohesion = selection.cohesion_score,
        "cluster count selected"
    );

    let planner = LinkPlanner::new(config.linking.clone());
    let plan = planner.plan(&pages, &selection)?;

    let finished_at = Utc::now();
    let domain = site
        .host_str()
        .map(str::to_string)
        .unwrap_or_else(|| "site".to_string());

    std::fs::create_dir_all(&config.output.output_dir)
        .context("failed to create output directory")?;
    if !cli.no_csv {
        let csv_path = artifact_path(&config.output.output_dir, &domain, finished_at, "_links.csv");
        write_csv(&csv_path, &plan.recommendations)?;
        println!("Recommendations: {}", csv_path.display());
    }
    if !cli.no_json {
        let summary = RunSummary {
            site: site.to_string(),
            total_pages: report.pages.len(),
            usable_pages: pages.len(),
            recommendations: plan.recommendations.len(),
            quality: plan.quality.clone(),
            execution_time_seconds: started.elapsed().as_secs_f64(),
            errors,
            success: true,
            timestamp: finished_at,
        };
        let json_path =
            artifact_path(&config.output.output_dir, &domain, finished_at, "_metadata.json");
        write_json(&json_path, &summary)?;
        println!("Run summary:     {}", json_path.display());
    }

    println!(
        "{} recommendations across {} clusters (cohesion {:.3}{})",
        plan.recommendations.len(),
        plan.quality.cluster_count,
        plan.quality.cohesion_score,
        if plan.quality.low_cohesion {
            ", low confidence"
        } else {
            ""
        }
    );
    Ok(())
}
