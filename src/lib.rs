#![warn(missing_docs)]
//! Core library entry points for the interlink recommendation planner.
//!
//! The pipeline crawls one site, extracts page text, embeds it, picks a
//! cluster count adaptively, and emits internal-link recommendations that
//! point cluster members at their pillar page.

pub mod anchor;
pub mod cluster;
pub mod config;
pub mod crawler;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod output;
pub mod planner;
pub mod urlnorm;

pub use anchor::{AnchorEngine, ScanStrategy};
pub use cluster::{
    embedding_matrix, group_clusters, silhouette_score, ClusterSelection, ClusterSelector,
    KMeansPartitioner, PartitionError, Partitioner,
};
pub use config::{
    ClusteringConfig, ConfigError, ContentConfig, CrawlConfig, LinkingConfig, OutputConfig,
    PipelineConfig,
};
pub use crawler::{CrawlError, CrawlReport, CrawledPage, SiteCrawler};
pub use embedder::{OpenAiEmbedder, TextEmbedder};
pub use error::PlanError;
pub use extractor::{ExtractError, ExtractedContent, Extractor};
pub use output::{artifact_path, write_csv, write_json, OutputError, RunSummary};
pub use planner::{LinkPlan, LinkPlanner, LinkRecommendation, Page, RunQuality};
pub use urlnorm::{is_crawlable, normalize_url, same_domain, UrlNormError};
