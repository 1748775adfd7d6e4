//! Sectioned pipeline configuration with construction-time validation.
//!
//! Every component receives the section it needs at construction; there is no
//! ambient global configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::anchor::ScanStrategy;

/// Raised when a configuration value is out of range.
#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(String);

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Tunable knobs for the site crawler.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlConfig {
    /// Maximum pages to fetch before the crawl stops.
    pub max_pages: usize,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Lower bound of the randomized inter-request delay.
    pub min_delay: Duration,
    /// Upper bound of the randomized inter-request delay.
    pub max_delay: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Attempts per URL for retryable HTTP failures.
    pub retry_attempts: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 100,
            request_timeout: Duration::from_secs(10),
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(2000),
            user_agent: "interlink/0.1 (SEO link planner)".to_string(),
            retry_attempts: 3,
        }
    }
}

impl CrawlConfig {
    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages < 1 {
            return Err(ConfigError::new("max_pages must be >= 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::new("request_timeout must be > 0"));
        }
        if self.max_delay < self.min_delay {
            return Err(ConfigError::new("max_delay must be >= min_delay"));
        }
        Ok(())
    }
}

/// Knobs for content filtering and embedding input preparation.
#[derive(Debug, Clone, Serialize)]
pub struct ContentConfig {
    /// Minimum word count before a page is eligible for clustering.
    pub min_content_words: usize,
    /// Maximum characters submitted to the embedding model per page.
    pub max_embedding_chars: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_content_words: 200,
            max_embedding_chars: 2000,
        }
    }
}

impl ContentConfig {
    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_content_words < 1 {
            return Err(ConfigError::new("min_content_words must be >= 1"));
        }
        if self.max_embedding_chars < 1 {
            return Err(ConfigError::new("max_embedding_chars must be >= 1"));
        }
        Ok(())
    }
}

/// Knobs for the adaptive cluster-count search.
#[derive(Debug, Clone, Serialize)]
pub struct ClusteringConfig {
    /// Smallest cluster count to evaluate.
    pub min_clusters: usize,
    /// Largest cluster count to evaluate (capped at the page count).
    pub max_clusters: usize,
    /// Cohesion floor below which the run is flagged as low confidence.
    pub min_silhouette_score: f64,
    /// Fixed k-means seed; identical input must yield identical output.
    pub kmeans_seed: u64,
    /// Iteration cap per k-means fit.
    pub max_iterations: u64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_clusters: 2,
            max_clusters: 15,
            min_silhouette_score: 0.2,
            kmeans_seed: 42,
            max_iterations: 300,
        }
    }
}

impl ClusteringConfig {
    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_clusters < 2 {
            return Err(ConfigError::new("min_clusters must be >= 2"));
        }
        if self.max_clusters < self.min_clusters {
            return Err(ConfigError::new("max_clusters must be >= min_clusters"));
        }
        if !(-1.0..=1.0).contains(&self.min_silhouette_score) {
            return Err(ConfigError::new(
                "min_silhouette_score must be between -1 and 1",
            ));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::new("max_iterations must be >= 1"));
        }
        Ok(())
    }
}

/// Knobs for pillar selection, anchor extraction, and link policy.
#[derive(Debug, Clone, Serialize)]
pub struct LinkingConfig {
    /// Case-insensitive substrings marking utility pages (never a source or
    /// pillar).
    pub utility_keywords: Vec<String>,
    /// Preferred minimum word count for a pillar page.
    pub min_pillar_words: usize,
    /// Minimum anchor phrase length in words, after stop-word removal.
    pub min_anchor_words: usize,
    /// Maximum anchor phrase length in words, after stop-word removal.
    pub max_anchor_words: usize,
    /// Minimum whole-word overlap with the target page for a scored anchor.
    pub min_anchor_overlap: usize,
    /// How source pages are scanned for anchor candidates.
    pub scan_strategy: ScanStrategy,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            utility_keywords: [
                "privacy",
                "terms",
                "cookie",
                "disclaimer",
                "contact",
                "login",
                "signup",
                "404",
                "about",
                "legal",
                "policy",
                "sitemap",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_pillar_words: 300,
            min_anchor_words: 2,
            max_anchor_words: 5,
            min_anchor_overlap: 2,
            scan_strategy: ScanStrategy::FullPage,
        }
    }
}

impl LinkingConfig {
    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_pillar_words < 1 {
            return Err(ConfigError::new("min_pillar_words must be >= 1"));
        }
        if self.min_anchor_words < 1 {
            return Err(ConfigError::new("min_anchor_words must be >= 1"));
        }
        if self.max_anchor_words < self.min_anchor_words {
            return Err(ConfigError::new(
                "max_anchor_words must be >= min_anchor_words",
            ));
        }
        if self.min_anchor_overlap < 1 {
            return Err(ConfigError::new("min_anchor_overlap must be >= 1"));
        }
        Ok(())
    }
}

/// Knobs for output file placement.
#[derive(Debug, Clone, Serialize)]
pub struct OutputConfig {
    /// Directory receiving CSV and JSON artifacts.
    pub output_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

/// Aggregate configuration for one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineConfig {
    /// Crawler section.
    pub crawl: CrawlConfig,
    /// Content filtering section.
    pub content: ContentConfig,
    /// Cluster-count search section.
    pub clustering: ClusteringConfig,
    /// Link policy section.
    pub linking: LinkingConfig,
    /// Output section.
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Validates every section, failing on the first out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.crawl.validate()?;
        self.content.validate()?;
        self.clustering.validate()?;
        self.linking.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().expect("valid defaults");
    }

    #[test]
    fn rejects_single_cluster_minimum() {
        let mut config = ClusteringConfig::default();
        config.min_clusters = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_cluster_range() {
        let mut config = ClusteringConfig::default();
        config.max_clusters = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_silhouette_floor() {
        let mut config = ClusteringConfig::default();
        config.min_silhouette_score = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_anchor_bounds() {
        let mut config = LinkingConfig::default();
        config.min_anchor_words = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_delay_bounds() {
        let mut config = CrawlConfig::default();
        config.min_delay = Duration::from_secs(5);
        config.max_delay = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }
}
