//! CSV and JSON artifacts for one planning run.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::planner::{LinkRecommendation, RunQuality};

/// Errors raised while writing run artifacts.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Filesystem failure.
    #[error("output I/O failed")]
    Io(#[from] std::io::Error),
    /// CSV serialization failure.
    #[error("CSV write failed")]
    Csv(#[from] csv::Error),
    /// JSON serialization failure.
    #[error("JSON write failed")]
    Json(#[from] serde_json::Error),
}

/// Run metadata written next to the recommendation CSV.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Site the run crawled.
    pub site: String,
    /// Pages fetched by the crawler.
    pub total_pages: usize,
    /// Pages that survived extraction and the content-word floor.
    pub usable_pages: usize,
    /// Number of recommendations in the plan.
    pub recommendations: usize,
    /// Clustering quality signal.
    pub quality: RunQuality,
    /// Wall-clock duration of the run in seconds.
    pub execution_time_seconds: f64,
    /// Failure notes collected along the way.
    pub errors: Vec<String>,
    /// Whether the run produced a plan.
    pub success: bool,
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
}

/// Writes the recommendation CSV, dropping repeated source/target pairs while
/// preserving first-seen order. Returns the number of rows written.
pub fn write_csv(path: &Path, recommendations: &[LinkRecommendation]) -> Result<usize, OutputError> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut seen: std::collections::HashSet<(&str, &str)> = std::collections::HashSet::new();
    let mut rows = 0usize;
    for rec in recommendations {
        if !seen.insert((rec.source_url.as_str(), rec.target_url.as_str())) {
            continue;
        }
        writer.serialize(rec)?;
        rows += 1;
    }
    writer.flush()?;
    info!(rows, path = %path.display(), "wrote recommendation CSV");
    Ok(rows)
}

/// Writes the run summary as pretty-printed JSON.
pub fn write_json(path: &Path, summary: &RunSummary) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    info!(path = %path.display(), "wrote run summary");
    Ok(())
}

/// Timestamped artifact path: `{dir}/{domain}_{YYYYmmdd_HHMMSS}{suffix}`.
pub fn artifact_path(dir: &Path, domain: &str, at: DateTime<Utc>, suffix: &str) -> PathBuf {
    let stamp = at.format("%Y%m%d_%H%M%S");
    let safe_domain: String = domain
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    dir.join(format!("{safe_domain}_{stamp}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rec(source: &str, target: &str) -> LinkRecommendation {
        LinkRecommendation {
            source_url: source.to_string(),
            target_url: target.to_string(),
            anchor: "container networking".to_string(),
            semantic_score: 0.75,
        }
    }

    #[test]
    fn csv_has_header_and_rows() {
        let dir = std::env::temp_dir().join("interlink-csv-test");
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("plan.csv");

        let rows = write_csv(&path, &[rec("https://a.test/x", "https://a.test/p")])
            .expect("write");
        assert_eq!(rows, 1);

        let body = fs::read_to_string(&path).expect("read back");
        let mut lines = body.lines();
        assert_eq!(
            lines.next().unwrap(),
            "source_url,target_url,anchor,semantic_score"
        );
        assert!(lines.next().unwrap().contains("container networking"));
    }

    #[test]
    fn csv_drops_repeated_pairs() {
        let dir = std::env::temp_dir().join("interlink-csv-dedup-test");
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("plan.csv");

        let rows = write_csv(
            &path,
            &[
                rec("https://a.test/x", "https://a.test/p"),
                rec("https://a.test/x", "https://a.test/p"),
                rec("https://a.test/y", "https://a.test/p"),
            ],
        )
        .expect("write");
        assert_eq!(rows, 2);
    }

    #[test]
    fn summary_round_trips_through_json() {
        let dir = std::env::temp_dir().join("interlink-json-test");
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("meta.json");

        let summary = RunSummary {
            site: "https://a.test".to_string(),
            total_pages: 10,
            usable_pages: 7,
            recommendations: 4,
            quality: RunQuality {
                cluster_count: 3,
                cohesion_score: 0.42,
                low_cohesion: false,
            },
            execution_time_seconds: 12.5,
            errors: vec!["https://a.test/broken: HTTP 500".to_string()],
            success: true,
            timestamp: Utc::now(),
        };
        write_json(&path, &summary).expect("write");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read back")).expect("parse");
        assert_eq!(value["usable_pages"], 7);
        assert_eq!(value["quality"]["cluster_count"], 3);
        assert_eq!(value["success"], true);
    }

    #[test]
    fn artifact_paths_are_timestamped_and_sanitized() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 9).unwrap();
        let path = artifact_path(Path::new("out"), "docs.example.test", at, "_links.csv");
        assert_eq!(
            path,
            PathBuf::from("out/docs_example_test_20240305_143009_links.csv")
        );
    }
}
