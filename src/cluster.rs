//! Adaptive cluster-count selection over page embeddings.
//!
//! Every candidate count in the configured range is partitioned with seeded
//! k-means and scored with the silhouette cohesion metric; the best-scoring
//! partition wins, smallest count on ties.

use std::collections::BTreeMap;

use linfa::dataset::AsTargets;
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::Array2;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClusteringConfig;
use crate::error::PlanError;

/// Raised when a single candidate cluster count cannot be partitioned.
///
/// The selector treats this as a skippable condition, not a run failure.
#[derive(Debug, Error)]
#[error("partitioning failed: {0}")]
pub struct PartitionError(String);

impl PartitionError {
    /// Wraps an algorithm-specific failure message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Assigns each embedding row to one of `k` clusters.
///
/// Implementations must be deterministic: identical input and `k` yield
/// identical labels across runs.
pub trait Partitioner {
    /// Partitions `embeddings` (one row per page) into `k` clusters,
    /// returning one label per row.
    fn partition(&self, embeddings: &Array2<f64>, k: usize) -> Result<Vec<usize>, PartitionError>;
}

/// K-means partitioner with a fixed seed for reproducible runs.
#[derive(Debug, Clone)]
pub struct KMeansPartitioner {
    seed: u64,
    max_iterations: u64,
}

impl KMeansPartitioner {
    /// Builds a partitioner around the configured seed and iteration cap.
    pub fn new(config: &ClusteringConfig) -> Self {
        Self {
            seed: config.kmeans_seed,
            max_iterations: config.max_iterations,
        }
    }
}

impl Partitioner for KMeansPartitioner {
    fn partition(&self, embeddings: &Array2<f64>, k: usize) -> Result<Vec<usize>, PartitionError> {
        let rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let dataset = DatasetBase::from(embeddings.clone());

        let model = KMeans::params_with_rng(k, rng)
            .max_n_iterations(self.max_iterations)
            .tolerance(1e-4)
            .fit(&dataset)
            .map_err(|err| PartitionError::new(format!("k-means fit for k={k}: {err}")))?;

        let predictions = model.predict(&dataset);
        Ok(predictions.as_targets().iter().copied().collect())
    }
}

/// Winning partition plus the run-level quality signal.
#[derive(Debug, Clone)]
pub struct ClusterSelection {
    /// Chosen cluster count.
    pub cluster_count: usize,
    /// Cluster label per page, aligned with the embedding rows.
    pub labels: Vec<usize>,
    /// Silhouette cohesion of the winning partition, in `[-1, 1]`.
    pub cohesion_score: f64,
    /// True when the cohesion fell below the configured floor. A warning
    /// signal for the caller, never a failure.
    pub low_cohesion: bool,
}

/// Searches the configured cluster-count range for the best partition.
pub struct ClusterSelector<P> {
    partitioner: P,
    config: ClusteringConfig,
}

impl<P: Partitioner> ClusterSelector<P> {
    /// Builds a selector from a partitioning backend and config section.
    pub fn new(partitioner: P, config: ClusteringConfig) -> Self {
        Self {
            partitioner,
            config,
        }
    }

    /// Evaluates every candidate `k` and returns the best-scoring partition.
    ///
    /// Candidates that fail to partition or produce a degenerate labeling are
    /// skipped. Ties keep the smallest `k`, since only strict improvement
    /// replaces the incumbent.
    pub fn select(&self, embeddings: &Array2<f64>) -> Result<ClusterSelection, PlanError> {
        let page_count = embeddings.nrows();
        if page_count < 2 {
            return Err(PlanError::InsufficientInput(page_count));
        }

        let min_k = self.config.min_clusters.max(2);
        let max_k = self.config.max_clusters.min(page_count);

        let mut best: Option<(usize, Vec<usize>, f64)> = None;
        for k in min_k..=max_k {
            let labels = match self.partitioner.partition(embeddings, k) {
                Ok(labels) => labels,
                Err(err) => {
                    warn!(k, %err, "skipping candidate cluster count");
                    continue;
                }
            };
            if labels.len() != page_count {
                return Err(PlanError::InvariantViolation(format!(
                    "partitioner returned {} labels for {} pages",
                    labels.len(),
                    page_count
                )));
            }

            let Some(score) = silhouette_score(embeddings, &labels) else {
                debug!(k, "degenerate partition, skipping");
                continue;
            };
            debug!(k, score, "evaluated candidate cluster count");

            let improved = best
                .as_ref()
                .map(|(_, _, incumbent)| score > *incumbent)
                .unwrap_or(true);
            if improved {
                best = Some((k, labels, score));
            }
        }

        let (cluster_count, labels, cohesion_score) =
            best.ok_or(PlanError::ClusteringFailure { min_k, max_k })?;
        let low_cohesion = cohesion_score < self.config.min_silhouette_score;
        if low_cohesion {
            warn!(
                cohesion_score,
                floor = self.config.min_silhouette_score,
                "cluster cohesion below configured floor"
            );
        }

        Ok(ClusterSelection {
            cluster_count,
            labels,
            cohesion_score,
            low_cohesion,
        })
    }
}

/// Mean silhouette coefficient over all points, or `None` when the labeling
/// is outside the metric's domain (fewer than 2 occupied clusters, or every
/// point in its own cluster).
///
/// Per point: `(b - a) / max(a, b)` with `a` the mean distance to same-cluster
/// points and `b` the mean distance to the nearest other cluster. Points in
/// singleton clusters contribute 0.
pub fn silhouette_score(embeddings: &Array2<f64>, labels: &[usize]) -> Option<f64> {
    let n = embeddings.nrows();
    if n != labels.len() || n == 0 {
        return None;
    }

    let mut occupied: Vec<usize> = labels.to_vec();
    occupied.sort_unstable();
    occupied.dedup();
    if occupied.len() < 2 || occupied.len() > n - 1 {
        return None;
    }

    let mut total = 0.0;
    for i in 0..n {
        let point = embeddings.row(i);
        let own = labels[i];

        let mut same_sum = 0.0;
        let mut same_count = 0usize;
        let mut other: BTreeMap<usize, (f64, usize)> = BTreeMap::new();
        for j in 0..n {
            if i == j {
                continue;
            }
            let distance = point
                .iter()
                .zip(embeddings.row(j).iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt();
            if labels[j] == own {
                same_sum += distance;
                same_count += 1;
            } else {
                let entry = other.entry(labels[j]).or_insert((0.0, 0));
                entry.0 += distance;
                entry.1 += 1;
            }
        }

        if same_count == 0 {
            // Singleton cluster: silhouette is undefined, counted as 0.
            continue;
        }

        let a = same_sum / same_count as f64;
        let b = other
            .values()
            .map(|(sum, count)| sum / *count as f64)
            .fold(f64::MAX, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Some(total / n as f64)
}

/// Groups page indices by cluster label, preserving page order within each
/// group and iterating clusters in ascending label order.
pub fn group_clusters(
    labels: &[usize],
    page_count: usize,
) -> Result<BTreeMap<usize, Vec<usize>>, PlanError> {
    if labels.len() != page_count {
        return Err(PlanError::InvariantViolation(format!(
            "{} labels for {} pages",
            labels.len(),
            page_count
        )));
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(index);
    }
    Ok(groups)
}

/// Stacks per-page embedding vectors into the row matrix the selector needs.
pub fn embedding_matrix(vectors: &[Vec<f32>]) -> Result<Array2<f64>, PlanError> {
    let rows = vectors.len();
    let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
    if vectors.iter().any(|vector| vector.len() != dimension) {
        return Err(PlanError::InvariantViolation(
            "embedding vectors have inconsistent dimensions".to_string(),
        ));
    }

    let mut matrix = Array2::zeros((rows, dimension));
    for (i, vector) in vectors.iter().enumerate() {
        for (j, &value) in vector.iter().enumerate() {
            matrix[[i, j]] = f64::from(value);
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Splits points on the sign of their first coordinate, ignoring `k`
    /// beyond recording that it was requested.
    struct ThresholdPartitioner;

    impl Partitioner for ThresholdPartitioner {
        fn partition(
            &self,
            embeddings: &Array2<f64>,
            _k: usize,
        ) -> Result<Vec<usize>, PartitionError> {
            Ok(embeddings
                .rows()
                .into_iter()
                .map(|row| usize::from(row[0] > 0.0))
                .collect())
        }
    }

    struct FailingPartitioner;

    impl Partitioner for FailingPartitioner {
        fn partition(&self, _: &Array2<f64>, k: usize) -> Result<Vec<usize>, PartitionError> {
            Err(PartitionError::new(format!("k={k} unavailable")))
        }
    }

    fn two_blobs() -> Array2<f64> {
        array![
            [-10.0, 0.0],
            [-10.2, 0.1],
            [-9.8, -0.1],
            [10.0, 0.0],
            [10.2, 0.1],
            [9.8, -0.1],
        ]
    }

    fn config(max_clusters: usize) -> ClusteringConfig {
        ClusteringConfig {
            max_clusters,
            ..ClusteringConfig::default()
        }
    }

    #[test]
    fn well_separated_blobs_score_high() {
        let labels = vec![0, 0, 0, 1, 1, 1];
        let score = silhouette_score(&two_blobs(), &labels).expect("valid labeling");
        assert!(score > 0.9);
        assert!(score <= 1.0);
    }

    #[test]
    fn single_occupied_cluster_is_degenerate() {
        let labels = vec![0, 0, 0, 0, 0, 0];
        assert!(silhouette_score(&two_blobs(), &labels).is_none());
    }

    #[test]
    fn all_singletons_is_degenerate() {
        let labels = vec![0, 1, 2, 3, 4, 5];
        assert!(silhouette_score(&two_blobs(), &labels).is_none());
    }

    #[test]
    fn score_stays_within_bounds_for_poor_labeling() {
        // Deliberately mixed labels across the two blobs.
        let labels = vec![0, 1, 0, 1, 0, 1];
        let score = silhouette_score(&two_blobs(), &labels).expect("valid labeling");
        assert!((-1.0..=1.0).contains(&score));
        assert!(score < 0.0);
    }

    #[test]
    fn selector_picks_the_separating_partition() {
        let selector = ClusterSelector::new(ThresholdPartitioner, config(4));
        let selection = selector.select(&two_blobs()).expect("selection");
        assert_eq!(selection.labels, vec![0, 0, 0, 1, 1, 1]);
        assert!(selection.cohesion_score > 0.9);
        assert!(!selection.low_cohesion);
    }

    #[test]
    fn tie_keeps_smallest_cluster_count() {
        // The stub returns the same labeling for every k, so every candidate
        // ties and the first (k = 2) must win.
        let selector = ClusterSelector::new(ThresholdPartitioner, config(5));
        let selection = selector.select(&two_blobs()).expect("selection");
        assert_eq!(selection.cluster_count, 2);
    }

    #[test]
    fn selection_is_deterministic() {
        let selector = ClusterSelector::new(KMeansPartitioner::new(&config(4)), config(4));
        let first = selector.select(&two_blobs()).expect("first run");
        let second = selector.select(&two_blobs()).expect("second run");
        assert_eq!(first.cluster_count, second.cluster_count);
        assert_eq!(first.labels, second.labels);
        assert_eq!(first.cohesion_score, second.cohesion_score);
    }

    #[test]
    fn kmeans_separates_the_blobs() {
        let selector = ClusterSelector::new(KMeansPartitioner::new(&config(3)), config(3));
        let selection = selector.select(&two_blobs()).expect("selection");
        assert_eq!(selection.cluster_count, 2);
        // Same-blob points share a label, cross-blob points do not.
        assert_eq!(selection.labels[0], selection.labels[1]);
        assert_eq!(selection.labels[3], selection.labels[4]);
        assert_ne!(selection.labels[0], selection.labels[3]);
        assert!(selection.cohesion_score > 0.5);
    }

    #[test]
    fn one_page_is_insufficient_input() {
        let selector = ClusterSelector::new(ThresholdPartitioner, config(4));
        let single = array![[1.0, 2.0]];
        assert!(matches!(
            selector.select(&single),
            Err(PlanError::InsufficientInput(1))
        ));
    }

    #[test]
    fn exhausted_candidates_fail_with_clustering_failure() {
        let selector = ClusterSelector::new(FailingPartitioner, config(4));
        assert!(matches!(
            selector.select(&two_blobs()),
            Err(PlanError::ClusteringFailure { .. })
        ));
    }

    #[test]
    fn low_cohesion_sets_the_flag() {
        let mut config = config(4);
        config.min_silhouette_score = 0.999;
        let selector = ClusterSelector::new(ThresholdPartitioner, config);
        let selection = selector.select(&two_blobs()).expect("selection");
        assert!(selection.low_cohesion);
    }

    #[test]
    fn groups_preserve_page_order() {
        let groups = group_clusters(&[1, 0, 1, 0, 2], 5).expect("groups");
        assert_eq!(groups[&0], vec![1, 3]);
        assert_eq!(groups[&1], vec![0, 2]);
        assert_eq!(groups[&2], vec![4]);
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn grouping_rejects_length_mismatch() {
        assert!(matches!(
            group_clusters(&[0, 1], 3),
            Err(PlanError::InvariantViolation(_))
        ));
    }

    #[test]
    fn matrix_rejects_ragged_vectors() {
        let ragged = vec![vec![1.0_f32, 2.0], vec![3.0]];
        assert!(matches!(
            embedding_matrix(&ragged),
            Err(PlanError::InvariantViolation(_))
        ));
    }

    #[test]
    fn matrix_preserves_values() {
        let matrix = embedding_matrix(&[vec![1.0_f32, 2.0], vec![3.0, 4.0]]).expect("matrix");
        assert_eq!(matrix[[0, 1]], 2.0);
        assert_eq!(matrix[[1, 0]], 3.0);
    }
}
