//! Pillar selection and link plan assembly.
//!
//! Each cluster nominates one pillar page; every other page in the cluster
//! becomes a candidate source that may contribute at most one recommendation
//! to the whole plan.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::anchor::AnchorEngine;
use crate::cluster::{group_clusters, ClusterSelection};
use crate::config::LinkingConfig;
use crate::error::PlanError;

/// One page eligible for planning, already crawled and extracted.
#[derive(Debug, Clone)]
pub struct Page {
    /// Normalized page URL.
    pub url: String,
    /// Document title, possibly empty.
    pub title: String,
    /// Whitespace-collapsed visible text.
    pub text: String,
    /// Word count of `text`.
    pub word_count: usize,
}

/// One proposed internal link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkRecommendation {
    /// Page that should carry the new link.
    pub source_url: String,
    /// Pillar page the link points at.
    pub target_url: String,
    /// Anchor text drawn from the source page.
    pub anchor: String,
    /// Cohesion score of the run that produced this recommendation.
    pub semantic_score: f64,
}

/// Run-level quality signal attached to the plan.
#[derive(Debug, Clone, Serialize)]
pub struct RunQuality {
    /// Chosen cluster count.
    pub cluster_count: usize,
    /// Silhouette cohesion of the winning partition.
    pub cohesion_score: f64,
    /// True when cohesion fell below the configured floor.
    pub low_cohesion: bool,
}

/// Complete output of one planning run.
#[derive(Debug, Clone, Serialize)]
pub struct LinkPlan {
    /// Deduplicated recommendations, in cluster order.
    pub recommendations: Vec<LinkRecommendation>,
    /// Quality signal for the run.
    pub quality: RunQuality,
}

/// Builds link plans from clustered pages.
pub struct LinkPlanner {
    config: LinkingConfig,
    anchors: AnchorEngine,
}

impl LinkPlanner {
    /// Builds a planner around the link policy section.
    pub fn new(config: LinkingConfig) -> Self {
        let anchors = AnchorEngine::new(config.clone());
        Self { config, anchors }
    }

    /// Assembles the link plan for one clustering run.
    ///
    /// Clusters are visited in ascending label order. Within a cluster the
    /// pillar is fixed first, then sources are considered in page order.
    /// A source URL contributes at most one recommendation across the whole
    /// plan, never links to itself, and utility pages are never sources.
    pub fn plan(&self, pages: &[Page], selection: &ClusterSelection) -> Result<LinkPlan, PlanError> {
        let groups = group_clusters(&selection.labels, pages.len())?;

        let mut recommendations = Vec::new();
        let mut linked_sources: HashSet<String> = HashSet::new();
        let mut seen_pairs: HashSet<(String, String)> = HashSet::new();

        for (&label, members) in &groups {
            if members.len() < 2 {
                debug!(label, "cluster too small to link, skipping");
                continue;
            }

            let Some(pillar) = self.select_pillar(pages, members) else {
                debug!(label, "no pillar candidate in cluster, skipping");
                continue;
            };
            let target = &pages[pillar];
            debug!(label, pillar = %target.url, "selected cluster pillar");

            for &index in members {
                if index == pillar {
                    continue;
                }
                let source = &pages[index];
                if source.url == target.url {
                    continue;
                }
                if self.is_utility_page(source) {
                    continue;
                }
                if linked_sources.contains(&source.url) {
                    continue;
                }

                let Some(anchor) = self.anchors.select_anchor(&source.text, &target.text) else {
                    debug!(source = %source.url, "no qualifying anchor, skipping source");
                    continue;
                };

                let pair = (source.url.clone(), target.url.clone());
                if !seen_pairs.insert(pair) {
                    continue;
                }
                linked_sources.insert(source.url.clone());
                recommendations.push(LinkRecommendation {
                    source_url: source.url.clone(),
                    target_url: target.url.clone(),
                    anchor,
                    semantic_score: selection.cohesion_score,
                });
            }
        }

        info!(
            recommendations = recommendations.len(),
            clusters = selection.cluster_count,
            "assembled link plan"
        );

        Ok(LinkPlan {
            recommendations,
            quality: RunQuality {
                cluster_count: selection.cluster_count,
                cohesion_score: selection.cohesion_score,
                low_cohesion: selection.low_cohesion,
            },
        })
    }

    /// True when the page's URL or title carries a utility keyword.
    pub fn is_utility_page(&self, page: &Page) -> bool {
        let haystack = format!("{} {}", page.url, page.title).to_lowercase();
        self.config
            .utility_keywords
            .iter()
            .any(|keyword| haystack.contains(keyword.as_str()))
    }

    /// Picks the cluster pillar: a non-utility page, preferring those at or
    /// above the pillar word floor, breaking ties by content length with the
    /// earlier page kept.
    fn select_pillar(&self, pages: &[Page], members: &[usize]) -> Option<usize> {
        let eligible: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&index| !self.is_utility_page(&pages[index]))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let longest = |indices: &[usize]| -> Option<usize> {
            indices
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    pages[a]
                        .text
                        .len()
                        .cmp(&pages[b].text.len())
                        // Keep the earlier page on ties.
                        .then(b.cmp(&a))
                })
        };

        let substantial: Vec<usize> = eligible
            .iter()
            .copied()
            .filter(|&index| pages[index].word_count >= self.config.min_pillar_words)
            .collect();
        if !substantial.is_empty() {
            return longest(&substantial);
        }
        longest(&eligible)
    }
}
