//! Reciprocal Rank Fusion algorithm for combining search results

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use thiserror::Error;

use crate::retrieval::FusedResult;
use crate::store::{Passage, PassageId};

/// Default RRF constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("Invalid RRF constant {0}: must be a positive finite number")]
    InvalidK(f64),
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// RRF K constant (typically 60)
    pub rrf_k: f64,
}

impl FusionConfig {
    pub fn new(rrf_k: f64) -> Result<Self, FusionError> {
        if !rrf_k.is_finite() || rrf_k <= 0.0 {
            return Err(FusionError::InvalidK(rrf_k));
        }
        Ok(Self { rrf_k })
    }

    /// Contribution of an item at zero-based `rank`.
    pub fn contribution(&self, rank: usize) -> f64 {
        1.0 / (self.rrf_k + rank as f64)
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

/// Number of fused candidates kept out of `n`: the top half, rounded down,
/// so a single candidate does not survive.
pub fn survivors(n: usize) -> usize {
    n / 2
}

/// Apply Reciprocal Rank Fusion to combine two ranked lists
///
/// RRF formula: score(id) = sum over every list position holding id of
/// 1 / (k + rank), rank zero-based.
///
/// Payloads are taken from the last list holding the id, so lexical entries
/// win over semantic ones. Results are sorted by score descending; equal
/// scores keep first-seen order, semantic list first.
pub fn reciprocal_rank_fusion(
    semantic: Vec<Passage>,
    lexical: Vec<Passage>,
    config: &FusionConfig,
) -> Vec<FusedResult> {
    let mut order: Vec<PassageId> = Vec::with_capacity(semantic.len() + lexical.len());
    let mut scores: HashMap<PassageId, f64> = HashMap::new();
    let mut payloads: HashMap<PassageId, Passage> = HashMap::new();

    for list in [semantic, lexical] {
        for (rank, passage) in list.into_iter().enumerate() {
            let contribution = config.contribution(rank);
            match scores.entry(passage.id) {
                Entry::Occupied(mut score) => *score.get_mut() += contribution,
                Entry::Vacant(slot) => {
                    order.push(passage.id);
                    slot.insert(contribution);
                }
            }
            payloads.insert(passage.id, passage);
        }
    }

    let mut fused: Vec<FusedResult> = order
        .into_iter()
        .filter_map(|id| {
            let relevance = scores.get(&id).copied()?;
            let passage = payloads.remove(&id)?;
            Some(FusedResult::from_passage(passage, relevance))
        })
        .collect();

    fused.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    fused
}

/// RRF followed by the survival cut: the top half (rounded down) is kept.
pub fn fuse(semantic: Vec<Passage>, lexical: Vec<Passage>, config: &FusionConfig) -> Vec<FusedResult> {
    let mut fused = reciprocal_rank_fusion(semantic, lexical, config);
    fused.truncate(survivors(fused.len()));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: PassageId, source: &str) -> Passage {
        Passage {
            id,
            content: format!("content {id}"),
            source: source.to_string(),
            surah: Some(2),
            ayah: Some(id as u16),
        }
    }

    fn list(ids: &[PassageId]) -> Vec<Passage> {
        ids.iter().map(|&id| passage(id, "semantic")).collect()
    }

    fn ids(results: &[FusedResult]) -> Vec<PassageId> {
        results.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_rrf_scores_use_zero_based_rank() {
        let fused = reciprocal_rank_fusion(list(&[1, 2, 3]), list(&[2, 3, 4]), &FusionConfig::default());

        let score = |id| fused.iter().find(|r| r.id == id).unwrap().relevance;
        assert!((score(2) - (1.0 / 60.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((score(1) - 1.0 / 60.0).abs() < 1e-12);
        assert!((score(4) - 1.0 / 62.0).abs() < 1e-12);
        assert_eq!(ids(&fused), vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_score_decreases_with_rank() {
        let fused = reciprocal_rank_fusion(list(&[5, 6, 7, 8]), vec![], &FusionConfig::default());
        assert_eq!(ids(&fused), vec![5, 6, 7, 8]);
        assert!(fused.windows(2).all(|w| w[0].relevance > w[1].relevance));
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let fused = reciprocal_rank_fusion(list(&[1]), list(&[2]), &FusionConfig::default());
        assert_eq!(ids(&fused), vec![1, 2]);
    }

    #[test]
    fn test_lexical_payload_wins() {
        let semantic = vec![passage(9, "semantic")];
        let lexical = vec![passage(9, "lexical")];
        let fused = reciprocal_rank_fusion(semantic, lexical, &FusionConfig::default());
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].source, "lexical");
        assert_eq!(fused[0].surah, Some(2));
    }

    #[test]
    fn test_top_half_survives() {
        let semantic = list(&[1, 2, 3, 4, 5]);
        let lexical = list(&[6, 7, 8, 9, 10]);
        let all = reciprocal_rank_fusion(semantic.clone(), lexical.clone(), &FusionConfig::default());
        assert_eq!(all.len(), 10);

        let kept = fuse(semantic, lexical, &FusionConfig::default());
        assert_eq!(kept.len(), 5);
        assert_eq!(ids(&kept), ids(&all[..5]));
        let cutoff = kept[4].relevance;
        assert!(all[5..].iter().all(|r| r.relevance <= cutoff));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fuse(vec![], vec![], &FusionConfig::default()).is_empty());
        assert_eq!(survivors(0), 0);
        assert_eq!(survivors(10), 5);
    }

    #[test]
    fn test_odd_counts_round_down() {
        let config = FusionConfig::default();
        assert!(fuse(list(&[3]), vec![], &config).is_empty());
        assert_eq!(ids(&fuse(list(&[1, 2, 3]), vec![], &config)), vec![1]);
        assert_eq!(survivors(1), 0);
        assert_eq!(survivors(3), 1);
        assert_eq!(survivors(5), 2);
    }

    #[test]
    fn test_invalid_k() {
        assert!(FusionConfig::new(60.0).is_ok());
        assert_eq!(FusionConfig::new(0.0), Err(FusionError::InvalidK(0.0)));
        assert!(FusionConfig::new(f64::NAN).is_err());
    }
}
