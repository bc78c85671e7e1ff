//! Final result set built from the per-sub-query fused lists.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::retrieval::filters::{FilterMode, ValidatedRequest};
use crate::retrieval::hybrid::{SearchError, Stage};
use crate::retrieval::FusedResult;

/// Fused candidates of one sub-query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedGroup {
    /// Position of the sub-query in the request
    pub index: usize,
    pub query: String,
    pub mode: FilterMode,
    pub results: Vec<FusedResult>,
}

/// Output of one search call: one group per sub-query, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    groups: Vec<FusedGroup>,
}

impl SearchResults {
    pub fn groups(&self) -> &[FusedGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<FusedGroup> {
        self.groups
    }

    /// Total candidates across all groups, repeats included.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.results.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens groups in sub-query order, keeping the first occurrence of
    /// each passage id.
    ///
    /// Identity is the id, not the text: two works quoting the same wording
    /// are separate passages and both stay.
    pub fn into_ranked(self) -> Vec<FusedResult> {
        let mut seen = HashSet::new();
        self.groups
            .into_iter()
            .flat_map(|g| g.results)
            .filter(|r| seen.insert(r.id))
            .collect()
    }
}

pub struct ResultAssembler;

impl ResultAssembler {
    /// Pairs `fused[i]` with sub-query `i`.
    pub fn assemble(
        request: &ValidatedRequest,
        fused: Vec<Vec<FusedResult>>,
    ) -> Result<SearchResults, SearchError> {
        if fused.len() != request.queries.len() {
            return Err(SearchError::Internal {
                stage: Stage::Fusion,
                message: format!(
                    "{} fused lists for {} sub-queries",
                    fused.len(),
                    request.queries.len()
                ),
            });
        }

        let groups = request
            .queries
            .iter()
            .zip(fused)
            .map(|(query, results)| FusedGroup {
                index: query.index,
                query: query.text.clone(),
                mode: query.mode(),
                results,
            })
            .collect();

        Ok(SearchResults { groups })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::filters::{FilterValidator, SearchRequest, SubQuery};

    fn result(id: i64, relevance: f64) -> FusedResult {
        FusedResult {
            id,
            relevance,
            content: String::new(),
            source: String::new(),
            surah: None,
            ayah: None,
        }
    }

    fn request() -> ValidatedRequest {
        let req = SearchRequest::new(
            "p",
            vec![SubQuery::new("first").with_surah(2), SubQuery::new("second")],
            5,
        );
        FilterValidator::default().validate(&req).unwrap()
    }

    #[test]
    fn test_groups_follow_sub_queries() {
        let results = ResultAssembler::assemble(
            &request(),
            vec![vec![result(1, 0.3)], vec![result(2, 0.2), result(1, 0.1)]],
        )
        .unwrap();

        let groups = results.groups();
        assert_eq!(groups[0].index, 0);
        assert_eq!(groups[0].query, "first");
        assert_eq!(groups[1].query, "second");
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_into_ranked_drops_repeats() {
        let results = ResultAssembler::assemble(
            &request(),
            vec![vec![result(1, 0.3), result(3, 0.2)], vec![result(2, 0.2), result(1, 0.1)]],
        )
        .unwrap();

        let ids: Vec<_> = results.into_ranked().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn test_into_ranked_keeps_distinct_ids_with_equal_text() {
        let quoted = |id| FusedResult {
            content: "There is no compulsion in religion".to_string(),
            ..result(id, 0.2)
        };
        let results =
            ResultAssembler::assemble(&request(), vec![vec![quoted(4)], vec![quoted(5), quoted(4)]])
                .unwrap();

        let ids: Vec<_> = results.into_ranked().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn test_length_mismatch_is_internal() {
        let err = ResultAssembler::assemble(&request(), vec![vec![]]).unwrap_err();
        assert!(matches!(err, SearchError::Internal { stage: Stage::Fusion, .. }));
        assert!(!err.is_invalid_request());
    }
}
