//! Candidate budget for one search call.

/// Default over-fetch factor applied to `final_k`.
pub const OVER_FETCH_MULTIPLIER: usize = 10;

/// How many candidates each storage call may return.
///
/// `final_k` is expanded by the over-fetch multiplier, split evenly between
/// the semantic and lexical branches, then evenly across sub-queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalBudget {
    pub total: usize,
    pub per_branch: usize,
    pub per_query: usize,
}

impl RetrievalBudget {
    pub fn new(final_k: usize, sub_queries: usize, multiplier: usize) -> Self {
        let total = final_k.saturating_mul(multiplier);
        let per_branch = total / 2;
        let per_query = (per_branch / sub_queries.max(1)).max(1);
        Self {
            total,
            per_branch,
            per_query,
        }
    }

    pub fn with_default_multiplier(final_k: usize, sub_queries: usize) -> Self {
        Self::new(final_k, sub_queries, OVER_FETCH_MULTIPLIER)
    }
}
