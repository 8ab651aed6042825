//! Exact reranking of range-query candidates in raw space.

use tracing::warn;

use crate::metric::Metric;
use crate::types::{sort_candidates, Candidate};

/// Replace each candidate's reduced-space distance with its exact raw-space
/// distance to `query` and re-sort.
///
/// Candidates without a raw vector of the query's length cannot be scored
/// and are dropped.
pub fn rerank(query: &[f32], candidates: Vec<Candidate>, metric: Metric) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .filter_map(|mut c| {
            let distance = match c.raw_vector.as_deref() {
                Some(raw) if raw.len() == query.len() => metric.distance(query, raw),
                _ => {
                    warn!("Cannot rerank {}: no comparable raw vector", c.id);
                    return None;
                }
            };
            c.distance = distance;
            Some(c)
        })
        .collect();

    sort_candidates(&mut ranked);
    ranked
}
