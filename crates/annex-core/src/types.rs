//! Records, candidates and store bookkeeping types

use serde::{Deserialize, Serialize};

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default, alias = "vector")]
    pub raw_vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Record {
    /// A record with a raw vector and no embedding yet.
    pub fn new(id: impl Into<String>, raw_vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            raw_vector: Some(raw_vector),
            embedding: None,
        }
    }

    /// A record without a raw vector.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_vector: None,
            embedding: None,
        }
    }
}

/// A range-query hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub distance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_vector: Option<Vec<f32>>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, distance: f32) -> Self {
        Self {
            id: id.into(),
            distance,
            raw_vector: None,
        }
    }
}

/// Sort candidates ascending by distance, equal distances by id.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Bounds on the ids a paginated read may return.
///
/// Disjoint ranges let several populators work the same store without
/// overlapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRange {
    /// Only ids strictly greater than this
    pub after: Option<String>,
    /// Only ids less than or equal to this
    pub through: Option<String>,
}

impl IdRange {
    /// Every id.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.after.as_deref().map_or(true, |a| id > a)
            && self.through.as_deref().map_or(true, |t| id <= t)
    }

    /// The same upper bound, resuming after `id`.
    pub fn resume_after(&self, id: &str) -> Self {
        Self {
            after: Some(id.to_string()),
            through: self.through.clone(),
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_records: usize,
    pub with_raw_vector: usize,
    pub embedded: usize,
    pub generation: Option<String>,
}
