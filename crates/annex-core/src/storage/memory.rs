//! In-memory storage backend
//!
//! A BTreeMap-based implementation for testing and small corpora.
//! Not suitable for production use due to lack of persistence.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::metric::Metric;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::traits::VectorStore;
use crate::types::{sort_candidates, Candidate, IdRange, Record, StoreStats};

#[derive(Debug, Clone)]
struct Entry {
    raw_vector: Option<Vec<f32>>,
    embedding: Option<Vec<f32>>,
}

/// In-memory vector store.
///
/// Records are kept in id order, which is also the order `pending` pages in.
#[derive(Debug)]
pub struct MemoryStore {
    records: BTreeMap<String, Entry>,
    generation: Option<String>,
    rng: Mutex<StdRng>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a store whose Bernoulli sampling is reproducible.
    pub fn with_sampling_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            records: BTreeMap::new(),
            generation: None,
            rng: Mutex::new(rng),
        }
    }

    /// Create a memory store with initial records.
    pub fn with_records(records: Vec<Record>) -> Self {
        let mut store = Self::new();
        // in-memory inserts cannot fail
        let _ = store.put_records(&records);
        store
    }

    /// Stored embedding for `id`, if any.
    pub fn embedding(&self, id: &str) -> Option<&[f32]> {
        self.records.get(id)?.embedding.as_deref()
    }

    /// Snapshot of every record, in id order.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .iter()
            .map(|(id, e)| Record {
                id: id.clone(),
                raw_vector: e.raw_vector.clone(),
                embedding: e.embedding.clone(),
            })
            .collect()
    }
}

impl VectorStore for MemoryStore {
    fn put_records(&mut self, records: &[Record]) -> StoreResult<usize> {
        for record in records {
            self.records.insert(
                record.id.clone(),
                Entry {
                    raw_vector: record.raw_vector.clone(),
                    embedding: None,
                },
            );
        }
        Ok(records.len())
    }

    fn sample(&self, probability: f64, limit: usize) -> StoreResult<Vec<(String, Vec<f32>)>> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(StoreError::InvalidData(format!(
                "sampling probability {} outside [0, 1]",
                probability
            )));
        }

        let mut rng = self.rng.lock();
        let sample = self
            .records
            .iter()
            .filter_map(|(id, e)| e.raw_vector.as_ref().map(|v| (id, v)))
            .filter(|_| rng.gen_bool(probability))
            .take(limit)
            .map(|(id, v)| (id.clone(), v.clone()))
            .collect();
        Ok(sample)
    }

    fn pending(&self, range: &IdRange, limit: usize) -> StoreResult<Vec<(String, Vec<f32>)>> {
        Ok(self
            .records
            .iter()
            .filter(|(id, _)| range.contains(id))
            .filter(|(_, e)| e.embedding.is_none())
            .filter_map(|(id, e)| e.raw_vector.as_ref().map(|v| (id.clone(), v.clone())))
            .take(limit)
            .collect())
    }

    fn write_embeddings(
        &mut self,
        generation: &str,
        batch: &[(String, Vec<f32>)],
    ) -> StoreResult<usize> {
        if self.generation.as_deref() != Some(generation) {
            return Err(StoreError::InvalidData(format!(
                "store is not at generation {}",
                generation
            )));
        }
        if let Some((id, e)) = batch.iter().find(|(_, e)| e.len() > self.max_dimension()) {
            return Err(StoreError::InvalidData(format!(
                "embedding for {} has {} components, index holds at most {}",
                id,
                e.len(),
                self.max_dimension()
            )));
        }

        let mut written = 0;
        for (id, embedding) in batch {
            if let Some(entry) = self.records.get_mut(id) {
                if entry.embedding.is_none() && entry.raw_vector.is_some() {
                    entry.embedding = Some(embedding.clone());
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    fn within_radius(
        &self,
        probe: &[f32],
        metric: Metric,
        radius: f32,
        limit: usize,
        include_raw: bool,
    ) -> StoreResult<Vec<Candidate>> {
        let mut hits: Vec<Candidate> = self
            .records
            .iter()
            .filter_map(|(id, e)| {
                let embedding = e.embedding.as_ref()?;
                if embedding.len() != probe.len() {
                    return None;
                }
                let distance = metric.distance(embedding, probe);
                (distance < radius).then(|| Candidate {
                    id: id.clone(),
                    distance,
                    raw_vector: if include_raw {
                        e.raw_vector.clone()
                    } else {
                        None
                    },
                })
            })
            .collect();

        sort_candidates(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    fn current_generation(&self) -> StoreResult<Option<String>> {
        Ok(self.generation.clone())
    }

    fn begin_generation(&mut self, generation: &str) -> StoreResult<()> {
        for entry in self.records.values_mut() {
            entry.embedding = None;
        }
        self.generation = Some(generation.to_string());
        Ok(())
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        Ok(StoreStats {
            total_records: self.records.len(),
            with_raw_vector: self
                .records
                .values()
                .filter(|e| e.raw_vector.is_some())
                .count(),
            embedded: self
                .records
                .values()
                .filter(|e| e.embedding.is_some())
                .count(),
            generation: self.generation.clone(),
        })
    }
}
