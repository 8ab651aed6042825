//! The trained reduction model and its transform.
//!
//! A [`ReductionModel`] is immutable once built. Retraining produces a new
//! model whose [`generation`](ReductionModel::generation) differs, and every
//! embedding in a store must come from the generation used to query it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::neighbors::{membership_strengths, nearest};
use crate::params::Hyperparameters;
use crate::storage::StoreError;

/// Fitted state: the training sample and where each sample point landed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLayout {
    /// Training points in raw space
    pub points: Vec<Vec<f32>>,
    /// Embedding coordinates, one row per entry of `points`
    pub coordinates: Vec<Vec<f32>>,
}

/// A trained transform from raw-vector space to embedding space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReductionModel {
    source_dimension: usize,
    target_dimension: usize,
    hyperparameters: Hyperparameters,
    generation: String,
    fitted: FittedLayout,
}

impl ReductionModel {
    /// Build a model from a fitted layout, checking shapes and stamping the generation.
    pub fn new(hyperparameters: Hyperparameters, fitted: FittedLayout) -> Result<Self> {
        hyperparameters.validate()?;

        let source_dimension = match fitted.points.first() {
            Some(p) => p.len(),
            None => return Err(Error::Fit("fitted layout has no points".to_string())),
        };
        if source_dimension == 0 {
            return Err(Error::Fit("training points have zero length".to_string()));
        }
        if fitted.points.len() != fitted.coordinates.len() {
            return Err(Error::Fit(format!(
                "{} points but {} coordinate rows",
                fitted.points.len(),
                fitted.coordinates.len()
            )));
        }
        if let Some(p) = fitted.points.iter().find(|p| p.len() != source_dimension) {
            return Err(Error::DimensionMismatch {
                expected: source_dimension,
                found: p.len(),
            });
        }
        let target_dimension = hyperparameters.target_dimension;
        if let Some(c) = fitted
            .coordinates
            .iter()
            .find(|c| c.len() != target_dimension)
        {
            return Err(Error::Fit(format!(
                "coordinate row has {} components, expected {}",
                c.len(),
                target_dimension
            )));
        }
        let all_finite = fitted
            .points
            .iter()
            .chain(fitted.coordinates.iter())
            .all(|row| row.iter().all(|x| x.is_finite()));
        if !all_finite {
            return Err(Error::Fit("fitted layout contains non-finite values".to_string()));
        }

        let generation = generation_of(source_dimension, &hyperparameters, &fitted);
        Ok(Self {
            source_dimension,
            target_dimension,
            hyperparameters,
            generation,
            fitted,
        })
    }

    pub fn source_dimension(&self) -> usize {
        self.source_dimension
    }

    pub fn target_dimension(&self) -> usize {
        self.target_dimension
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn metric(&self) -> Metric {
        self.hyperparameters.distance_metric
    }

    /// Content hash identifying this training outcome.
    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn fitted(&self) -> &FittedLayout {
        &self.fitted
    }

    /// Project one raw vector into embedding space.
    ///
    /// The embedding is the membership-weighted mean of the nearest training
    /// points' coordinates. Same model and input give the same bits.
    pub fn transform(&self, raw: &[f32]) -> Result<Vec<f32>> {
        if raw.len() != self.source_dimension {
            return Err(Error::DimensionMismatch {
                expected: self.source_dimension,
                found: raw.len(),
            });
        }
        if raw.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidRequest(
                "raw vector contains non-finite components".to_string(),
            ));
        }

        let neighbors = nearest(
            &self.fitted.points,
            raw,
            self.hyperparameters.neighbor_count,
            self.metric(),
            None,
        );
        let distances: Vec<f32> = neighbors.iter().map(|n| n.1).collect();
        let weights = membership_strengths(&distances);

        let mut acc = vec![0.0f64; self.target_dimension];
        let mut total = 0.0f64;
        for (&(idx, _), &w) in neighbors.iter().zip(&weights) {
            let w = w as f64;
            total += w;
            for (a, &c) in acc.iter_mut().zip(&self.fitted.coordinates[idx]) {
                *a += w * c as f64;
            }
        }

        Ok(acc.into_iter().map(|a| (a / total) as f32).collect())
    }

    /// Serialize to the opaque blob persisted by a model store.
    pub fn to_blob(&self) -> std::result::Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Load from a blob, rejecting blobs whose content no longer matches their generation.
    pub fn from_blob(blob: &[u8]) -> std::result::Result<Self, StoreError> {
        let stored: ReductionModel =
            serde_json::from_slice(blob).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let rebuilt = ReductionModel::new(stored.hyperparameters.clone(), stored.fitted.clone())
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        if rebuilt.generation != stored.generation {
            return Err(StoreError::InvalidData(format!(
                "model blob generation {} does not match its content ({})",
                stored.generation, rebuilt.generation
            )));
        }
        Ok(rebuilt)
    }
}

fn generation_of(source_dimension: usize, params: &Hyperparameters, fitted: &FittedLayout) -> String {
    let mut h = Sha256::new();

    h.update(b"annex-model-v1\nd:");
    h.update((source_dimension as u64).to_le_bytes());
    h.update(b"\nh:");
    // Hyperparameters is plain data; serialization cannot fail
    h.update(serde_json::to_vec(params).unwrap_or_default());
    h.update(b"\np:");
    for x in fitted.points.iter().flatten() {
        h.update(x.to_le_bytes());
    }
    h.update(b"\nc:");
    for x in fitted.coordinates.iter().flatten() {
        h.update(x.to_le_bytes());
    }

    let digest = h.finalize();
    hex(&digest[..8])
}

fn hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    s
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 1-d points on a line, embedded as themselves in 2-d.
    pub(crate) fn line_model(n: usize) -> ReductionModel {
        let points: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32, 0.0, 0.0]).collect();
        let coordinates: Vec<Vec<f32>> = (0..n).map(|i| vec![i as f32, 0.0]).collect();
        let params = Hyperparameters {
            neighbor_count: 3,
            target_dimension: 2,
            seed: Some(7),
            ..Default::default()
        };
        ReductionModel::new(params, FittedLayout { points, coordinates }).unwrap()
    }

    #[test]
    fn transform_is_deterministic() {
        let model = line_model(20);
        let v = [4.3f32, 0.2, -0.1];
        let first = model.transform(&v).unwrap();
        for _ in 0..10 {
            let again = model.transform(&v).unwrap();
            assert_eq!(
                first.iter().map(|x| x.to_bits()).collect::<Vec<_>>(),
                again.iter().map(|x| x.to_bits()).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn transform_stays_near_neighbors() {
        let model = line_model(20);
        let e = model.transform(&[10.0, 0.0, 0.0]).unwrap();
        assert_eq!(e.len(), 2);
        assert!((e[0] - 10.0).abs() < 1.0, "got {:?}", e);
    }

    #[test]
    fn transform_rejects_wrong_length() {
        let model = line_model(5);
        match model.transform(&[1.0, 2.0]) {
            Err(Error::DimensionMismatch { expected, found }) => {
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn transform_rejects_nan() {
        let model = line_model(5);
        assert!(matches!(
            model.transform(&[f32::NAN, 0.0, 0.0]),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn generation_changes_with_content() {
        let a = line_model(5);
        let b = line_model(6);
        assert_eq!(a.generation().len(), 16);
        assert_ne!(a.generation(), b.generation());
        assert_eq!(a.generation(), line_model(5).generation());
    }

    #[test]
    fn blob_round_trip_preserves_transform() {
        let model = line_model(12);
        let restored = ReductionModel::from_blob(&model.to_blob().unwrap()).unwrap();
        assert_eq!(restored, model);
        let v = [3.7f32, 1.0, 0.5];
        assert_eq!(restored.transform(&v).unwrap(), model.transform(&v).unwrap());
    }

    #[test]
    fn tampered_blob_rejected() {
        let model = line_model(4);
        let mut value: serde_json::Value = serde_json::from_slice(&model.to_blob().unwrap()).unwrap();
        value["fitted"]["coordinates"][0][0] = serde_json::json!(42.0);
        let blob = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            ReductionModel::from_blob(&blob),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn ragged_layout_rejected() {
        let fitted = FittedLayout {
            points: vec![vec![0.0, 1.0], vec![1.0]],
            coordinates: vec![vec![0.0], vec![1.0]],
        };
        let params = Hyperparameters {
            target_dimension: 1,
            ..Default::default()
        };
        assert!(matches!(
            ReductionModel::new(params, fitted),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
