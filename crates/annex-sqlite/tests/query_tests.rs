//! Range query and end-to-end tests for SqliteStore

use std::thread;

use annex_core::model::FittedLayout;
use annex_core::{
    find_similar, load_model, populate, rerank, save_model, train, Candidate, Error,
    Hyperparameters, Metric, PopulateConfig, QueryRequest, Record, ReductionModel, SampleConfig,
    TrainConfig, VectorStore,
};
use annex_reduce::UmapReducer;
use annex_sqlite::SqliteStore;
use pretty_assertions::assert_eq;

/// Store whose embeddings are set directly, bypassing any model.
fn embedded_store(rows: &[(&str, Vec<f32>)]) -> SqliteStore {
    let mut store = SqliteStore::in_memory().unwrap();
    let records: Vec<Record> = rows
        .iter()
        .map(|(id, _)| Record::new(*id, vec![0.0]))
        .collect();
    store.put_records(&records).unwrap();
    store.begin_generation("g").unwrap();
    let batch: Vec<(String, Vec<f32>)> = rows
        .iter()
        .map(|(id, e)| (id.to_string(), e.clone()))
        .collect();
    store.write_embeddings("g", &batch).unwrap();
    store
}

fn ids(candidates: &[Candidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.id.as_str()).collect()
}

#[test]
fn test_ordered_by_distance_then_id() {
    let store = embedded_store(&[
        ("d", vec![0.0, 2.0]),
        ("b", vec![1.0, 0.0]),
        ("a", vec![0.0, 1.0]),
        ("c", vec![0.5, 0.0]),
    ]);
    let hits = store
        .within_radius(&[0.0, 0.0], Metric::Euclidean, 10.0, 10, false)
        .unwrap();
    assert_eq!(ids(&hits), vec!["c", "a", "b", "d"]);
}

#[test]
fn test_radius_is_exclusive() {
    let store = embedded_store(&[("edge", vec![3.0, 4.0]), ("inside", vec![0.0, 1.0])]);

    let hits = store
        .within_radius(&[0.0, 0.0], Metric::Euclidean, 5.0, 10, false)
        .unwrap();
    assert_eq!(ids(&hits), vec!["inside"]);

    let hits = store
        .within_radius(&[0.0, 0.0], Metric::Euclidean, 5.001, 10, false)
        .unwrap();
    assert_eq!(ids(&hits), vec!["inside", "edge"]);

    let none = store
        .within_radius(&[0.0, 0.0], Metric::Euclidean, 0.0, 10, false)
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_limit_and_raw_vectors() {
    let store = embedded_store(&[
        ("a", vec![0.0]),
        ("b", vec![1.0]),
        ("c", vec![2.0]),
    ]);

    let hits = store
        .within_radius(&[0.0], Metric::Euclidean, 10.0, 2, true)
        .unwrap();
    assert_eq!(ids(&hits), vec!["a", "b"]);
    assert!(hits.iter().all(|c| c.raw_vector == Some(vec![0.0])));

    let bare = store
        .within_radius(&[0.0], Metric::Euclidean, 10.0, 2, false)
        .unwrap();
    assert!(bare.iter().all(|c| c.raw_vector.is_none()));
}

#[test]
fn test_metrics_agree_with_core() {
    let rows = vec![
        ("a", vec![1.0, 2.0, 3.0]),
        ("b", vec![-1.0, 0.5, 2.0]),
        ("c", vec![4.0, 4.0, 1.0]),
    ];
    let store = embedded_store(&rows);
    let probe = [1.0, 1.0, 2.0];

    for metric in Metric::ALL {
        let hits = store.within_radius(&probe, metric, 100.0, 10, false).unwrap();
        assert_eq!(hits.len(), 3, "{}", metric);
        for hit in &hits {
            let (_, embedding) = rows.iter().find(|(id, _)| *id == hit.id).unwrap();
            let expected = metric.distance(embedding, &probe);
            assert!(
                (hit.distance - expected).abs() < 1e-4,
                "{} {}: {} vs {}",
                metric,
                hit.id,
                hit.distance,
                expected
            );
        }
    }
}

#[test]
fn test_cosine_keeps_zero_embeddings() {
    let rows = vec![("o", vec![1.0, 2.0]), ("zero", vec![0.0, 0.0])];
    let store = embedded_store(&rows);

    let hits = store
        .within_radius(&[1.0, 2.0], Metric::Cosine, 1.5, 10, false)
        .unwrap();
    assert_eq!(ids(&hits), vec!["o", "zero"]);
    assert_eq!(hits[1].distance, 1.0);

    let mut memory = annex_core::MemoryStore::new();
    memory
        .put_records(&[Record::new("o", vec![0.0]), Record::new("zero", vec![0.0])])
        .unwrap();
    memory.begin_generation("g").unwrap();
    let batch: Vec<(String, Vec<f32>)> = rows
        .iter()
        .map(|(id, e)| (id.to_string(), e.clone()))
        .collect();
    memory.write_embeddings("g", &batch).unwrap();
    let expected = memory
        .within_radius(&[1.0, 2.0], Metric::Cosine, 1.5, 10, false)
        .unwrap();
    assert_eq!(hits, expected);
}

fn line_model() -> ReductionModel {
    let params = Hyperparameters {
        neighbor_count: 2,
        target_dimension: 1,
        ..Default::default()
    };
    ReductionModel::new(
        params,
        FittedLayout {
            points: (0..5).map(|i| vec![i as f32, 0.0]).collect(),
            coordinates: (0..5).map(|i| vec![i as f32]).collect(),
        },
    )
    .unwrap()
}

fn line_store() -> SqliteStore {
    let mut store = SqliteStore::in_memory().unwrap();
    let records: Vec<Record> = (0..20)
        .map(|i| Record::new(format!("r{:02}", i), vec![i as f32 * 0.2, 0.0]))
        .collect();
    store.put_records(&records).unwrap();
    store
}

#[test]
fn test_populate_then_query() {
    let mut store = line_store();
    let model = line_model();

    let report = populate(&mut store, &model, &PopulateConfig::default()).unwrap();
    assert_eq!(report.updated, 20);
    let again = populate(&mut store, &model, &PopulateConfig::default()).unwrap();
    assert_eq!(again.updated, 0);

    let request = QueryRequest::new(vec![0.0, 0.0], 0.25, 25);
    let hits = find_similar(&store, &model, &request).unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "r00");
    assert!(hits.iter().all(|c| c.distance < 0.25));
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[test]
fn test_query_refuses_other_generation() {
    let mut store = line_store();
    let model = line_model();
    populate(&mut store, &model, &PopulateConfig::default()).unwrap();

    let other = ReductionModel::new(
        Hyperparameters {
            seed: Some(1),
            ..model.hyperparameters().clone()
        },
        model.fitted().clone(),
    )
    .unwrap();
    assert_ne!(other.generation(), model.generation());

    let request = QueryRequest::new(vec![0.0, 0.0], 1.0, 5);
    assert!(matches!(
        find_similar(&store, &other, &request),
        Err(Error::GenerationMismatch { .. })
    ));
    assert!(matches!(
        populate(&mut store, &other, &PopulateConfig::default()),
        Err(Error::GenerationMismatch { .. })
    ));
}

#[test]
fn test_concurrent_queries() {
    let mut store = line_store();
    let model = line_model();
    populate(&mut store, &model, &PopulateConfig::default()).unwrap();

    let expected = find_similar(&store, &model, &QueryRequest::new(vec![1.0, 0.0], 0.6, 10)).unwrap();
    thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    find_similar(&store, &model, &QueryRequest::new(vec![1.0, 0.0], 0.6, 10))
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_umap_pipeline_on_sqlite() {
    let mut store = SqliteStore::in_memory().unwrap();
    let mut records = Vec::new();
    for i in 0..60 {
        let jitter = i as f32 * 0.005;
        records.push(Record::new(format!("a{:02}", i), vec![jitter, 0.1 * jitter, 0.0, 0.2]));
        records.push(Record::new(format!("b{:02}", i), vec![8.0 + jitter, 8.0, 8.0 - jitter, 8.0]));
    }
    store.put_records(&records).unwrap();

    let config = TrainConfig {
        sample: SampleConfig {
            target_count: 100,
            probability: 1.0,
        },
        params: Hyperparameters {
            target_dimension: 3,
            neighbor_count: 5,
            seed: Some(3),
            n_epochs: Some(80),
            ..Default::default()
        },
    };
    let model = train(&store, &UmapReducer, &config).unwrap();
    save_model(&mut store, &model).unwrap();
    let model = load_model(&store).unwrap();

    populate(&mut store, &model, &PopulateConfig::default()).unwrap();
    assert_eq!(store.stats().unwrap().embedded, 120);

    let query = vec![0.1, 0.0, 0.0, 0.2];
    let request = QueryRequest::new(query.clone(), 1.0e6, 10).with_raw();
    let hits = find_similar(&store, &model, &request).unwrap();
    assert_eq!(hits.len(), 10);
    assert!(hits.iter().all(|c| c.id.starts_with('a')), "{:?}", ids(&hits));

    let reranked = rerank(&query, hits, Metric::Euclidean);
    assert_eq!(reranked.len(), 10);
    assert!(reranked.iter().all(|c| c.id.starts_with('a')));
}
