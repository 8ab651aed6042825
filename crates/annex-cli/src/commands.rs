//! Subcommand implementations over a SQLite store.

use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use annex_core::format::parse_embedding;
use annex_core::{
    find_similar, load_model, populate, rerank, save_model, train, Candidate, FileModelStore,
    PopulateConfig, PopulateReport, QueryRequest, Record, ReductionModel, StoreStats, TrainConfig,
    VectorStore,
};
use annex_reduce::UmapReducer;
use annex_sqlite::SqliteStore;
use serde::Serialize;
use tracing::{info, warn};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Current model, from `model_dir` when given, otherwise the database.
pub fn current_model(store: &SqliteStore, model_dir: Option<&Path>) -> CliResult<ReductionModel> {
    let model = match model_dir {
        Some(dir) => load_model(&FileModelStore::open(dir)?)?,
        None => load_model(store)?,
    };
    Ok(model)
}

fn store_model(
    store: &mut SqliteStore,
    model_dir: Option<&Path>,
    model: &ReductionModel,
) -> CliResult<()> {
    match model_dir {
        Some(dir) => save_model(&mut FileModelStore::open(dir)?, model)?,
        None => save_model(store, model)?,
    }
    Ok(())
}

/// Parse JSON-lines records, skipping blank lines.
pub fn read_records(reader: impl BufRead) -> CliResult<Vec<Record>> {
    let mut records = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record =
            serde_json::from_str(&line).map_err(|e| format!("line {}: {}", n + 1, e))?;
        records.push(record);
    }
    Ok(records)
}

/// Insert the records of a JSON-lines file in batches.
pub fn load_file(store: &mut SqliteStore, input: &Path, batch_size: usize) -> CliResult<usize> {
    let file = File::open(input)
        .map_err(|e| format!("Cannot open '{}': {}", input.display(), e))?;
    let records = read_records(BufReader::new(file))?;

    let start = Instant::now();
    let mut loaded = 0;
    for chunk in records.chunks(batch_size.max(1)) {
        loaded += store.put_records(chunk)?;
    }
    info!(
        "Loaded {} records from {} in {}ms",
        loaded,
        input.display(),
        start.elapsed().as_millis()
    );
    Ok(loaded)
}

/// Fit a new model on a sample of the store and save it as current.
pub fn train_model(
    store: &mut SqliteStore,
    model_dir: Option<&Path>,
    config: &TrainConfig,
) -> CliResult<ReductionModel> {
    let model = train(&*store, &UmapReducer, config)?;
    store_model(store, model_dir, &model)?;
    Ok(model)
}

/// Embed pending records with the current model.
///
/// With `reset`, a store stamped with another generation is cleared and
/// claimed for the current model first.
pub fn populate_store(
    store: &mut SqliteStore,
    model_dir: Option<&Path>,
    config: &PopulateConfig,
    reset: bool,
) -> CliResult<PopulateReport> {
    let model = current_model(store, model_dir)?;

    if reset {
        if let Some(previous) = store.current_generation()? {
            if previous != model.generation() {
                warn!(
                    "Discarding embeddings of generation {} for {}",
                    previous,
                    model.generation()
                );
                store.begin_generation(model.generation())?;
            }
        }
    }

    Ok(populate(store, &model, config)?)
}

/// Parse a query vector given inline as `[x, y, ...]`.
pub fn parse_vector(text: &str) -> CliResult<Vec<f32>> {
    let vector = parse_embedding(text)?;
    if vector.is_empty() {
        return Err("query vector is empty".into());
    }
    Ok(vector)
}

/// Read a query vector from a JSON array file.
pub fn read_vector(path: &Path) -> CliResult<Vec<f32>> {
    let file = File::open(path).map_err(|e| format!("Cannot open '{}': {}", path.display(), e))?;
    let vector: Vec<f32> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| format!("Invalid vector file '{}': {}", path.display(), e))?;
    Ok(vector)
}

/// Range query, optionally reranked by raw-space distance.
pub fn run_query(
    store: &SqliteStore,
    model_dir: Option<&Path>,
    request: &QueryRequest,
    rerank_raw: bool,
) -> CliResult<Vec<Candidate>> {
    let model = current_model(store, model_dir)?;
    if !rerank_raw {
        return Ok(find_similar(store, &model, request)?);
    }

    let request = request.clone().with_raw();
    let candidates = find_similar(store, &model, &request)?;
    Ok(rerank(&request.raw_vector, candidates, model.metric()))
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub store: StoreStats,
    pub model_generation: Option<String>,
    /// Store embeddings come from the saved model
    pub in_sync: bool,
}

/// Record counts and the generations of store and saved model.
pub fn status(store: &SqliteStore, model_dir: Option<&Path>) -> CliResult<Status> {
    let stats = store.stats()?;
    let model_generation = match current_model(store, model_dir) {
        Ok(model) => Some(model.generation().to_string()),
        Err(e) => {
            warn!("No usable model: {}", e);
            None
        }
    };
    let in_sync = model_generation.is_some() && model_generation == stats.generation;
    Ok(Status {
        store: stats,
        model_generation,
        in_sync,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use annex_core::{Hyperparameters, SampleConfig};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_lines(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    fn cluster_lines() -> Vec<String> {
        let mut lines = Vec::new();
        for i in 0..40 {
            let t = i as f32 * 0.01;
            lines.push(format!(r#"{{"id": "a{:02}", "vector": [{}, 0.0, 0.5]}}"#, i, t));
            lines.push(format!(r#"{{"id": "b{:02}", "vector": [5.0, {}, 5.0]}}"#, i, 5.0 + t));
        }
        lines.push(r#"{"id": "empty", "vector": null}"#.to_string());
        lines
    }

    fn train_config() -> TrainConfig {
        TrainConfig {
            sample: SampleConfig {
                target_count: 1000,
                probability: 1.0,
            },
            params: Hyperparameters {
                neighbor_count: 4,
                target_dimension: 2,
                seed: Some(8),
                n_epochs: Some(50),
                ..Default::default()
            },
        }
    }

    #[test]
    fn read_records_reports_line_numbers() {
        let text = "{\"id\": \"a\", \"vector\": [1.0]}\n\n{\"id\": \"b\", \"vector\": oops}\n";
        let err = read_records(text.as_bytes()).unwrap_err().to_string();
        assert!(err.starts_with("line 3:"), "{}", err);
    }

    #[test]
    fn read_records_accepts_null_vectors() {
        let text = "{\"id\": \"a\", \"vector\": null}\n{\"id\": \"b\", \"raw_vector\": [2.0]}\n";
        let records = read_records(text.as_bytes()).unwrap();
        assert_eq!(records, vec![Record::empty("a"), Record::new("b", vec![2.0])]);
    }

    #[test]
    fn parse_vector_forms() {
        assert_eq!(parse_vector("[1, 2.5]").unwrap(), vec![1.0, 2.5]);
        assert!(parse_vector("[]").is_err());
        assert!(parse_vector("1,2").is_err());
    }

    #[test]
    fn load_train_populate_query() {
        let mut store = SqliteStore::in_memory().unwrap();
        let input = write_lines(&cluster_lines());
        assert_eq!(load_file(&mut store, input.path(), 16).unwrap(), 81);

        let model = train_model(&mut store, None, &train_config()).unwrap();
        let report = populate_store(&mut store, None, &PopulateConfig::default(), false).unwrap();
        assert_eq!(report.updated, 80);

        let state = status(&store, None).unwrap();
        assert!(state.in_sync);
        assert_eq!(state.model_generation.as_deref(), Some(model.generation()));
        assert_eq!(state.store.embedded, 80);

        let request = QueryRequest::new(vec![0.1, 0.0, 0.5], 1.0e6, 10);
        let hits = run_query(&store, None, &request, true).unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.iter().all(|c| c.id.starts_with('a')));
        assert_eq!(hits[0].id, "a10");
    }

    #[test]
    fn retrain_requires_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::in_memory().unwrap();
        let input = write_lines(&cluster_lines());
        load_file(&mut store, input.path(), 100).unwrap();

        train_model(&mut store, Some(dir.path()), &train_config()).unwrap();
        populate_store(&mut store, Some(dir.path()), &PopulateConfig::default(), false).unwrap();

        let mut config = train_config();
        config.params.seed = Some(9);
        let second = train_model(&mut store, Some(dir.path()), &config).unwrap();
        assert!(!status(&store, Some(dir.path())).unwrap().in_sync);

        assert!(populate_store(&mut store, Some(dir.path()), &PopulateConfig::default(), false).is_err());
        let report =
            populate_store(&mut store, Some(dir.path()), &PopulateConfig::default(), true).unwrap();
        assert_eq!(report.updated, 80);
        assert_eq!(
            store.current_generation().unwrap().as_deref(),
            Some(second.generation())
        );
    }
}
