//! Population phase: embed every record that lacks an embedding.
//!
//! Pages through pending records in id order, transforms each page through
//! the model and writes the page back in one batched call. Records whose raw
//! vector cannot be transformed are counted and skipped; the cursor moves past
//! them so they are not read again in the same run.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::ReductionModel;
use crate::storage::{StoreError, StoreResult, VectorStore};
use crate::types::IdRange;

/// Backoff schedule for transient store failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Fail on the first error.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Configuration for a population run.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulateConfig {
    /// Records read, transformed and written per round trip
    pub batch_size: usize,
    /// Ids this run is responsible for
    pub range: IdRange,
    pub retry: RetryPolicy,
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            range: IdRange::all(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of a population run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// Embeddings written
    pub updated: usize,
    /// Records whose raw vector could not be transformed
    pub skipped: usize,
    /// Non-empty pages processed
    pub batches: usize,
    /// Store operations retried after a transient failure
    pub retries: usize,
}

/// Embed every pending record in `config.range` with `model`.
///
/// Safe to re-run after a failure: only records without an embedding are
/// read, and the store ignores writes to rows that already have one.
pub fn populate<S: VectorStore + ?Sized>(
    store: &mut S,
    model: &ReductionModel,
    config: &PopulateConfig,
) -> Result<PopulateReport> {
    if config.batch_size == 0 {
        return Err(Error::InvalidRequest("batch_size must be positive".to_string()));
    }
    if model.target_dimension() > store.max_dimension() {
        return Err(Error::DimensionTooLarge {
            requested: model.target_dimension(),
            max: store.max_dimension(),
        });
    }

    let mut report = PopulateReport::default();
    let generation = model.generation();
    claim_generation(store, generation, &config.retry, &mut report)?;

    info!(
        "Populating embeddings with model {} (batch size {})",
        generation, config.batch_size
    );
    let start = Instant::now();
    let mut range = config.range.clone();

    loop {
        let rows = with_retry(&config.retry, "read pending batch", &mut report, || {
            store.pending(&range, config.batch_size)
        })?;
        let last_id = match rows.last() {
            Some((id, _)) => id.clone(),
            None => break,
        };

        let mut batch = Vec::with_capacity(rows.len());
        for (id, raw) in rows {
            match embed(model, &raw) {
                Ok(embedding) => batch.push((id, embedding)),
                Err(e) => {
                    warn!("Skipping record {}: {}", id, e);
                    report.skipped += 1;
                }
            }
        }

        let written = if batch.is_empty() {
            0
        } else {
            with_retry(&config.retry, "write embeddings", &mut report, || {
                store.write_embeddings(generation, &batch)
            })?
        };

        report.updated += written;
        report.batches += 1;
        debug!(
            "Batch {}: wrote {} of {} embeddings (through id {})",
            report.batches,
            written,
            batch.len(),
            last_id
        );
        range = range.resume_after(&last_id);
    }

    info!(
        "Population complete: {} updated, {} skipped in {} batches ({}ms)",
        report.updated,
        report.skipped,
        report.batches,
        start.elapsed().as_millis()
    );
    Ok(report)
}

/// Stamp an unstamped store with `generation`, or refuse a store holding another one.
fn claim_generation<S: VectorStore + ?Sized>(
    store: &mut S,
    generation: &str,
    retry: &RetryPolicy,
    report: &mut PopulateReport,
) -> Result<()> {
    let current = with_retry(retry, "read generation", report, || store.current_generation())?;
    match current {
        Some(g) if g == generation => Ok(()),
        Some(g) => Err(Error::GenerationMismatch {
            model: generation.to_string(),
            store: Some(g),
        }),
        None => {
            info!("Store has no generation, starting {}", generation);
            with_retry(retry, "begin generation", report, || {
                store.begin_generation(generation)
            })
        }
    }
}

fn embed(model: &ReductionModel, raw: &[f32]) -> Result<Vec<f32>> {
    let embedding = model.transform(raw)?;
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(Error::Fit("transform produced non-finite components".to_string()));
    }
    Ok(embedding)
}

fn with_retry<T, F>(
    policy: &RetryPolicy,
    what: &str,
    report: &mut PopulateReport,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> StoreResult<T>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(StoreError::Unavailable(msg)) if attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    "{} failed ({}), retry {}/{} in {}ms",
                    what,
                    msg,
                    attempt,
                    policy.max_attempts - 1,
                    delay.as_millis()
                );
                thread::sleep(delay);
                report.retries += 1;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
