//! SQLite backend implementing the VectorStore and ModelStore traits

use std::path::Path;

use annex_core::format::format_embedding;
use annex_core::model_store::ModelStore;
use annex_core::{
    sort_candidates, Candidate, IdRange, Metric, Record, StoreError, StoreResult, StoreStats,
    VectorStore,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, SqliteError};
use crate::vec::{decode_vector, distance_function, encode_vector, init_vec_extension, register_functions};

/// Key of the generation stamp in `store_meta`.
const GENERATION_KEY: &str = "generation";

/// Resolution of the Bernoulli draw in `sample`.
const SAMPLE_RESOLUTION: f64 = 1_000_000.0;

/// SQLite-backed record, embedding and model store
///
/// Reads lock the connection for the duration of one statement, so a shared
/// `&SqliteStore` can serve queries from several threads.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap a connection that already has migrations applied
    ///
    /// The connection must have been opened after [`init_vec_extension`].
    /// Use [`crate::migrate::migrate`] to initialize a fresh database.
    pub fn new(conn: Connection) -> Result<Self> {
        register_functions(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new in-memory SQLite store (for testing)
    pub fn in_memory() -> Result<Self> {
        init_vec_extension();
        let conn = Connection::open_in_memory()?;
        crate::migrate::migrate(&conn)?;
        Self::new(conn)
    }

    /// Open (or create) a file-backed store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        init_vec_extension();
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))?;
        crate::migrate::migrate(&conn)?;
        debug!("Opened SQLite store at {}", path.display());
        Self::new(conn)
    }

    /// Fetch one record, embedding included
    pub fn record(&self, id: &str) -> StoreResult<Option<Record>> {
        Ok(self.fetch_record(id)?)
    }

    fn fetch_record(&self, id: &str) -> Result<Option<Record>> {
        let conn = self.conn.lock();
        let row: Option<(Option<Vec<u8>>, Option<Vec<u8>>)> = conn
            .query_row(
                "SELECT raw_vector, embedding FROM records WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((raw, embedding)) => Ok(Some(Record {
                id: id.to_string(),
                raw_vector: raw.as_deref().map(decode_vector).transpose()?,
                embedding: embedding.as_deref().map(decode_vector).transpose()?,
            })),
        }
    }

    fn insert_records(&mut self, records: &[Record]) -> Result<usize> {
        let tx = self.conn.get_mut().transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (id, raw_vector, embedding, generation)
                 VALUES (?1, ?2, NULL, NULL)
                 ON CONFLICT(id) DO UPDATE SET
                     raw_vector = excluded.raw_vector,
                     embedding = NULL,
                     generation = NULL",
            )?;
            for record in records {
                let raw = record.raw_vector.as_deref().map(encode_vector);
                stmt.execute(params![record.id, raw])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn sample_rows(&self, probability: f64, limit: usize) -> Result<Vec<(String, Vec<f32>)>> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(SqliteError::InvalidData(format!(
                "sampling probability {} outside [0, 1]",
                probability
            )));
        }
        let threshold = (probability * SAMPLE_RESOLUTION).round() as i64;

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, raw_vector FROM records
             WHERE raw_vector IS NOT NULL AND abs(random() % ?1) < ?2
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![SAMPLE_RESOLUTION as i64, threshold, limit as i64],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
        )?;
        collect_vectors(rows)
    }

    fn pending_rows(&self, range: &IdRange, limit: usize) -> Result<Vec<(String, Vec<f32>)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, raw_vector FROM records
             WHERE embedding IS NULL AND raw_vector IS NOT NULL
               AND (?1 IS NULL OR id > ?1)
               AND (?2 IS NULL OR id <= ?2)
             ORDER BY id ASC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            params![range.after, range.through, limit as i64],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
        )?;
        collect_vectors(rows)
    }

    fn update_embeddings(&mut self, generation: &str, batch: &[(String, Vec<f32>)]) -> Result<usize> {
        let max = self.max_dimension();
        let tx = self.conn.get_mut().transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                [GENERATION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        if current.as_deref() != Some(generation) {
            return Err(SqliteError::InvalidData(format!(
                "store is not at generation {}",
                generation
            )));
        }

        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE records SET embedding = vec_f32(?1), generation = ?2
                 WHERE id = ?3 AND embedding IS NULL AND raw_vector IS NOT NULL",
            )?;
            for (id, embedding) in batch {
                if embedding.is_empty() || embedding.len() > max {
                    return Err(SqliteError::InvalidData(format!(
                        "embedding for {} has {} components, index holds 1 to {}",
                        id,
                        embedding.len(),
                        max
                    )));
                }
                let text = format_embedding(embedding)
                    .map_err(|e| SqliteError::InvalidData(e.to_string()))?;
                written += stmt.execute(params![text, generation, id])?;
            }
        }
        // dropping tx without commit rolls back every row on error
        tx.commit()?;
        Ok(written)
    }

    fn range_query(
        &self,
        probe: &[f32],
        metric: Metric,
        radius: f32,
        limit: usize,
        include_raw: bool,
    ) -> Result<Vec<Candidate>> {
        // The function name comes from a fixed table; every value is a parameter.
        let sql = format!(
            "SELECT id, distance, raw FROM (
                 SELECT id,
                        CASE WHEN length(embedding) = ?2 THEN {f}(embedding, ?1) END AS distance,
                        CASE WHEN ?3 THEN raw_vector END AS raw
                 FROM records
                 WHERE embedding IS NOT NULL
             )
             WHERE distance < ?4
             ORDER BY distance ASC, id ASC
             LIMIT ?5",
            f = distance_function(metric)
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                encode_vector(probe),
                (probe.len() * 4) as i64,
                include_raw,
                radius as f64,
                limit as i64
            ],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, Option<Vec<u8>>>(2)?,
                ))
            },
        )?;

        let mut candidates = Vec::new();
        for row in rows {
            let (id, distance, raw) = row?;
            candidates.push(Candidate {
                id,
                distance: distance as f32,
                raw_vector: raw.as_deref().map(decode_vector).transpose()?,
            });
        }
        // f32 rounding can tie rows SQLite ordered as distinct
        sort_candidates(&mut candidates);
        Ok(candidates)
    }

    fn read_generation(&self) -> Result<Option<String>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                [GENERATION_KEY],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn reset_generation(&mut self, generation: &str) -> Result<()> {
        let tx = self.conn.get_mut().transaction()?;
        let cleared = tx.execute(
            "UPDATE records SET embedding = NULL, generation = NULL WHERE embedding IS NOT NULL",
            [],
        )?;
        tx.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![GENERATION_KEY, generation],
        )?;
        tx.commit()?;
        debug!("Generation {} started, cleared {} embeddings", generation, cleared);
        Ok(())
    }

    fn count_records(&self) -> Result<StoreStats> {
        let (total, with_raw, embedded) = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT COUNT(*), COUNT(raw_vector), COUNT(embedding) FROM records",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
            )?
        };
        Ok(StoreStats {
            total_records: total as usize,
            with_raw_vector: with_raw as usize,
            embedded: embedded as usize,
            generation: self.read_generation()?,
        })
    }

    fn write_blob(&mut self, name: &str, blob: &[u8]) -> Result<()> {
        self.conn.get_mut().execute(
            "INSERT INTO models (name, blob, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(name) DO UPDATE SET blob = excluded.blob, updated_at = excluded.updated_at",
            params![name, blob],
        )?;
        Ok(())
    }

    fn read_blob(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row("SELECT blob FROM models WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?)
    }
}

fn collect_vectors(
    rows: impl Iterator<Item = rusqlite::Result<(String, Vec<u8>)>>,
) -> Result<Vec<(String, Vec<f32>)>> {
    let mut out = Vec::new();
    for row in rows {
        let (id, blob) = row?;
        out.push((id, decode_vector(&blob)?));
    }
    Ok(out)
}

impl VectorStore for SqliteStore {
    fn put_records(&mut self, records: &[Record]) -> StoreResult<usize> {
        Ok(self.insert_records(records)?)
    }

    fn sample(&self, probability: f64, limit: usize) -> StoreResult<Vec<(String, Vec<f32>)>> {
        Ok(self.sample_rows(probability, limit)?)
    }

    fn pending(&self, range: &IdRange, limit: usize) -> StoreResult<Vec<(String, Vec<f32>)>> {
        Ok(self.pending_rows(range, limit)?)
    }

    fn write_embeddings(
        &mut self,
        generation: &str,
        batch: &[(String, Vec<f32>)],
    ) -> StoreResult<usize> {
        Ok(self.update_embeddings(generation, batch)?)
    }

    fn within_radius(
        &self,
        probe: &[f32],
        metric: Metric,
        radius: f32,
        limit: usize,
        include_raw: bool,
    ) -> StoreResult<Vec<Candidate>> {
        Ok(self.range_query(probe, metric, radius, limit, include_raw)?)
    }

    fn current_generation(&self) -> StoreResult<Option<String>> {
        Ok(self.read_generation()?)
    }

    fn begin_generation(&mut self, generation: &str) -> StoreResult<()> {
        Ok(self.reset_generation(generation)?)
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        Ok(self.count_records()?)
    }
}

impl ModelStore for SqliteStore {
    fn put_blob(&mut self, name: &str, blob: &[u8]) -> StoreResult<()> {
        Ok(self.write_blob(name, blob)?)
    }

    fn get_blob(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        self.read_blob(name).map_err(StoreError::from)
    }
}
