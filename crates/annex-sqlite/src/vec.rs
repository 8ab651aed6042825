//! SQLite vector extension integration
//!
//! Registers sqlite-vec for every connection and adds the distance functions
//! sqlite-vec lacks or computes differently from [`Metric`]. Vectors are stored as little-endian f32 blobs, the
//! layout sqlite-vec reads natively.

use std::sync::Once;

use annex_core::Metric;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use zerocopy::IntoBytes;

use crate::error::{Result, SqliteError};

// Ensure sqlite-vec is initialized only once globally
static INIT: Once = Once::new();

/// Name of the registered correlation distance function.
pub const CORRELATION_FUNCTION: &str = "annex_distance_correlation";

/// Name of the registered cosine distance function.
///
/// sqlite-vec's `vec_distance_cosine` yields no distance for a zero-norm
/// vector; this one follows [`Metric::Cosine`] and returns 1.
pub const COSINE_FUNCTION: &str = "annex_distance_cosine";

/// Initialize sqlite-vec extension globally
///
/// Must run before the first connection is opened; the extension registers
/// itself as an auto-extension and loads into every later connection.
pub fn init_vec_extension() {
    INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    });
}

/// SQL distance function for `metric`, called as `f(embedding, probe)`.
pub fn distance_function(metric: Metric) -> &'static str {
    match metric {
        Metric::Euclidean => "vec_distance_l2",
        Metric::Manhattan => "vec_distance_l1",
        Metric::Cosine => COSINE_FUNCTION,
        Metric::Correlation => CORRELATION_FUNCTION,
    }
}

/// Register the scalar functions annex queries rely on.
pub fn register_functions(conn: &Connection) -> Result<()> {
    register_metric(conn, COSINE_FUNCTION, Metric::Cosine)?;
    register_metric(conn, CORRELATION_FUNCTION, Metric::Correlation)?;
    Ok(())
}

/// `name(a, b)` over two vector blobs, computed by `metric`.
fn register_metric(conn: &Connection, name: &str, metric: Metric) -> Result<()> {
    conn.create_scalar_function(
        name,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let a: Vec<u8> = ctx.get(0)?;
            let b: Vec<u8> = ctx.get(1)?;
            let (a, b) = (
                decode_vector(&a).map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?,
                decode_vector(&b).map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?,
            );
            if a.len() != b.len() {
                return Err(rusqlite::Error::UserFunctionError(
                    format!("vector lengths differ: {} vs {}", a.len(), b.len()).into(),
                ));
            }
            Ok(metric.distance(&a, &b) as f64)
        },
    )?;
    Ok(())
}

/// Little-endian f32 blob of `v`.
pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        v.as_bytes().to_vec()
    } else {
        v.iter().flat_map(|f| f.to_le_bytes()).collect()
    }
}

/// Inverse of [`encode_vector`].
pub fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(SqliteError::InvalidData(format!(
            "vector blob of {} bytes is not a whole number of f32s",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_extension_loads() -> std::result::Result<(), rusqlite::Error> {
        // Initialize the extension BEFORE creating any connections
        init_vec_extension();
        let conn = Connection::open_in_memory()?;

        let version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        assert!(!version.is_empty());
        Ok(())
    }

    #[test]
    fn test_vec_f32_accepts_embedding_text() -> std::result::Result<(), rusqlite::Error> {
        init_vec_extension();
        let conn = Connection::open_in_memory()?;

        let blob: Vec<u8> = conn.query_row(
            "SELECT vec_f32(?1)",
            ["[0.50000000,-1.25000000]"],
            |row| row.get(0),
        )?;
        assert_eq!(decode_vector(&blob).unwrap(), vec![0.5, -1.25]);
        Ok(())
    }

    #[test]
    fn test_distances_match_metric() -> Result<()> {
        init_vec_extension();
        let conn = Connection::open_in_memory()?;
        register_functions(&conn)?;

        let v1 = vec![1.0f32, 0.0, 2.0];
        let v2 = vec![0.0f32, 1.0, 0.5];
        for metric in Metric::ALL {
            let sql = format!("SELECT {}(?1, ?2)", distance_function(metric));
            let distance: f64 = conn.query_row(
                &sql,
                rusqlite::params![encode_vector(&v1), encode_vector(&v2)],
                |row| row.get(0),
            )?;
            let expected = metric.distance(&v1, &v2);
            assert!(
                (distance as f32 - expected).abs() < 1e-4,
                "{}: {} vs {}",
                metric,
                distance,
                expected
            );
        }
        Ok(())
    }

    #[test]
    fn test_correlation_function() -> Result<()> {
        init_vec_extension();
        let conn = Connection::open_in_memory()?;
        register_functions(&conn)?;

        let a = encode_vector(&[1.0, 2.0, 3.0]);
        let b = encode_vector(&[2.0, 4.0, 6.0]);
        let c = encode_vector(&[3.0, 2.0, 1.0]);
        let same: f64 = conn.query_row(
            "SELECT annex_distance_correlation(?1, ?2)",
            rusqlite::params![a, b],
            |row| row.get(0),
        )?;
        let opposite: f64 = conn.query_row(
            "SELECT annex_distance_correlation(?1, ?2)",
            rusqlite::params![a, c],
            |row| row.get(0),
        )?;
        assert!(same.abs() < 1e-6, "{}", same);
        assert!((opposite - 2.0).abs() < 1e-6, "{}", opposite);
        Ok(())
    }

    #[test]
    fn test_cosine_of_zero_vector_is_one() -> Result<()> {
        init_vec_extension();
        let conn = Connection::open_in_memory()?;
        register_functions(&conn)?;

        let distance: f64 = conn.query_row(
            "SELECT annex_distance_cosine(?1, ?2)",
            rusqlite::params![encode_vector(&[0.0, 0.0]), encode_vector(&[1.0, 2.0])],
            |row| row.get(0),
        )?;
        assert_eq!(distance, 1.0);
        Ok(())
    }

    #[test]
    fn test_decode_rejects_partial_floats() {
        assert!(matches!(
            decode_vector(&[0, 0, 128]),
            Err(SqliteError::InvalidData(_))
        ));
    }
}
