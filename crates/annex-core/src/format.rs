//! Fixed-precision text form of embeddings.
//!
//! Stores that take embeddings as text (SQL parameters, JSON columns) go
//! through [`format_embedding`] so every write uses the same precision.

use crate::storage::{StoreError, StoreResult};

/// Decimal places written per component.
pub const EMBEDDING_PRECISION: usize = 8;

/// Render an embedding as `[c0,c1,...]` with [`EMBEDDING_PRECISION`] decimals.
///
/// ```
/// use annex_core::format::format_embedding;
///
/// assert_eq!(format_embedding(&[0.5, -1.25]).unwrap(), "[0.50000000,-1.25000000]");
/// ```
pub fn format_embedding(embedding: &[f32]) -> StoreResult<String> {
    let mut out = String::with_capacity(2 + embedding.len() * (EMBEDDING_PRECISION + 4));
    out.push('[');
    for (i, x) in embedding.iter().enumerate() {
        if !x.is_finite() {
            return Err(StoreError::InvalidData(format!(
                "embedding component {} is not finite",
                i
            )));
        }
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{:.*}", EMBEDDING_PRECISION, x));
    }
    out.push(']');
    Ok(out)
}

/// Parse the output of [`format_embedding`]. Also accepts `(...)` delimiters.
pub fn parse_embedding(text: &str) -> StoreResult<Vec<f32>> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .or_else(|| trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')))
        .ok_or_else(|| StoreError::Serialization(format!("not a bracketed vector: {}", text)))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| StoreError::Serialization(format!("bad component '{}': {}", part, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_precision_output() {
        let text = format_embedding(&[1.0, 0.123456789, -3.5]).unwrap();
        assert_eq!(text, "[1.00000000,0.12345679,-3.50000000]");
    }

    #[test]
    fn round_trip_within_precision() {
        let v: Vec<f32> = (0..50).map(|i| (i as f32 - 25.0) * 0.3712345).collect();
        let parsed = parse_embedding(&format_embedding(&v).unwrap()).unwrap();
        assert_eq!(parsed.len(), v.len());
        for (a, b) in v.iter().zip(&parsed) {
            let tol = 5e-9 + a.abs() * f32::EPSILON;
            assert!((a - b).abs() <= tol, "{} vs {}", a, b);
        }
    }

    #[test]
    fn small_components_survive() {
        let v = [1.5e-6f32, -2.25e-7];
        let parsed = parse_embedding(&format_embedding(&v).unwrap()).unwrap();
        assert!((parsed[0] - 1.5e-6).abs() < 1e-8);
        assert!((parsed[1] + 2.25e-7).abs() < 1e-8);
    }

    #[test]
    fn rejects_non_finite() {
        assert!(format_embedding(&[1.0, f32::NAN]).is_err());
        assert!(format_embedding(&[f32::INFINITY]).is_err());
    }

    #[test]
    fn parses_cube_style() {
        assert_eq!(parse_embedding("(1.5, -2)").unwrap(), vec![1.5, -2.0]);
        assert_eq!(parse_embedding("[]").unwrap(), Vec::<f32>::new());
        assert!(parse_embedding("1,2").is_err());
        assert!(parse_embedding("[1,x]").is_err());
    }
}
