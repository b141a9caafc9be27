//! Readers for the learned-parameter files.
//!
//! All files are whitespace-separated ASCII. Three shapes exist: plain weight
//! lists (one value per line), sparse `index weight` pairs for the huge MD2
//! table, and factorization-machines rows (a scalar weight followed by a
//! five-dimensional latent vector), optionally prefixed by the pattern key
//! they belong to. An unreadable file that was explicitly configured is a
//! fatal startup error; callers fall back to neutral weights only when no
//! parameter directory was given at all.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::constants::LFR_DIMENSION;

/// One factorization-machines entry.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatentFactor {
    pub w: f64,
    pub v: [f64; LFR_DIMENSION],
}

fn tokens(path: &Path) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot open parameter file {}", path.display()))?;
    text.split_whitespace()
        .map(|t| {
            t.parse::<f64>()
                .with_context(|| format!("bad number {t:?} in {}", path.display()))
        })
        .collect()
}

/// Read exactly `expected` weights.
pub fn read_floats(path: &Path, expected: usize) -> Result<Vec<f64>> {
    let values = tokens(path)?;
    if values.len() != expected {
        bail!(
            "{}: expected {expected} weights, found {}",
            path.display(),
            values.len()
        );
    }
    Ok(values)
}

/// Read sparse `index weight` pairs.
pub fn read_indexed_floats(path: &Path) -> Result<Vec<(usize, f64)>> {
    let values = tokens(path)?;
    if values.len() % 2 != 0 {
        bail!("{}: odd token count in index/weight file", path.display());
    }
    Ok(values
        .chunks_exact(2)
        .map(|pair| (pair[0] as usize, pair[1]))
        .collect())
}

/// Read exactly `expected` factorization-machines rows (6 numbers each).
pub fn read_latent_factors(path: &Path, expected: usize) -> Result<Vec<LatentFactor>> {
    let values = tokens(path)?;
    if values.len() != expected * (1 + LFR_DIMENSION) {
        bail!(
            "{}: expected {expected} latent-factor rows, found {} numbers",
            path.display(),
            values.len()
        );
    }
    Ok(values
        .chunks_exact(1 + LFR_DIMENSION)
        .map(row_to_factor)
        .collect())
}

/// Read `key w v0..v4` rows, keys as unsigned 64-bit decimals.
pub fn read_keyed_latent_factors(path: &Path) -> Result<Vec<(u64, LatentFactor)>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot open parameter file {}", path.display()))?;
    let mut out = Vec::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != 2 + LFR_DIMENSION {
            bail!("{}: malformed row {line:?}", path.display());
        }
        let key = fields[0]
            .parse::<u64>()
            .with_context(|| format!("bad pattern key {:?} in {}", fields[0], path.display()))?;
        let numbers: Vec<f64> = fields[1..]
            .iter()
            .map(|t| t.parse::<f64>())
            .collect::<Result<_, _>>()
            .with_context(|| format!("bad number in {}", path.display()))?;
        out.push((key, row_to_factor(&numbers)));
    }
    Ok(out)
}

fn row_to_factor(row: &[f64]) -> LatentFactor {
    let mut v = [0.0; LFR_DIMENSION];
    v.copy_from_slice(&row[1..]);
    LatentFactor { w: row[0], v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(content: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("tengen-params-{}-{:x}", std::process::id(), fastrand::u64(..)));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_plain_weights() {
        let path = temp_file("1.0 2.5\n0.25\n");
        assert_eq!(read_floats(&path, 3).unwrap(), vec![1.0, 2.5, 0.25]);
        assert!(read_floats(&path, 4).is_err());
        fs::remove_file(path).ok();
    }

    #[test]
    fn reads_sparse_pairs() {
        let path = temp_file("10 1.5\n200 0.75\n");
        assert_eq!(read_indexed_floats(&path).unwrap(), vec![(10, 1.5), (200, 0.75)]);
        fs::remove_file(path).ok();
    }

    #[test]
    fn reads_latent_rows() {
        let path = temp_file("0.5 1 2 3 4 5\n-0.5 0 0 0 0 1\n");
        let rows = read_latent_factors(&path, 2).unwrap();
        assert_eq!(rows[0].w, 0.5);
        assert_eq!(rows[0].v, [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(rows[1].w, -0.5);
        fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_floats(Path::new("/nonexistent/weights.txt"), 1).is_err());
    }
}
