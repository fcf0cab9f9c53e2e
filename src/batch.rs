use crate::error::{AlgtestError, Result};
use crate::keys::{reconstruct, KeyArithmetic, RowOutcome};
use crate::table::Table;
use glob::Pattern;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// File name pattern of the keygen suite's RSA results
pub const KEYGEN_RSA_PATTERN: &str = "Keygen_RSA_*_keys.csv";

/// Outcome of processing one keygen file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub path: PathBuf,
    pub reconstructed: usize,
    /// Ids of rows left without `q` and `d`
    pub skipped: Vec<String>,
}

/// Reconstruct every row of `table` in order.
///
/// Stops at the first self-check failure; rows processed before it keep their
/// new values in memory, but nothing is written by this function.
pub fn reconstruct_table<A: KeyArithmetic + ?Sized>(
    table: &mut Table,
    arith: &A,
) -> Result<(usize, Vec<String>)> {
    let mut reconstructed = 0;
    let mut skipped = Vec::new();

    for row in table.rows.iter_mut() {
        match reconstruct(row, arith) {
            RowOutcome::Reconstructed(key) => {
                key.apply(row);
                reconstructed += 1;
            }
            RowOutcome::Skipped(reason) => {
                warn!(row = %row.id(), %reason, "Cannot compute row {}", row.id());
                skipped.push(row.id().to_string());
            }
            RowOutcome::Fatal(failure) => {
                error!(row = %failure.row, "{}", failure);
                return Err(AlgtestError::InvariantViolation {
                    row: failure.row,
                    stage: "decrypt-after-encrypt self-check".into(),
                });
            }
        }
    }

    Ok((reconstructed, skipped))
}

/// Add `q` and `d` columns to a keygen RSA file in place
pub fn compute_rsa_privates<A: KeyArithmetic + ?Sized>(
    path: &Path,
    arith: &A,
) -> Result<BatchReport> {
    let mut table = Table::load(path)?;
    let (reconstructed, skipped) = reconstruct_table(&mut table, arith)?;
    table.save(path)?;

    info!(
        path = %path.display(),
        reconstructed,
        skipped = skipped.len(),
        "computed RSA private keys"
    );

    Ok(BatchReport {
        path: path.to_path_buf(),
        reconstructed,
        skipped,
    })
}

/// Keygen RSA result files directly inside `dir`, sorted by name
pub fn keygen_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = Pattern::new(KEYGEN_RSA_PATTERN)?;
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| pattern.matches(name));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Euclid;
    use tempfile::tempdir;

    #[test]
    fn test_compute_rewrites_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Keygen_RSA_1024_keys.csv");
        std::fs::write(&path, "id;n;e;p\n1;CA1;11;3D\n2;zz;11;3D\n").unwrap();

        let report = compute_rsa_privates(&path, &Euclid).unwrap();
        assert_eq!(report.reconstructed, 1);
        assert_eq!(report.skipped, ["2"]);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "id;n;e;p;q;d\n1;CA1;11;3D;35;AC1\n2;zz;11;3D;;\n"
        );
    }

    #[test]
    fn test_truncated_line_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Keygen_RSA_1024_keys.csv");
        std::fs::write(&path, "id;n;e;p\n1;CA1;11;3D\n2;CA1;11\n3;CA1;11;3D\n").unwrap();

        let report = compute_rsa_privates(&path, &Euclid).unwrap();
        assert_eq!(report.reconstructed, 2);
        assert_eq!(report.skipped, ["2"]);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "id;n;e;p;q;d\n1;CA1;11;3D;35;AC1\n2;CA1;11;;;\n3;CA1;11;3D;35;AC1\n"
        );
    }

    #[test]
    fn test_empty_table_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Keygen_RSA_2048_keys.csv");
        std::fs::write(&path, "id;n;e;p\n").unwrap();

        let report = compute_rsa_privates(&path, &Euclid).unwrap();
        assert_eq!(report.reconstructed, 0);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_keygen_csv_files_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in [
            "Keygen_RSA_2048_keys.csv",
            "Keygen_RSA_1024_keys.csv",
            "Keygen_ECC_0x0003_keys.csv",
            "keygen_log.txt",
        ] {
            std::fs::write(dir.path().join(name), "id\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("Keygen_RSA_dir_keys.csv")).unwrap();

        let files = keygen_csv_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["Keygen_RSA_1024_keys.csv", "Keygen_RSA_2048_keys.csv"]);
    }
}
