use crate::batch::{compute_rsa_privates, keygen_csv_files, BatchReport};
use crate::error::Result;
use crate::keys::Euclid;
use std::path::PathBuf;

/// Expand directories into their keygen RSA files; plain files pass through
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            inputs.extend(keygen_csv_files(path)?);
        } else {
            inputs.push(path.clone());
        }
    }
    Ok(inputs)
}

/// Reconstruct RSA private keys in already collected keygen files
pub fn compute_keys(paths: &[PathBuf]) -> Result<Vec<BatchReport>> {
    collect_inputs(paths)?
        .iter()
        .map(|path| compute_rsa_privates(path, &Euclid))
        .collect()
}

/// Human readable summary of processed files
pub fn render_reports(reports: &[BatchReport]) -> String {
    let mut output = String::new();
    for report in reports {
        output.push_str(&format!(
            "{}: {} reconstructed, {} skipped\n",
            report.path.display(),
            report.reconstructed,
            report.skipped.len()
        ));
        if !report.skipped.is_empty() {
            output.push_str(&format!("  skipped rows: {}\n", report.skipped.join(", ")));
        }
    }
    if reports.is_empty() {
        output.push_str("No keygen RSA files found\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_compute_keys_over_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("Keygen_RSA_1024_keys.csv"),
            "id;n;e;p\n1;CA1;11;3D\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("perf_log.txt"), "not a table").unwrap();

        let reports = compute_keys(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].reconstructed, 1);
        assert!(render_reports(&reports).contains("1 reconstructed, 0 skipped"));
    }

    #[test]
    fn test_render_lists_skipped_rows() {
        let report = BatchReport {
            path: PathBuf::from("out/Keygen_RSA_2048_keys.csv"),
            reconstructed: 3,
            skipped: vec!["4".into(), "9".into()],
        };
        let text = render_reports(&[report]);
        assert!(text.contains("3 reconstructed, 2 skipped"));
        assert!(text.contains("skipped rows: 4, 9"));
        assert_eq!(render_reports(&[]), "No keygen RSA files found\n");
    }
}
