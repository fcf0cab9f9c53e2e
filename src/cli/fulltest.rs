use crate::batch::BatchReport;
use crate::cli::quicktest::run_quicktest;
use crate::cli::suite::{run_keygen, run_perf};
use crate::error::Result;
use crate::runner::{RunnerConfig, TestParams};
use std::path::PathBuf;

/// Name of the file recording which image produced the results
pub const IMAGE_INFO_FILE: &str = "docker_info.txt";

/// Record the image tag in the output directory
pub fn write_image_info(config: &RunnerConfig) -> Result<PathBuf> {
    std::fs::create_dir_all(&config.out_dir)?;
    let path = config.out_dir.join(IMAGE_INFO_FILE);
    std::fs::write(&path, format!("image {}", config.tag))?;
    Ok(path)
}

/// Quicktest, keygen and perf in sequence
pub fn run_fulltest(config: &RunnerConfig, params: &TestParams) -> Result<Vec<BatchReport>> {
    write_image_info(config)?;
    run_quicktest(config)?;
    let reports = run_keygen(config, params)?;
    run_perf(config, params)?;
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_image_info() {
        let dir = tempdir().unwrap();
        let config = RunnerConfig {
            out_dir: dir.path().join("out"),
            tag: "v0.5".into(),
            ..Default::default()
        };
        let path = write_image_info(&config).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "image v0.5");
    }
}
