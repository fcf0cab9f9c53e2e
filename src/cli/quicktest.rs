use crate::error::Result;
use crate::runner::{run_captured, RunnerConfig, QUICKTEST_CAPABILITIES};
use std::path::PathBuf;

/// Output file for one `tpm2_getcap` capability
pub fn quicktest_file_name(capability: &str) -> String {
    format!("Quicktest_{}.txt", capability)
}

/// Query every quicktest capability, one output file each.
/// Returns the files written.
pub fn run_quicktest(config: &RunnerConfig) -> Result<Vec<PathBuf>> {
    println!("Running quicktest...");
    std::fs::create_dir_all(&config.out_dir)?;

    let mut written = Vec::with_capacity(QUICKTEST_CAPABILITIES.len());
    for capability in QUICKTEST_CAPABILITIES {
        let path = config.out_dir.join(quicktest_file_name(capability));
        let mut cmd = config.command(&config.quicktest_args(capability));
        run_captured(&mut cmd, &path)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quicktest_file_name() {
        assert_eq!(
            quicktest_file_name("properties-fixed"),
            "Quicktest_properties-fixed.txt"
        );
    }
}
