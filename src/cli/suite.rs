use crate::batch::{compute_rsa_privates, keygen_csv_files, BatchReport};
use crate::error::Result;
use crate::keys::Euclid;
use crate::runner::{run_streamed, RunnerConfig, Suite, TestParams};
use std::path::PathBuf;
use std::process::ExitStatus;

/// Create the output directory and return its absolute path for mounting
pub fn prepare_out_dir(config: &RunnerConfig) -> Result<PathBuf> {
    std::fs::create_dir_all(&config.out_dir)?;
    Ok(std::fs::canonicalize(&config.out_dir)?)
}

/// Run one suite, streaming its output into `<suite>_log.txt`
pub fn run_suite(config: &RunnerConfig, suite: Suite, params: &TestParams) -> Result<ExitStatus> {
    let host_out = prepare_out_dir(config)?;
    let mut cmd = config.command(&config.suite_args(suite, params, &host_out));

    println!("Running {} test...", suite.as_str());
    run_streamed(&mut cmd, &host_out.join(suite.log_file()))
}

/// Run the keygen suite, then fill in RSA private keys for every result file
pub fn run_keygen(config: &RunnerConfig, params: &TestParams) -> Result<Vec<BatchReport>> {
    run_suite(config, Suite::Keygen, params)?;

    println!("Computing RSA private keys...");
    let mut reports = Vec::new();
    for path in keygen_csv_files(&config.out_dir)? {
        println!("{}", path.display());
        reports.push(compute_rsa_privates(&path, &Euclid)?);
    }
    Ok(reports)
}

pub fn run_perf(config: &RunnerConfig, params: &TestParams) -> Result<ExitStatus> {
    run_suite(config, Suite::Perf, params)
}
