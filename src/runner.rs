use crate::error::{AlgtestError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{info, warn};

/// Mount point of the output directory inside the image
pub const CONTAINER_OUT_DIR: &str = "/tpm2-algtest/build/out";

/// Capabilities queried by the quicktest, in order
pub const QUICKTEST_CAPABILITIES: [&str; 6] = [
    "algorithms",
    "commands",
    "properties-fixed",
    "properties-variable",
    "ecc-curves",
    "handles-persistent",
];

/// Container and output settings shared by all tests
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub engine: String,
    pub device: PathBuf,
    pub image: String,
    pub tag: String,
    pub out_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            engine: "docker".into(),
            device: PathBuf::from("/dev/tpm0"),
            image: "simonstruk/tpm2-algtest".into(),
            tag: "v0.5".into(),
            out_dir: PathBuf::from("out"),
        }
    }
}

/// Test suites run through the image's default entrypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    Keygen,
    Perf,
}

impl Suite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Suite::Keygen => "keygen",
            Suite::Perf => "perf",
        }
    }

    pub fn log_file(&self) -> String {
        format!("{}_log.txt", self.as_str())
    }
}

/// Optional parameters forwarded to the test binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestParams {
    pub num: Option<u32>,
    pub duration: Option<u32>,
    pub keytype: Option<String>,
    pub keylen: Option<u32>,
    pub curveid: Option<u32>,
    pub command: Option<String>,
}

impl TestParams {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let mut push = |flag: &str, value: Option<String>| {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value);
            }
        };
        push("-n", self.num.map(|v| v.to_string()));
        push("-d", self.duration.map(|v| v.to_string()));
        push("-t", self.keytype.clone());
        push("-l", self.keylen.map(|v| v.to_string()));
        push("-C", self.curveid.map(|v| v.to_string()));
        push("-c", self.command.clone());
        args
    }
}

impl RunnerConfig {
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "run".into(),
            "-it".into(),
            "--init".into(),
            format!("--device={}", self.device.display()),
        ]
    }

    /// `tpm2_getcap -c <capability>` inside the image
    pub fn quicktest_args(&self, capability: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.push("--entrypoint=tpm2_getcap".into());
        args.push(self.image_ref());
        args.push("-c".into());
        args.push(capability.into());
        args
    }

    /// Run `suite` against the device with the output directory mounted.
    /// `host_out` must be absolute.
    pub fn suite_args(&self, suite: Suite, params: &TestParams, host_out: &Path) -> Vec<String> {
        let mut args = self.base_args();
        args.push(format!(
            "--volume={}:{}:z",
            host_out.display(),
            CONTAINER_OUT_DIR
        ));
        args.push(self.image_ref());
        args.extend(["-T", "device", "-s", suite.as_str()].map(String::from));
        args.extend(params.to_args());
        args
    }

    pub fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.engine);
        cmd.args(args);
        cmd
    }

    pub fn check_device(&self) -> Result<()> {
        if self.device.exists() {
            Ok(())
        } else {
            Err(AlgtestError::DeviceNotFound(self.device.clone()))
        }
    }
}

fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Run `cmd` with stdout redirected to `out_path`; a nonzero exit is an error
pub fn run_captured(cmd: &mut Command, out_path: &Path) -> Result<()> {
    let out = File::create(out_path)?;
    info!(command = %describe(cmd), out = %out_path.display(), "running");
    let status = cmd.stdout(Stdio::from(out)).status()?;
    if !status.success() {
        return Err(AlgtestError::CommandFailed {
            command: describe(cmd),
            status,
        });
    }
    Ok(())
}

/// Run `cmd`, echoing each stdout line to the console and appending it to
/// `log_path`. The exit status is returned, not checked.
pub fn run_streamed(cmd: &mut Command, log_path: &Path) -> Result<ExitStatus> {
    let mut log = File::create(log_path)?;
    info!(command = %describe(cmd), log = %log_path.display(), "running");

    let mut child = cmd.stdout(Stdio::piped()).spawn()?;
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            println!("{}", line);
            writeln!(log, "{}", line)?;
        }
    }

    let status = child.wait()?;
    if !status.success() {
        warn!(command = %describe(cmd), %status, "test run exited unsuccessfully");
    }
    Ok(status)
}
