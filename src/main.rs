use algtest::archive::zip_dir;
use algtest::batch::BatchReport;
use algtest::cli::{
    compute_keys, render_reports, run_fulltest, run_keygen, run_perf, run_quicktest,
};
use algtest::runner::{RunnerConfig, TestParams};
use algtest::Result;
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Version info from build.rs
const VERSION: &str = env!("ALGTEST_VERSION");
const BUILD: &str = env!("ALGTEST_BUILD");
const PROFILE: &str = env!("ALGTEST_PROFILE");
const GIT_HASH: &str = env!("ALGTEST_GIT_HASH");

const SUBMIT_ADDRESS: &str = "xstruk@fi.muni.cz";

fn get_version() -> &'static str {
    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} {} build {} ({})", PROFILE, VERSION, BUILD, GIT_HASH))
}

#[derive(Parser)]
#[command(name = "algtest")]
#[command(author, about = "Run the tpm2-algtest suite and package its results", long_about = None)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    /// TPM device passed through to the container
    #[arg(long, global = true, default_value = "/dev/tpm0")]
    device: PathBuf,

    /// Test image repository
    #[arg(long, global = true, default_value = "simonstruk/tpm2-algtest")]
    image: String,

    /// Test image tag
    #[arg(long, global = true, default_value = "v0.5")]
    tag: String,

    /// Container engine executable
    #[arg(long, global = true, default_value = "docker")]
    engine: String,

    /// Output directory
    #[arg(long, global = true, default_value = "out")]
    out: PathBuf,

    /// Archive written after a test run
    #[arg(long = "archive", global = true, default_value = "out.zip")]
    archive_path: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Quicktest, keygen and perf in sequence
    Fulltest(TestArgs),

    /// Dump TPM capabilities with tpm2_getcap
    Quicktest,

    /// Key generation test, followed by RSA private key reconstruction
    Keygen(TestArgs),

    /// Performance test
    Perf(TestArgs),

    /// Reconstruct RSA private keys in existing keygen result files
    Compute {
        /// Keygen CSV files or directories containing them (default: output directory)
        paths: Vec<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Zip the output directory
    Archive,
}

#[derive(Args, Debug, Default)]
struct TestArgs {
    /// Number of repetitions
    #[arg(short = 'n', long)]
    num: Option<u32>,

    /// Duration in seconds
    #[arg(short = 'd', long)]
    duration: Option<u32>,

    /// Key type
    #[arg(short = 't', long)]
    keytype: Option<String>,

    /// Key length in bits
    #[arg(short = 'l', long)]
    keylen: Option<u32>,

    /// ECC curve id
    #[arg(short = 'C', long)]
    curveid: Option<u32>,

    /// TPM command to test
    #[arg(short = 'c', long)]
    command: Option<String>,
}

impl From<TestArgs> for TestParams {
    fn from(args: TestArgs) -> Self {
        Self {
            num: args.num,
            duration: args.duration,
            keytype: args.keytype,
            keylen: args.keylen,
            curveid: args.curveid,
            command: args.command,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn start_tests(config: &RunnerConfig) -> Result<()> {
    config.check_device()?;
    println!("IMPORTANT: Please do not suspend or hibernate the computer while testing the TPM!");
    std::fs::create_dir_all(&config.out_dir)?;
    Ok(())
}

fn package(config: &RunnerConfig, archive: &Path) -> Result<()> {
    let count = zip_dir(&config.out_dir, archive)?;
    println!("Archived {} files to {}", count, archive.display());
    Ok(())
}

fn print_reports(reports: &[BatchReport], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
    } else {
        print!("{}", render_reports(reports));
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("algtest {}", get_version());
        return ExitCode::SUCCESS;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            println!();
            return ExitCode::SUCCESS;
        }
    };

    init_logging();

    let config = RunnerConfig {
        engine: cli.engine,
        device: cli.device,
        image: cli.image,
        tag: cli.tag,
        out_dir: cli.out,
    };
    let archive = cli.archive_path;

    let result = match command {
        Commands::Fulltest(args) => start_tests(&config)
            .and_then(|_| run_fulltest(&config, &args.into()))
            .and_then(|reports| print_reports(&reports, false))
            .and_then(|_| package(&config, &archive))
            .map(|_| {
                println!(
                    "The tests are finished. Thank you! Please send the generated file ({}) to {}",
                    archive.display(),
                    SUBMIT_ADDRESS
                );
            }),

        Commands::Quicktest => start_tests(&config)
            .and_then(|_| run_quicktest(&config))
            .and_then(|_| package(&config, &archive)),

        Commands::Keygen(args) => start_tests(&config)
            .and_then(|_| run_keygen(&config, &args.into()))
            .and_then(|reports| print_reports(&reports, false))
            .and_then(|_| package(&config, &archive)),

        Commands::Perf(args) => start_tests(&config)
            .and_then(|_| run_perf(&config, &args.into()))
            .and_then(|_| package(&config, &archive)),

        Commands::Compute { paths, json } => {
            let paths = if paths.is_empty() {
                vec![config.out_dir.clone()]
            } else {
                paths
            };
            compute_keys(&paths).and_then(|reports| print_reports(&reports, json))
        }

        Commands::Archive => package(&config, &archive),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
