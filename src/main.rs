use std::path::PathBuf;
use std::time::Duration;

use animal_scrap::{config::Config, logging::init_tracing, process::process_site, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "animal-scrap")]
#[command(about = "Collateral adjectives from Wikipedia, with a picture of every animal")]
#[command(version)]
struct Cli {
    /// Article URL, or a path to a saved HTML copy of it
    #[arg(short, long, default_value = animal_scrap::WIKI_URL)]
    source: String,

    /// Directory the animal images are cached in
    #[arg(short, long, default_value = animal_scrap::IMAGE_DIR)]
    image_dir: PathBuf,

    /// Where to write the HTML report
    #[arg(short, long, default_value = animal_scrap::OUTPUT_PATH)]
    output: PathBuf,

    /// Maximum number of images downloaded at once
    #[arg(short = 'j', long, default_value_t = animal_scrap::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = animal_scrap::DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Directory for the per-run log file
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "info", value_enum)]
    log_level: LogLevel,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // HTML parsing crates are noisy at debug and trace.
    fn directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug,selectors=warn,html5ever=warn,hyper_util=info",
            LogLevel::Trace => "trace,selectors=warn,html5ever=warn",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (_guard, log_path) = init_tracing(cli.log_level.directive(), &cli.log_dir)?;
    tracing::info!(log = %log_path.display(), "Logging to file");

    let config = Config {
        source: cli.source,
        image_dir: cli.image_dir,
        output: cli.output,
        concurrency: cli.concurrency,
        request_timeout: Duration::from_secs(cli.timeout),
        ..Config::default()
    };

    if let Err(e) = process_site(&config).await {
        tracing::error!(error = %e, "Run aborted");
        return Err(e);
    }
    Ok(())
}
