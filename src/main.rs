use clap::Parser;
use env_logger::Env;
use log::error;
use std::path::PathBuf;
use std::process;
use visreg::cdp::CdpSession;
use visreg::{runner, Result, RunConfig, SessionConfig, Viewport};

/// Visual regression runner: renders UI examples in a headless browser and
/// compares screenshots against stored baselines.
#[derive(Parser, Debug)]
#[command(name = "visreg", version)]
struct Cli {
    /// URL of the test harness page exposing `window.visreg`
    #[arg(long)]
    url: String,

    /// Directory holding snapshot baselines and the run summary
    #[arg(long, default_value = ".visreg")]
    snapshot_dir: PathBuf,

    /// Viewport spec as `name:WIDTHxHEIGHT`; repeat for multiple viewports
    #[arg(long = "viewport", value_name = "SPEC", required = true)]
    viewports: Vec<String>,

    /// Hard ceiling for any single in-page script execution, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    script_timeout_ms: u64,
}

fn parse_viewport(spec: &str) -> Result<Viewport> {
    let invalid = || {
        visreg::Error::Config(format!(
            "viewport spec \"{}\" must look like name:WIDTHxHEIGHT",
            spec
        ))
    };
    let (name, size) = spec.split_once(':').ok_or_else(invalid)?;
    let (width, height) = size.split_once('x').ok_or_else(invalid)?;
    Viewport::new(
        name,
        width.parse().map_err(|_| invalid())?,
        height.parse().map_err(|_| invalid())?,
    )
}

async fn run(cli: Cli) -> Result<runner::RunSummary> {
    let viewports = cli
        .viewports
        .iter()
        .map(|spec| parse_viewport(spec))
        .collect::<Result<Vec<_>>>()?;

    let config = RunConfig {
        snapshot_dir: cli.snapshot_dir,
        viewports,
        script_timeout_ms: cli.script_timeout_ms,
    };
    let session = SessionConfig {
        harness_url: cli.url,
        script_timeout_ms: cli.script_timeout_ms,
        ..Default::default()
    };

    runner::run(&config, move || CdpSession::new(session)).await
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(summary) => {
            if !summary.diff_images.is_empty() {
                process::exit(1);
            }
        }
        Err(err) => {
            error!("{}", err);
            process::exit(2);
        }
    }
}
