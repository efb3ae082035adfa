//! `snapmark` command line tool.
//!
//! ```text
//! snapmark init-config --out snapmark.json
//! snapmark simulate --config snapmark.json --report report.json
//! snapmark simulate --image photo.png --scenario scenario.json
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use snapmark::simulate::{run_scenario, Scenario};
use snapmark::{SnapmarkConfig, StillFrameSurface};

#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

#[derive(Parser, Debug)]
#[command(name = "snapmark")]
#[command(version, about = "Register photos as live markers and track objects on them")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default configuration as JSON.
    InitConfig {
        #[arg(long)]
        out: PathBuf,
    },
    /// Run a scripted session headless and report the outcome.
    Simulate {
        /// Configuration file; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Scenario file; the built-in scenario runs when omitted.
        #[arg(long)]
        scenario: Option<PathBuf>,
        /// Image used as the captured frame instead of a synthetic one.
        #[arg(long)]
        image: Option<PathBuf>,
        /// Where to write the JSON report; printed to stdout when omitted.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Emit JSON log lines.
        #[cfg(feature = "tracing")]
        #[arg(long)]
        json_logs: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig { out } => {
            SnapmarkConfig::default().write_json(&out)?;
            println!("wrote default config to {}", out.display());
        }
        Commands::Simulate {
            config,
            scenario,
            image,
            report,
            #[cfg(feature = "tracing")]
            json_logs,
        } => {
            let config = match config {
                Some(path) => SnapmarkConfig::load_json(path)?,
                None => SnapmarkConfig::default(),
            };

            #[cfg(feature = "tracing")]
            {
                let _ = LogTracer::init();
                snapmark::core::init_tracing(json_logs);
            }
            #[cfg(not(feature = "tracing"))]
            snapmark::core::init_with_level(config.level_filter()?)?;

            let scenario = match scenario {
                Some(path) => Scenario::load_json(path)?,
                None => Scenario::default(),
            };
            let surface = match image {
                Some(path) => StillFrameSurface::from_image(&image::open(path)?),
                None => scenario.frame.surface(),
            };

            let result = run_scenario(&config, &scenario, &surface).await?;
            match report {
                Some(path) => {
                    result.write_json(&path)?;
                    println!("wrote simulation report to {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&result)?),
            }
        }
    }

    Ok(())
}
