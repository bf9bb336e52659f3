use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use postcheck::{Postcheck, Scenario};
use postcheck_common::{ConfigError, internal, logging};

/// Run the mail conformance scenarios
#[derive(Parser)]
#[command(name = "postcheck", version, about, long_about = None)]
struct Cli {
    /// Configuration file, instead of searching the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info,postcheck::incoming=debug`. Overrides LOG_LEVEL
    #[arg(long, global = true, value_name = "DIRECTIVES")]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios
    Run {
        /// Scenario to run; may be repeated. Runs every scenario when omitted
        #[arg(short, long = "scenario", value_name = "NAME")]
        scenarios: Vec<String>,

        /// Maximum time to wait for each message, in seconds
        #[arg(short, long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// List available scenarios
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            for scenario in Scenario::ALL {
                println!("{scenario}");
            }
            Ok(())
        }
        Commands::Run { scenarios, timeout } => {
            logging::init(cli.log.as_deref());

            let mut config = load_config(cli.config.as_deref())?;
            if let Some(timeout) = timeout {
                config.timeouts.max_wait_secs = timeout;
            }

            let scenarios = if scenarios.is_empty() {
                Scenario::ALL.to_vec()
            } else {
                scenarios
                    .iter()
                    .map(|name| name.parse())
                    .collect::<Result<Vec<Scenario>, _>>()?
            };

            let report = config.run(&scenarios).await?;
            println!("{report}");

            if report.is_success() {
                Ok(())
            } else {
                anyhow::bail!("{} scenario(s) failed", report.failed())
            }
        }
    }
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<Postcheck> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match Postcheck::find_config_file() {
            Ok(path) => path,
            Err(ConfigError::NotFound { .. }) => {
                internal!(level = WARN, "No configuration file found, using defaults");
                return Ok(Postcheck::default());
            }
            Err(err) => return Err(err.into()),
        },
    };

    internal!(level = INFO, "Loading configuration from {}", path.display());
    Ok(Postcheck::load(&path)?)
}
