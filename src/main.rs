use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use dimse::DimseScu;
use tracing::warn;
use xfer::driver::{request_stop, StopRequest};
use xfer::{BatchRunner, Config, Mode};

/// Exit status for `--strict` runs where at least one unit failed
const EXIT_UNIT_FAILURES: i32 = 2;

/// Exit status after a second Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "dicom-xfer",
    about = "Send directories of DICOM studies to an imaging gateway",
    group(
        ArgGroup::new("mode")
            .required(true)
            .args(["directory", "tofile", "fromfile", "report"])
    )
)]
struct Cli {
    /// Parse a directory of exams, record the plan and send it
    directory: Option<PathBuf>,

    /// Parse a directory of exams and only record the plan
    #[arg(long, value_name = "DIRECTORY")]
    tofile: Option<PathBuf>,

    /// Send a recorded plan (defaults to the configured plan file)
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    fromfile: Option<Option<PathBuf>>,

    /// Print what the registries contain and exit
    #[arg(long)]
    report: bool,

    /// Configuration file
    #[arg(short, long, default_value = "xfer.toml")]
    config: PathBuf,

    /// Exit non-zero if any unit failed
    #[arg(long)]
    strict: bool,
}

impl Cli {
    fn mode(&self) -> Option<Mode> {
        if let Some(root) = &self.tofile {
            return Some(Mode::PlanOnly { root: root.clone() });
        }
        if let Some(plan_file) = &self.fromfile {
            return Some(Mode::SendFromPlan {
                plan_file: plan_file.clone(),
            });
        }
        self.directory
            .as_ref()
            .map(|root| Mode::PlanAndSend { root: root.clone() })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        Config::default()
    };
    xfer::logging::init(&config.logging)?;
    if !cli.config.exists() {
        warn!("{} not found, using defaults", cli.config.display());
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || match request_stop(&stop) {
            StopRequest::Graceful => {
                warn!("Stop requested, finishing the current file; press Ctrl-C again to exit now")
            }
            StopRequest::Forced => {
                warn!("Exiting without releasing the association");
                std::process::exit(EXIT_INTERRUPTED);
            }
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let scu = DimseScu::new(config.dimse_config());
    let runner = BatchRunner::new(&config, &scu).with_stop_flag(stop);

    if cli.report {
        let report = runner.report()?;
        println!("planned:   {}", report.planned);
        println!("succeeded: {}", report.succeeded);
        println!("failed:    {}", report.failures.len());
        for failure in &report.failures {
            println!("  {}\t{}", failure.unit, failure.reason);
        }
        return Ok(());
    }

    let Some(mode) = cli.mode() else {
        // the required arg group makes this unreachable from the command line
        anyhow::bail!("no mode given");
    };
    let summary = runner.run(mode)?;

    if cli.strict && summary.has_failures() {
        std::process::exit(EXIT_UNIT_FAILURES);
    }
    Ok(())
}
