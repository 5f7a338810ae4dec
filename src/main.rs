use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use report_e2e::config::{self, Config};
use report_e2e::driver::{ChromeLauncher, ChromeOptions};
use report_e2e::harness::{SuiteConfig, run_suite};
use report_e2e::probe::{ProbeConfig, probe_server};
use report_e2e::runner::{EXIT_PASSED, EXIT_SETUP};
use report_e2e::scenario::{dashboard_scenarios, select_scenarios};
use report_e2e::session::{Session, cleanup_old_sessions, list_sessions};
use report_e2e::wait::SystemClock;

/// Report E2E - Headless browser checks for the report dashboard
#[derive(Parser, Debug)]
#[command(
    name = "report-e2e",
    about = "End-to-end checks for the report dashboard: availability probe, filters, rendering, PDF download",
    after_help = "ENVIRONMENT VARIABLES:\n\
        REPORT_E2E_BASE_URL          Dashboard URL under test\n\
        REPORT_E2E_PROBE_ATTEMPTS    Availability probe attempt cap\n\
        REPORT_E2E_PROBE_DELAY_MS    Delay between probe attempts (ms)\n\
        REPORT_E2E_SETUP_TIMEOUT_MS  Budget for the probe phase (ms)\n\
        REPORT_E2E_TEST_TIMEOUT_MS   Budget for each scenario (ms)\n\
        REPORT_E2E_HEADLESS          Run Chrome headless (true/false)\n\
        REPORT_E2E_ARTIFACT_DIR      Base directory for run sessions\n\
        REPORT_E2E_CHROME            Chrome/Chromium executable\n\
        RUST_LOG                     Log filter (default: info)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe the dashboard, then run the scenarios concurrently
    Run {
        /// Run only this scenario (repeatable)
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Dashboard URL (overrides REPORT_E2E_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,

        /// Session directory (default: auto-generated under the artifact dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the debug screenshot and markup dump
        #[arg(long)]
        no_captures: bool,
    },

    /// Only check that the dashboard answers
    Probe {
        /// Dashboard URL (overrides REPORT_E2E_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,

        /// Attempt cap (overrides REPORT_E2E_PROBE_ATTEMPTS)
        #[arg(long)]
        attempts: Option<u32>,
    },

    /// List the available scenarios
    List,

    /// List previous run sessions
    Sessions,

    /// Remove run sessions older than the given age
    Clean {
        /// Age threshold in hours
        #[arg(long, default_value = "24")]
        older_than_hours: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = match args.command {
        Some(Commands::Run {
            only,
            json,
            headed,
            base_url,
            output,
            no_captures,
        }) => {
            let mut config = config::get().clone();
            if let Some(url) = base_url {
                config.target.base_url = url;
            }
            if headed {
                config.browser.headless = false;
            }
            run(&config, &only, json, output, !no_captures).await?
        }

        Some(Commands::Probe { base_url, attempts }) => {
            let mut config = config::get().clone();
            if let Some(url) = base_url {
                config.target.base_url = url;
            }
            if let Some(attempts) = attempts {
                config.probe.max_attempts = attempts;
            }
            probe(&config).await?
        }

        Some(Commands::List) => {
            for scenario in dashboard_scenarios() {
                println!("{:<14} {}", scenario.name, scenario.title);
            }
            EXIT_PASSED
        }

        Some(Commands::Sessions) => {
            let base = config::artifact_dir();
            let sessions = list_sessions(&base)
                .with_context(|| format!("Failed to list sessions in {}", base.display()))?;
            if sessions.is_empty() {
                println!("No sessions in {}", base.display());
            }
            for session in sessions {
                println!("{}", session.display());
            }
            EXIT_PASSED
        }

        Some(Commands::Clean { older_than_hours }) => {
            let base = config::artifact_dir();
            let removed = cleanup_old_sessions(&base, Duration::from_secs(older_than_hours * 3600))
                .with_context(|| format!("Failed to clean sessions in {}", base.display()))?;
            println!("Removed {} session(s) from {}", removed, base.display());
            EXIT_PASSED
        }

        None => {
            println!("Report E2E - Headless browser checks for the report dashboard");
            println!();
            println!("Usage: report-e2e <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run       Probe the dashboard, then run the scenarios");
            println!("  probe     Only check that the dashboard answers");
            println!("  list      List the available scenarios");
            println!("  sessions  List previous run sessions");
            println!("  clean     Remove old run sessions");
            println!();
            println!("Run with --help for more information.");
            EXIT_PASSED
        }
    };

    if code != EXIT_PASSED {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(
    config: &Config,
    only: &[String],
    json: bool,
    output: Option<PathBuf>,
    captures: bool,
) -> anyhow::Result<i32> {
    let scenarios = match select_scenarios(dashboard_scenarios(), only) {
        Ok(scenarios) => scenarios,
        Err(unknown) => bail!(
            "Unknown scenario(s): {}. Run `report-e2e list` to see them.",
            unknown.join(", ")
        ),
    };

    let session = match output {
        Some(dir) => Session::in_dir(dir),
        None => Session::with_name(&config.artifacts.base_dir, "run"),
    }
    .with_base_url(&config.target.base_url);
    session
        .init()
        .with_context(|| format!("Failed to create session in {}", session.dir.display()))?;

    let launcher = ChromeLauncher::new(ChromeOptions::from_config(config, session.downloads_dir()));
    let mut suite = SuiteConfig::from_config(config);
    if captures {
        suite = suite.artifacts_in(&session.dir);
    }

    let report = match run_suite(&launcher, &SystemClock, &suite, &scenarios).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("\nSession: {}", session.dir.display());
            return Ok(e.exit_code());
        }
    };

    std::fs::write(session.report_path(), serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {}", session.report_path().display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
        println!("\nSession: {}", session.dir.display());
    }

    Ok(report.exit_code())
}

async fn probe(config: &Config) -> anyhow::Result<i32> {
    let session = Session::with_name(&config.artifacts.base_dir, "probe").keep(false);
    let launcher = ChromeLauncher::new(ChromeOptions::from_config(config, session.downloads_dir()));

    match probe_server(&launcher, &SystemClock, &ProbeConfig::from_config(config)).await {
        Ok(history) => {
            println!(
                "{} is accessible (attempt {}/{})",
                config.target.base_url,
                history.len(),
                config.probe.max_attempts
            );
            Ok(EXIT_PASSED)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(EXIT_SETUP)
        }
    }
}
