//! reservation-e2e - run the reservation flow against a live application
//!
//! Exit codes: 0 all scenarios passed, 1 a scenario failed, 2 runner error.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reservation_e2e::playwright::Browser;
use reservation_e2e::runner::SuiteReport;
use reservation_e2e::{scenario, SuiteConfig, TestRunner, TestSpec};

#[derive(Parser, Debug)]
#[command(name = "reservation-e2e")]
#[command(about = "Browser E2E checker for the table reservation flow")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "reservation-e2e.toml")]
    config: PathBuf,

    /// Base URL of the application under test
    #[arg(long, env = "RESERVATION_E2E_BASE_URL")]
    base_url: Option<String>,

    /// Directory of YAML scenarios (default: the built-in reservation flow)
    #[arg(short, long)]
    specs: Option<PathBuf>,

    /// Run only scenarios with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the scenario with this name
    #[arg(short, long)]
    name: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Output directory for screenshots and results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the generated Playwright program and exit
    #[arg(long)]
    print_script: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let code = match run(args).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!("{:#}", e);
            2
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = SuiteConfig::load(&args.config)?;
    if let Some(base_url) = args.base_url {
        config.target.base_url = base_url;
    }
    if let Some(browser) = args.browser {
        config.browser.browser = browser;
    }
    if args.headed {
        config.browser.headless = false;
    }
    if let Some(output) = args.output {
        config.artifacts.output_dir = output;
    }

    let mut specs = match &args.specs {
        Some(dir) => TestSpec::load_all(dir)?,
        None => vec![scenario::reservation_flow()],
    };
    if let Some(tag) = &args.tag {
        specs = TestSpec::filter_by_tag(&specs, tag).into_iter().cloned().collect();
    }
    if let Some(name) = &args.name {
        specs.retain(|s| &s.name == name);
    }
    if specs.is_empty() {
        anyhow::bail!("no scenario matched the given filters");
    }

    let mut runner = TestRunner::with_config(config);

    if args.print_script {
        for spec in &specs {
            println!("// {}\n{}", spec.name, runner.script_for(spec)?);
        }
        return Ok(true);
    }

    info!("reservation-e2e v{}", env!("CARGO_PKG_VERSION"));
    info!("Target: {}", runner.config().target.base_url);

    let results: SuiteReport = runner.run_specs(&specs).await?;
    runner.write_results(&results)?;

    Ok(results.failed == 0)
}
