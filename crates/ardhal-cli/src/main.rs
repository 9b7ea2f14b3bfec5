//! `ardhal` – run the hardware worker and stream sensor snapshots.
//!
//! ```text
//! ardhal              load ~/.ardhal/config.toml (or defaults) and run
//! ardhal <PATH>       load the given config file and run
//! ardhal init [PATH]  write a default config file
//! ```
//!
//! The worker is started over the simulated bus.  Each input step is
//! printed to stdout as one JSON line.  Ctrl-C stops sampling and shuts the
//! worker down, which zeroes every motor before the bus is released.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use ardhal_hal::SimBus;
use ardhal_runtime::InputStage;
use ardhal_runtime::telemetry::init_tracing;
use ardhal_types::HalError;
use ardhal_worker::{InputClient, create_worker};
use colored::Colorize;
use tracing::{info, warn};

fn main() -> ExitCode {
    let _telemetry = init_tracing("ardhal");
    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = match args.first().map(String::as_str) {
        Some("init") => init_config(args.get(1).map(PathBuf::from)),
        Some(path) => config::load_from(Path::new(path)).and_then(run),
        None => config::load().and_then(run),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn init_config(path: Option<PathBuf>) -> Result<(), HalError> {
    let path = path.unwrap_or_else(config::config_path);
    if path.exists() {
        return Err(HalError::Config(format!("{} already exists", path.display())));
    }
    config::save_to(&config::Config::default(), &path)?;
    eprintln!("{} wrote {}", "✓".green().bold(), path.display());
    Ok(())
}

fn run(cfg: config::Config) -> Result<(), HalError> {
    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "Ctrl-C received, stopping the worker".yellow().bold());
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let (bus, _sim) = SimBus::new();
    let (control, input, _output) = create_worker(Box::new(bus), &cfg.wiring, &cfg.worker)?;
    info!(
        motors = cfg.wiring.motor_count(),
        ir_sensors = cfg.wiring.ir_pins.len(),
        bump_sensors = cfg.wiring.bump_pins.len(),
        "worker ready"
    );

    let client = InputClient::new(input, cfg.worker.reply_timeout());
    let mut stage = InputStage::with_layout(client, cfg.input.layout.clone());
    let interval = Duration::from_millis(cfg.input.poll_interval_ms);

    let sampled = sample(&mut stage, &shutdown, cfg.input.steps, interval);
    let stopped = control.shutdown();
    eprintln!("{}", "worker stopped, motors zeroed".green());

    sampled.and(stopped)
}

fn sample(
    stage: &mut InputStage<InputClient>,
    shutdown: &AtomicBool,
    steps: Option<u64>,
    interval: Duration,
) -> Result<(), HalError> {
    let mut taken = 0u64;
    while !shutdown.load(Ordering::SeqCst) && steps.is_none_or(|n| taken < n) {
        let snapshot = stage.step()?;
        match serde_json::to_string(&snapshot) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to encode snapshot"),
        }
        taken += 1;
        thread::sleep(interval);
    }
    info!(snapshots = taken, "sampling finished");
    Ok(())
}

fn print_banner() {
    eprintln!();
    eprintln!(
        "  {} {}",
        "ardhal".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  {}", "robot hardware worker (simulated bus)".dimmed());
    eprintln!();
}
