//! # Sonar HAL Binary
//!
//! Rotational ultrasonic scanner with pluggable GPIO drivers and a
//! line-oriented operator console on stdin.
//!
//! # Usage
//!
//! ```bash
//! # Run against the simulated room
//! sonar_hal --simulate
//!
//! # Real pins through sysfs, scan once at startup
//! sonar_hal --config /etc/sonar/scanner.toml --driver sysfs --scan-on-start
//!
//! # Verbose JSON logs
//! sonar_hal -s -v --json
//! ```

#![deny(warnings)]

use clap::Parser;
use sonar_common::config::ConfigLoader;
use sonar_common::consts::DEFAULT_CONFIG_PATH;
use sonar_common::hal::config::ScannerConfig;
use sonar_hal::console::{self, Command, Reply};
use sonar_hal::{DriverRegistry, JsonVisualizer, ScannerCore};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

/// How often the console loop checks the shutdown flag.
const CONSOLE_POLL: Duration = Duration::from_millis(100);

/// Sonar HAL - rotational ultrasonic scanner
#[derive(Parser, Debug)]
#[command(name = "sonar_hal")]
#[command(version)]
#[command(about = "Stepper-driven 360° ultrasonic scanner with pluggable GPIO drivers")]
#[command(long_about = None)]
struct Args {
    /// Path to scanner configuration file (missing file = defaults)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force simulation driver
    #[arg(short = 's', long)]
    simulate: bool,

    /// Pin driver to load (overrides the config file)
    #[arg(short, long)]
    driver: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Run one scan as soon as the core is up
    #[arg(long)]
    scan_on_start: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run(Args::parse()) {
        // The subscriber may not be installed yet (config errors).
        eprintln!("Scanner startup failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ScannerConfig::load_or_default(&args.config)?;
    config.validate()?;

    setup_tracing(&args, &config);
    info!("Sonar HAL v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: {} ({})",
        args.config.display(),
        config.shared.service_name
    );

    let driver_name = if args.simulate {
        info!("Simulation mode enabled");
        "simulation".to_string()
    } else if let Some(name) = &args.driver {
        info!("Driver from CLI: {}", name);
        name.clone()
    } else {
        config.driver.clone()
    };

    let registry = DriverRegistry::with_builtin_drivers();
    let io = registry.create_driver(&driver_name, &config)?;
    info!("Created driver: {}", io.name());

    let visualizer = Arc::new(JsonVisualizer::new(std::io::stdout()));
    let (core, status_rx) = ScannerCore::new(config, io, visualizer)?;

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let printer = std::thread::Builder::new()
        .name("sonar-status".to_string())
        .spawn(move || {
            for event in status_rx {
                println!("{event}");
            }
        })?;

    core.init()?;
    if args.scan_on_start {
        core.run_scan()?;
    }

    console_loop(&core, core.running_flag());

    core.shutdown()?;
    drop(core);
    if printer.join().is_err() {
        warn!("Status printer panicked");
    }

    info!("Sonar HAL shutdown complete");
    Ok(())
}

/// Read commands from stdin until `quit` or the running flag drops.
fn console_loop(core: &ScannerCore, running: Arc<AtomicBool>) {
    // Detached: a blocked stdin read must not hold up shutdown.
    let rx = match console::spawn_line_reader(std::io::BufReader::new(std::io::stdin())) {
        Ok(rx) => rx,
        Err(e) => {
            warn!("Console unavailable: {}", e);
            let (_, rx) = mpsc::channel();
            rx
        }
    };

    println!("Commands: {}", console::HELP);
    let mut stdin_open = true;

    while running.load(Ordering::SeqCst) {
        let line = match rx.recv_timeout(CONSOLE_POLL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                if stdin_open {
                    info!("stdin closed; waiting for Ctrl-C");
                    stdin_open = false;
                }
                std::thread::sleep(CONSOLE_POLL);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd = match line.parse::<Command>() {
            Ok(cmd) => cmd,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match console::dispatch(core, cmd) {
            Ok(Reply::Ack) => {}
            Ok(Reply::Text(text)) => println!("{text}"),
            Ok(Reply::Quit) => break,
            // Refusals are already on the status stream.
            Err(e) => warn!("Command {:?} failed: {}", cmd, e),
        }
    }
}

/// Setup tracing subscriber based on CLI arguments and config.
fn setup_tracing(args: &Args, config: &ScannerConfig) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        config.shared.log_level.into()
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
