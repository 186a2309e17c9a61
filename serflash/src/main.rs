use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};
use serflash_core::error::FlashError;
use serflash_core::event::{EventSink, Level, LogEvent};
use serflash_core::flash::{BackupOutcome, Flasher, ProgrammerSpec};
use serflash_core::ports::{PortEnumerator, SerialEnumerator};
use serflash_core::reconcile::Reconciler;
use serflash_core::runner::ProgrammerExe;
use serflash_core::watch::{PortWatcher, SETTLE_DELAY, spawn_poll_notifier};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Poll interval for the portable device-change detector used by `watch`.
const POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Parser)]
#[command(name = "serflash")]
#[command(about = "A serprog flashing front-end with verified backups", version)]
struct Cli {
    /// Path to the programmer executable
    #[arg(long = "flashrom", default_value = "flashrom", global = true)]
    flashrom: PathBuf,

    /// Serial port to use; selected interactively when omitted
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a firmware image to the chip
    Write {
        /// Firmware image to write
        #[arg(required = true)]
        firmware: PathBuf,

        /// Skip the interactive confirmation
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// Read the chip once into an image file
    Read {
        /// Output image file
        #[arg(required = true)]
        output: PathBuf,
    },
    /// Read the chip twice and keep the result only if both reads agree
    Backup {
        /// Output image file
        #[arg(required = true)]
        output: PathBuf,
    },
    /// Probe the programmer and chip without transferring data
    Detect,
    /// Compare two image files byte for byte
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
    /// List available serial ports
    List,
    /// Follow device changes live, tracking the selected port
    Watch,
}

/// Renders core events as timestamped, colored console lines.
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn event(&self, event: LogEvent) {
        let time = event.timestamp.format("%H:%M:%S");
        match event.level {
            Level::Info => println!("[{time}] INFO: {}", event.message),
            Level::Warn => println!("[{time}] {}: {}", style("WARN").yellow().bold(), event.message),
            Level::Error => println!("[{time}] {}: {}", style("ERROR").red().bold(), event.message),
            Level::Success => println!("[{time}] {}: {}", style("OK").green().bold(), event.message),
            Level::Command => {
                println!("{}", style(format!("[{time}] CMD: {}", event.message)).dim())
            }
        }
    }

    fn status(&self, connected: bool, text: &str) {
        let dot = if connected {
            style("●").green()
        } else {
            style("●").dim()
        };
        println!("  {dot} {text}");
    }
}

/// Resolves the port to use: the `--port` flag if given, otherwise an
/// interactive pick over a fresh enumeration.
fn resolve_port(cli_port: Option<String>) -> Result<String> {
    if let Some(port) = cli_port {
        return Ok(port);
    }

    let snapshot = SerialEnumerator.enumerate()?;
    let ports: Vec<String> = snapshot.iter().map(str::to_string).collect();
    if ports.is_empty() {
        return Err(FlashError::NoPortSelected.into());
    }

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the programmer port")
        .items(&ports)
        .default(0)
        .interact()?;

    Ok(ports[selection].clone())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let sink = ConsoleSink;

    match cli.command {
        Commands::Write { firmware, yes } => {
            let port = resolve_port(cli.port)?;
            let spec = ProgrammerSpec::new(port, cli.baud);
            let flasher = Flasher::new(ProgrammerExe::new(&cli.flashrom));

            let confirm = || {
                if yes {
                    return true;
                }
                let size = std::fs::metadata(&firmware).map(|m| m.len()).unwrap_or(0);
                println!(
                    "{} This will overwrite the chip behind {} with '{}' ({} bytes).",
                    style("WARNING:").red().bold(),
                    style(spec.port()).cyan(),
                    style(firmware.display()).cyan(),
                    size,
                );
                Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt("Are you sure you want to proceed?")
                    .default(false)
                    .interact()
                    .unwrap_or(false)
            };

            flasher.write(&spec, Some(&firmware), confirm, &sink)?;
        }
        Commands::Read { output } => {
            let port = resolve_port(cli.port)?;
            let spec = ProgrammerSpec::new(port, cli.baud);
            let flasher = Flasher::new(ProgrammerExe::new(&cli.flashrom));

            flasher.read(&spec, &output, &sink)?;
        }
        Commands::Backup { output } => {
            let port = resolve_port(cli.port)?;
            let spec = ProgrammerSpec::new(port, cli.baud);
            let flasher = Flasher::new(ProgrammerExe::new(&cli.flashrom));

            match flasher.smart_backup(&spec, &output, &sink)? {
                BackupOutcome::Verified => {
                    println!(
                        "\n✨ Verified backup written to {}.",
                        style(output.display()).cyan()
                    );
                }
                BackupOutcome::IntegrityMismatch {
                    first_dump,
                    second_dump,
                } => {
                    return Err(anyhow!(
                        "the two reads disagreed; dumps kept at {} and {}",
                        first_dump.display(),
                        second_dump.display()
                    ));
                }
            }
        }
        Commands::Detect => {
            let port = resolve_port(cli.port)?;
            let spec = ProgrammerSpec::new(port, cli.baud);
            let flasher = Flasher::new(ProgrammerExe::new(&cli.flashrom));

            flasher.detect(&spec, &sink)?;
        }
        Commands::Compare { first, second } => {
            let flasher = Flasher::new(ProgrammerExe::new(&cli.flashrom));
            flasher.compare_files(&first, &second, &sink)?;
        }
        Commands::List => {
            let snapshot = SerialEnumerator.enumerate()?;
            if snapshot.is_empty() {
                println!("No serial ports found.");
                return Ok(());
            }

            println!("Found {} serial ports:\n", snapshot.len());
            for port in snapshot.iter() {
                println!("  {port}");
            }
        }
        Commands::Watch => watch(&sink)?,
    }

    Ok(())
}

/// Follows device changes until Ctrl-C, feeding debounced re-enumerations
/// through the reconciler and rendering what it decides.
fn watch(sink: &ConsoleSink) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let enumerator: Arc<dyn PortEnumerator> = Arc::new(SerialEnumerator);
    let initial = enumerator.enumerate()?;

    if initial.is_empty() {
        println!("No serial ports attached yet.");
    } else {
        println!("Ports at start:");
        for port in initial.iter() {
            println!("  {port}");
        }
    }

    let mut reconciler = Reconciler::new(initial);
    let (watcher, signal) = PortWatcher::spawn(Arc::clone(&enumerator), SETTLE_DELAY);
    spawn_poll_notifier(enumerator, signal, POLL_INTERVAL);
    log::debug!("watching with settle delay {SETTLE_DELAY:?}, poll interval {POLL_INTERVAL:?}");

    println!("Watching for device changes (Ctrl-C to stop)...\n");
    while running.load(Ordering::SeqCst) {
        match watcher.snapshots().recv_timeout(Duration::from_millis(200)) {
            Ok(snapshot) => reconciler.reconcile(snapshot, sink),
            Err(crossbeam::channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    println!("\nStopped watching.");
    Ok(())
}
