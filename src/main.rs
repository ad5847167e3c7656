//! Touch Digitizer Calibration
//!
//! Command-line front end for calibrating resistive touch digitizers over
//! their serial protocol.
//!
//! # Usage
//!
//! ```bash
//! # List available serial ports (requires serial feature)
//! touchcal ports
//!
//! # Calibrate a HID digitizer
//! touchcal calibrate -p /dev/ttyACM0 --rotation 90
//!
//! # Calibrate a uinput digitizer addressed in pixels
//! touchcal calibrate -p /dev/ttyACM0 --device uinput --width 1280 --height 800
//!
//! # Only change the display rotation
//! touchcal rotate -p /dev/ttyACM0 --rotation 180
//!
//! # Show where the calibration targets are drawn
//! touchcal targets --device uinput --width 1280 --height 800
//!
//! # Write the effective settings to a file
//! touchcal --config touchcal.toml config -o touchcal.toml
//! ```

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};

use touchcal::calibration::ReferenceGeometry;
use touchcal::config::{CalibrationConfig, DeviceClass, Rotation};

#[cfg(feature = "serial")]
use touchcal::calibration::{Calibrator, SessionEvent, SessionOutcome};
#[cfg(feature = "serial")]
use touchcal::serial::port::print_ports;

/// Touch Digitizer Calibration
///
/// Calibrates resistive touch digitizers over their serial protocol
#[derive(Parser)]
#[command(name = "touchcal")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Serial calibration tool for resistive touch digitizers")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Calibration settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full calibration sequence (requires --features serial)
    #[cfg(feature = "serial")]
    Calibrate {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Only set the display rotation (requires --features serial)
    #[cfg(feature = "serial")]
    Rotate {
        /// Serial port path (e.g., /dev/ttyACM0, COM3)
        #[arg(short, long)]
        port: Option<String>,

        /// Display rotation in degrees (0, 90, 180, 270)
        #[arg(short, long, value_parser = parse_rotation)]
        rotation: Option<Rotation>,
    },

    /// List available serial ports (requires --features serial)
    #[cfg(feature = "serial")]
    Ports,

    /// Print the display targets touched during calibration
    Targets {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Write the effective settings as TOML
    Config {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DeviceKind {
    /// HID digitizer with a 0..10000 logical range
    Hid,
    /// uinput device addressed in display pixels
    Uinput,
}

/// Overrides applied on top of the settings file
#[derive(Args)]
struct DeviceArgs {
    /// Serial port path (e.g., /dev/ttyACM0, COM3)
    #[arg(short, long)]
    port: Option<String>,

    /// Device class
    #[arg(short, long, value_enum)]
    device: Option<DeviceKind>,

    /// Display width in pixels (uinput)
    #[arg(long)]
    width: Option<u32>,

    /// Display height in pixels (uinput)
    #[arg(long)]
    height: Option<u32>,

    /// Display rotation in degrees (0, 90, 180, 270)
    #[arg(short, long, value_parser = parse_rotation)]
    rotation: Option<Rotation>,
}

impl DeviceArgs {
    fn apply(&self, mut config: CalibrationConfig) -> Result<CalibrationConfig> {
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(rotation) = self.rotation {
            config.rotation = rotation;
        }

        let current = match config.device {
            DeviceClass::Uinput { width, height } => Some((width, height)),
            DeviceClass::Hid => None,
        };

        config.device = match self.device {
            Some(DeviceKind::Hid) => DeviceClass::Hid,
            Some(DeviceKind::Uinput) => {
                let (width, height) = match (self.width, self.height, current) {
                    (Some(w), Some(h), _) => (w, h),
                    (w, h, Some((cw, ch))) => (w.unwrap_or(cw), h.unwrap_or(ch)),
                    _ => bail!("--device uinput needs --width and --height"),
                };
                DeviceClass::Uinput { width, height }
            }
            None => match (self.width, self.height, current) {
                (None, None, _) => config.device,
                (w, h, Some((cw, ch))) => DeviceClass::Uinput {
                    width: w.unwrap_or(cw),
                    height: h.unwrap_or(ch),
                },
                _ => bail!("--width and --height only apply to --device uinput"),
            },
        };

        Ok(config)
    }
}

fn parse_rotation(value: &str) -> Result<Rotation, String> {
    let degrees: u16 = value
        .parse()
        .map_err(|_| format!("invalid rotation: {}", value))?;
    Rotation::try_from(degrees)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        #[cfg(feature = "serial")]
        Commands::Calibrate { device } => handle_calibrate(device.apply(config)?, false),
        #[cfg(feature = "serial")]
        Commands::Rotate { port, rotation } => {
            let args = DeviceArgs {
                port,
                device: None,
                width: None,
                height: None,
                rotation,
            };
            handle_calibrate(args.apply(config)?, true)
        }
        #[cfg(feature = "serial")]
        Commands::Ports => print_ports(),
        Commands::Targets { device } => handle_targets(&device.apply(config)?),
        Commands::Config { device, output } => handle_config(&device.apply(config)?, output),
    }
}

fn load_config(path: Option<&Path>) -> Result<CalibrationConfig> {
    match path {
        Some(path) => CalibrationConfig::load(path),
        None => Ok(CalibrationConfig::default()),
    }
}

fn target_labels() -> [&'static str; 3] {
    ["right center", "bottom center", "top left"]
}

fn handle_targets(config: &CalibrationConfig) -> Result<()> {
    let geometry = ReferenceGeometry::for_device(&config.device);

    println!("{}", "=".repeat(60));
    println!(
        "{}",
        format!("Calibration Targets ({})", config.device.name())
            .cyan()
            .bold()
    );
    println!("{}", "=".repeat(60));

    for (index, (label, target)) in target_labels()
        .iter()
        .zip(geometry.targets())
        .enumerate()
    {
        println!(
            "  {} {:<14} x={:<6} y={}",
            format!("[{}]", index + 1).cyan(),
            label,
            target.x,
            target.y
        );
    }

    println!("{}", "=".repeat(60));
    Ok(())
}

fn handle_config(config: &CalibrationConfig, output: Option<PathBuf>) -> Result<()> {
    let text = config.to_toml()?;

    if let Some(path) = output {
        std::fs::write(&path, &text)?;
        println!(
            "{} Settings written to {}",
            "[OK]".green().bold(),
            path.display()
        );
    } else {
        println!("{}", text);
    }

    Ok(())
}

#[cfg(feature = "serial")]
fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

#[cfg(feature = "serial")]
fn prompt(message: &str) {
    println!("{} {} {}", timestamp().dimmed(), "[*]".cyan().bold(), message);
}

#[cfg(feature = "serial")]
fn prompt_target(geometry: &ReferenceGeometry, index: usize) {
    let target = geometry.targets()[index];
    prompt(&format!(
        "Touch target {} ({}) at x={} y={}",
        index + 1,
        target_labels()[index],
        target.x,
        target.y
    ));
}

#[cfg(feature = "serial")]
fn handle_calibrate(config: CalibrationConfig, rotation_only: bool) -> Result<()> {
    let geometry = ReferenceGeometry::for_device(&config.device);

    prompt(&format!(
        "Connecting to {} (device: {}, rotation: {})",
        config.port.white(),
        config.device.name(),
        config.rotation
    ));

    let (mut calibrator, events) = Calibrator::with_serial_port(config);
    calibrator.connect();

    let mut succeeded = false;
    for event in events.iter() {
        match event {
            SessionEvent::Connected(true) => {
                prompt("Connected");
                let started = if rotation_only {
                    calibrator.set_rotation_only()
                } else {
                    calibrator.start_calibration()
                };
                if !started {
                    break;
                }
                if !rotation_only {
                    prompt_target(&geometry, 0);
                }
            }
            SessionEvent::PointReceived {
                success: true,
                next_index,
            } => {
                prompt(&format!("Point {} recorded", next_index));
                if next_index < geometry.targets().len() {
                    prompt_target(&geometry, next_index);
                } else {
                    prompt("Press firmly anywhere on the screen, then lift your finger");
                }
            }
            SessionEvent::PressureReceived(true) => {
                prompt("Pressure range recorded, uploading calibration");
            }
            SessionEvent::DeviceLog(line) => {
                println!("{} {} {}", timestamp().dimmed(), "[DEV]".dimmed(), line);
            }
            SessionEvent::CalibrationComplete(ok) => {
                succeeded = ok;
                break;
            }
            failure => {
                println!(
                    "{} {} {:?}",
                    timestamp().dimmed(),
                    "[FAILED]".red().bold(),
                    failure
                );
                break;
            }
        }
    }

    let outcome = calibrator.disconnect();
    report(outcome, succeeded);

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "serial")]
fn report(outcome: Option<SessionOutcome>, succeeded: bool) {
    match outcome {
        Some(Ok(Some(coefficients))) => {
            println!("\n{}", "Calibration Coefficients:".white().bold());
            for (letter, value) in coefficients.values() {
                println!("  {} = {:.6}", letter, value);
            }
        }
        Some(Err(e)) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
        }
        _ => {}
    }

    if succeeded {
        println!("\n{} Calibration complete", "[OK]".green().bold());
    } else {
        eprintln!("\n{} Calibration failed", "[ERROR]".red().bold());
    }
}
