//! SetuLink command-line tool
//!
//! ```bash
//! setu-link --robot 192.168.1.121 laser
//! setu-link drive --vx 0.2 --seconds 3
//! setu-link --config setu.toml alarms
//! ```
//!
//! Configuration comes from `--config`, else `setu.toml` in the working
//! directory if present, else built-in defaults.

use clap::{Parser, Subcommand};
use setu_link::{Agv, Config, DriveKeys, Velocity};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_CONFIG: &str = "setu.toml";

#[derive(Parser)]
#[command(name = "setu-link")]
#[command(about = "Talk to a RoboKit AGV over TCP")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Robot IP address (overrides the configuration)
    #[arg(short, long)]
    robot: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a laser scan and print valid points as JSON lines
    Laser {
        /// Keep polling at `laser.poll_hz` until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Drive with a fixed velocity, then stop
    Drive {
        /// Forward speed (m/s)
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        vx: f32,

        /// Lateral speed (m/s)
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        vy: f32,

        /// Turn rate (rad/s)
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        w: f32,

        /// Drive keys instead of explicit speeds (w/s/a/d, space = stop)
        #[arg(long, conflicts_with_all = ["vx", "vy", "w"])]
        keys: Option<String>,

        /// How long to keep repeating the motion command
        #[arg(long, default_value = "1.0")]
        seconds: f32,
    },
    /// Send a single stop command
    Stop,
    /// Print active alarms
    Alarms,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    if let Err(e) = run(&args, &config) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> setu_link::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(Path::new(DEFAULT_CONFIG))?,
        None => Config::default(),
    };
    if let Some(robot) = &args.robot {
        config.connection.robot_ip = robot.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })?;

    log::info!(
        "Robot {} (control :{}, status :{})",
        config.connection.robot_ip,
        config.connection.control_port,
        config.connection.status_port
    );
    let agv = Agv::connect(config)?;

    match &args.command {
        Command::Laser { watch } => {
            let period = Duration::from_secs_f32(1.0 / config.laser.poll_hz as f32);
            loop {
                let started = Instant::now();
                let scan = agv.laser_scan()?;
                if scan.no_valid_data() {
                    log::warn!("No valid laser points");
                } else {
                    for point in &scan.points {
                        println!("{}", serde_json::to_string(point)?);
                    }
                    log::info!(
                        "{} valid points, {:.4} rad per point over the field of view",
                        scan.len(),
                        config.laser.fov / scan.len() as f32
                    );
                }
                if !*watch || !running.load(Ordering::Relaxed) {
                    break;
                }
                sleep_until_next(started, period, &running);
                if !running.load(Ordering::Relaxed) {
                    break;
                }
            }
        }
        Command::Drive {
            vx,
            vy,
            w,
            keys,
            seconds,
        } => {
            let velocity = match keys {
                Some(keys) => Velocity::from_keys(&DriveKeys::from_chars(keys), &config.motion),
                None => Velocity::new(*vx, *vy, *w),
            };
            let period = Duration::from_secs_f32(1.0 / config.motion.command_hz as f32);
            let deadline = drive_deadline(Instant::now(), *seconds)?;

            log::info!(
                "Driving vx={:.2} vy={:.2} w={:.2} for {:.1}s",
                velocity.vx,
                velocity.vy,
                velocity.w,
                seconds
            );
            while running.load(Ordering::Relaxed) && Instant::now() < deadline {
                let started = Instant::now();
                if let Err(e) = agv.drive(&velocity) {
                    log::warn!("Motion command failed: {}", e);
                }
                sleep_until_next(started, period, &running);
            }
        }
        Command::Stop => {
            agv.stop()?;
            println!("stopped");
        }
        Command::Alarms => {
            let report = agv.alarms()?;
            report.log();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    agv.shutdown();
    Ok(())
}

/// End of a `drive` run, or a usage error for negative, non-finite or
/// out-of-range `--seconds`
fn drive_deadline(start: Instant, seconds: f32) -> Result<Instant, String> {
    Duration::try_from_secs_f32(seconds)
        .ok()
        .and_then(|duration| start.checked_add(duration))
        .ok_or_else(|| {
            format!(
                "invalid --seconds {}: expected a finite, non-negative duration",
                seconds
            )
        })
}

/// Sleep out the rest of `period`, waking early on Ctrl-C
fn sleep_until_next(started: Instant, period: Duration, running: &AtomicBool) {
    let wake = started + period;
    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= wake {
            break;
        }
        thread::sleep((wake - now).min(Duration::from_millis(50)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_deadline() {
        let start = Instant::now();
        assert_eq!(drive_deadline(start, 0.0).unwrap(), start);
        assert_eq!(
            drive_deadline(start, 1.5).unwrap(),
            start + Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_drive_deadline_rejects_bad_seconds() {
        let start = Instant::now();
        for seconds in [f32::INFINITY, f32::NAN, -1.0, 1e30, f32::MAX] {
            let err = drive_deadline(start, seconds).unwrap_err();
            assert!(err.contains("--seconds"), "{}", err);
        }
    }

    #[test]
    fn test_cli_accepts_infinite_seconds() {
        let args = Args::try_parse_from(["setu-link", "drive", "--seconds", "inf"]).unwrap();
        let Command::Drive { seconds, .. } = args.command else {
            panic!("expected drive");
        };
        assert!(drive_deadline(Instant::now(), seconds).is_err());
    }
}
