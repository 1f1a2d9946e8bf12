//! Setu - command-line client for the robot controller
//!
//! ```bash
//! # Wait for the controller's address announcement
//! setu discover --timeout-ms 5000
//!
//! # Send one command and print the acknowledgement
//! setu --robot 192.168.2.1 send chassis move x 0.2
//!
//! # Drive from the keyboard (one key per line, `help` lists bindings)
//! setu --robot 192.168.2.1 teleop
//!
//! # Log pose and frame rate until Ctrl-C, keeping the last frame
//! setu watch --snapshot last.png
//! ```

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use tracing::{error, info, warn};

use setu::error::{Result, SetuError};
use setu::shared::StopSignal;
use setu::{Command, Session, SetuConfig, discovery, teleop};

/// Default configuration file looked up in the working directory
const DEFAULT_CONFIG: &str = "setu.toml";

#[derive(Parser, Debug)]
#[command(name = "setu", version, about = "Robot controller link")]
struct Cli {
    /// Configuration file (default: ./setu.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Robot IP address, overrides the configuration
    #[arg(short, long)]
    robot: Option<String>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Wait for a discovery broadcast and print the controller address
    Discover {
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Send one command and print the acknowledgement
    Send {
        /// Acknowledgement timeout in milliseconds
        #[arg(long, default_value_t = 3000)]
        ack_timeout_ms: u64,

        /// Command tokens, e.g. `chassis move x 0.2`
        #[arg(required = true, num_args = 1..)]
        tokens: Vec<String>,
    },
    /// Drive the robot with single-key commands read from stdin
    Teleop,
    /// Log pose and frame statistics until Ctrl-C
    Watch {
        /// Stop after this many seconds
        #[arg(long)]
        duration_s: Option<u64>,

        /// Write the last received frame to this PNG file on exit
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

fn main() {
    // Initialize logging
    let directive: tracing_subscriber::filter::Directive = match "setu=info".parse() {
        Ok(directive) => directive,
        Err(e) => {
            eprintln!("Invalid log directive: {}", e);
            std::process::exit(1);
        }
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(directive);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(ip) = cli.robot {
        info!("Using robot IP: {}", ip);
        config.connection.robot_ip = Some(ip);
    }

    info!("Setu v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Action::Discover { timeout_ms } => {
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .or(config.discovery_timeout());
            let endpoint = discovery::discover(config.ports(), timeout)?;
            println!("{}", endpoint.ip());
            Ok(())
        }
        Action::Send {
            ack_timeout_ms,
            tokens,
        } => {
            config.video.enabled = false;
            let session = Session::connect(config)?;
            let ack = session.send_and_wait(
                &Command::from_tokens(tokens),
                Duration::from_millis(ack_timeout_ms),
            )?;
            println!("{}", ack);
            session.close();
            Ok(())
        }
        Action::Teleop => {
            config.video.enabled = false;
            let session = Session::connect(config)?;
            let stop = install_stop_handler()?;
            let result = run_teleop(&session, &stop);
            session.close();
            result
        }
        Action::Watch {
            duration_s,
            snapshot,
        } => {
            let session = Session::connect(config)?;
            let stop = install_stop_handler()?;
            run_watch(&session, &stop, duration_s.map(Duration::from_secs));
            if let Some(path) = snapshot {
                save_snapshot(&session, &path);
            }
            session.close();
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SetuConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            SetuConfig::load(path)
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            info!("Loading configuration from {}", DEFAULT_CONFIG);
            SetuConfig::load(Path::new(DEFAULT_CONFIG))
        }
        None => {
            info!("Using default configuration");
            Ok(SetuConfig::default())
        }
    }
}

fn install_stop_handler() -> Result<Arc<StopSignal>> {
    let stop = Arc::new(StopSignal::new());
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        handler_stop.stop();
    })
    .map_err(|e| SetuError::Config(format!("Error setting Ctrl-C handler: {}", e)))?;
    Ok(stop)
}

fn print_bindings() {
    println!("Keys (one per line, `quit` to exit):");
    for (key, description) in teleop::BINDINGS {
        println!("  {}  {}", key, description);
    }
}

/// Forward stdin lines to a channel so the caller can also watch for Ctrl-C.
fn spawn_stdin_reader() -> Result<Receiver<std::io::Result<String>>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn run_teleop(session: &Session, stop: &StopSignal) -> Result<()> {
    print_bindings();

    let lines = spawn_stdin_reader()?;
    while !stop.is_stopped() {
        let line = match lines.recv_timeout(Duration::from_millis(100)) {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                warn!("Failed to read input: {}", e);
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                print_bindings();
                continue;
            }
            _ => {}
        }

        for key in line.trim().chars() {
            match teleop::command_for_key(key) {
                Some(command) => {
                    if let Err(e) = session.send(&command) {
                        error!("Failed to send {}: {}", command, e);
                        return Ok(());
                    }
                }
                None => warn!("No binding for {:?}", key),
            }
        }
    }
    Ok(())
}

fn run_watch(session: &Session, stop: &StopSignal, duration: Option<Duration>) {
    let started = Instant::now();
    let mut frames = 0u64;
    let mut window_start = Instant::now();

    while !stop.is_stopped() {
        if let Some(limit) = duration
            && started.elapsed() >= limit
        {
            break;
        }

        if session.wait_for_frame(Duration::from_millis(100)).is_some() {
            frames += 1;
        }

        if window_start.elapsed() >= Duration::from_secs(1) {
            let pose = session.pose();
            let fps = frames as f64 / window_start.elapsed().as_secs_f64();
            info!(
                "pose x={:.3} y={:.3} yaw={:.1} | video {:.1} fps",
                pose.x, pose.y, pose.yaw, fps
            );
            frames = 0;
            window_start = Instant::now();
        }
    }
}

fn save_snapshot(session: &Session, path: &Path) {
    match session.latest_frame() {
        Some(frame) => match frame.save_png(path) {
            Ok(()) => info!("Saved frame {} to {:?}", frame.seq(), path),
            Err(e) => error!("{}", e),
        },
        None => warn!("No frame received, nothing saved"),
    }
}
