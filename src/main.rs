//! SnapKV - An In-Memory Key-Value Store with Snapshots
//!
//! This is the main entry point for the SnapKV shell.
//! It loads the snapshot, starts the background tasks, and runs the
//! interactive read-eval-print loop over stdin.

use snapkv::commands::{Command, CommandHandler, ParseError, Reply};
use snapkv::persist::{self, AutoSaveConfig, AutoSaver};
use snapkv::storage::{Reaper, ReaperConfig, Store};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Shell configuration
struct Config {
    /// Snapshot file path
    file: PathBuf,
    /// Seconds between automatic snapshots
    save_interval: Duration,
    /// Milliseconds between expiry sweeps
    sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file: PathBuf::from(snapkv::DEFAULT_SNAPSHOT_PATH),
            save_interval: Duration::from_secs(snapkv::DEFAULT_SAVE_INTERVAL_SECS),
            sweep_interval: Duration::from_millis(snapkv::DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--file" | "-f" => {
                    if i + 1 < args.len() {
                        config.file = PathBuf::from(&args[i + 1]);
                        i += 2;
                    } else {
                        eprintln!("Error: --file requires a value");
                        std::process::exit(1);
                    }
                }
                "--save-interval" => {
                    if i + 1 < args.len() {
                        let secs: u64 = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid save interval");
                            std::process::exit(1);
                        });
                        config.save_interval = Duration::from_secs(secs);
                        i += 2;
                    } else {
                        eprintln!("Error: --save-interval requires a value");
                        std::process::exit(1);
                    }
                }
                "--sweep-interval" => {
                    if i + 1 < args.len() {
                        let ms: u64 = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid sweep interval");
                            std::process::exit(1);
                        });
                        config.sweep_interval = Duration::from_millis(ms);
                        i += 2;
                    } else {
                        eprintln!("Error: --sweep-interval requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("SnapKV version {}", snapkv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }
}

fn print_help() {
    println!(
        r#"
SnapKV - An In-Memory Key-Value Store with Snapshots

USAGE:
    snapkv [OPTIONS]

OPTIONS:
    -f, --file <PATH>            Snapshot file (default: snapkv.snapshot)
        --save-interval <SECS>   Seconds between automatic snapshots (default: 60)
        --sweep-interval <MS>    Milliseconds between expiry sweeps (default: 100)
    -v, --version                Print version information
        --help                   Print this help message

EXAMPLES:
    snapkv                               # Use ./snapkv.snapshot
    snapkv -f /var/lib/snapkv/db         # Custom snapshot location
    snapkv --save-interval 10            # Snapshot every 10 seconds

COMMANDS:
    snapkv> SET name "Nigel" EX 300
    OK
    snapkv> GET name
    Nigel
    snapkv> KEYS *
    name
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Restore from the last snapshot, if any
    let store = Arc::new(Store::new());
    match persist::read_snapshot(&config.file) {
        Ok(Some(entries)) => {
            let restored = store.import(entries);
            info!("Restored {} entries from {}", restored, config.file.display());
        }
        Ok(None) => {
            info!("No snapshot at {}, starting empty", config.file.display());
        }
        Err(e) => {
            warn!("Could not load {}: {}; starting empty", config.file.display(), e);
        }
    }

    // Start the background expiry reaper
    let reaper = Reaper::start(
        Arc::clone(&store),
        ReaperConfig {
            interval: config.sweep_interval,
        },
    );

    // Start the periodic snapshot task
    let saver = AutoSaver::start(
        Arc::clone(&store),
        AutoSaveConfig {
            interval: config.save_interval,
            path: config.file.clone(),
        },
    );

    println!("SnapKV v{} - type HELP for commands", snapkv::VERSION);

    let handler = CommandHandler::new(Arc::clone(&store), config.file.clone());

    // Run the shell until EXIT, stdin EOF, or Ctrl+C
    tokio::select! {
        _ = repl(handler) => {}
        _ = signal::ctrl_c() => {
            println!();
            info!("Shutdown signal received");
        }
    }

    // Graceful shutdown: stop the reaper, then take the final snapshot
    reaper.stop();
    saver.stop().await;
    info!("Shutdown complete");
    Ok(())
}

/// The interactive read-eval-print loop.
async fn repl(handler: CommandHandler) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("snapkv> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            // EOF or a broken stdin both end the session
            Ok(None) | Err(_) => return,
        };

        match Command::parse(&line) {
            Ok(command) => match handler.execute(command) {
                Reply::Text(text) => println!("{text}"),
                Reply::Exit => return,
            },
            Err(ParseError::Empty) => {}
            Err(e) => println!("error: {e}"),
        }
    }
}
