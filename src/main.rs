mod auth;
mod backup;
mod cli;
mod config;
mod error;
mod log;
mod upload;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Backs up the notes data store to Google Drive", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run one backup and exit (0 uploaded, 1 upload incomplete, 2 error)
    Run,
    /// Run backups on the configured schedule until Ctrl+C
    Schedule,
    /// Sign in to Google Drive and store the refresh token
    Auth,
    /// Interactive menu (default)
    Menu,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    log::init(&args.log_level);

    info!("Notes backup starting...");

    let ctrl_c_count = Arc::new(AtomicUsize::new(0));
    let ctrl_c_count_clone = ctrl_c_count.clone();

    ctrlc::set_handler(move || {
        let count = ctrl_c_count_clone.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            println!("\n\nShutdown signal received. Press Ctrl+C again to force exit...");
        } else {
            println!("\nForce exiting...");
            std::process::exit(130);
        }
    })
    .expect("Error setting Ctrl-C handler");

    let config_path = args.config.unwrap_or_else(config::config_path);

    let code = match args.command.unwrap_or(Command::Menu) {
        Command::Run => cli::run_once(&config_path).await,
        Command::Schedule => cli::run_scheduled(&config_path, ctrl_c_count).await,
        Command::Auth => cli::authorize(&config_path).await,
        Command::Menu => match cli::run_menu(ctrl_c_count, &config_path).await {
            Ok(_) => {
                info!("Application exited normally");
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
    };

    std::process::exit(code);
}
