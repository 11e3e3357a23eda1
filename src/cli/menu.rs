use crate::backup::scheduler::run_scheduler_with;
use crate::backup::{BackupEngine, BackupResult};
use crate::config::{self, AppConfig};
use crate::error::Result;
use console::style;
use dialoguer::Select;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
enum MenuOption {
    RunBackupNow,
    SchedulerMenu,
    EditConfiguration,
    TestDriveConnection,
    Quit,
}

impl MenuOption {
    fn display(&self, scheduler_running: bool) -> String {
        match self {
            MenuOption::RunBackupNow => "Run backup now".to_string(),
            MenuOption::SchedulerMenu => {
                if scheduler_running {
                    format!("Scheduler [{}]", style("RUNNING").green())
                } else {
                    format!("Scheduler [{}]", style("STOPPED").dim())
                }
            }
            MenuOption::EditConfiguration => "Edit configuration".to_string(),
            MenuOption::TestDriveConnection => "Test Drive connection".to_string(),
            MenuOption::Quit => "Quit".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SchedulerOption {
    Start,
    Stop,
    ViewHistory,
    Back,
}

impl std::fmt::Display for SchedulerOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerOption::Start => write!(f, "Start scheduler"),
            SchedulerOption::Stop => write!(f, "Stop scheduler"),
            SchedulerOption::ViewHistory => write!(f, "View backup history"),
            SchedulerOption::Back => write!(f, "Back to main menu"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EditOption {
    DataPaths,
    DriveFolder,
    Authorization,
    ChangeSchedule,
    WorkDirectory,
    Back,
}

impl std::fmt::Display for EditOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditOption::DataPaths => write!(f, "Change data paths"),
            EditOption::DriveFolder => write!(f, "Change Drive folder"),
            EditOption::Authorization => write!(f, "Configure Google authorization"),
            EditOption::ChangeSchedule => write!(f, "Change backup schedule"),
            EditOption::WorkDirectory => write!(f, "Change working directory"),
            EditOption::Back => write!(f, "Back to main menu"),
        }
    }
}

fn display_header() {
    println!();
    println!("{}", style("╔════════════════════════════════════════╗").cyan());
    println!("{}", style("║        Notes Backup Manager            ║").cyan());
    println!("{}", style("╚════════════════════════════════════════╝").cyan());
    println!();
}

fn display_summary(config: &AppConfig, scheduler_running: bool) {
    println!("{}", style("Current Configuration:").bold());
    println!(
        "  Data: {}",
        if config.data.is_complete() {
            style(config.data.notes_dir.display().to_string()).green()
        } else {
            style("Not configured".to_string()).red()
        }
    );
    println!("  Drive folder: {}", style(&config.drive.folder_name).cyan());
    println!(
        "  Refresh token: {}",
        if config.auth.token_file.exists() {
            style("Stored").green()
        } else {
            style("Not stored").yellow()
        }
    );
    println!(
        "  Schedule: {}",
        match &config.schedule {
            Some(schedule) => style(schedule.to_string()).cyan(),
            None => style("None".to_string()).dim(),
        }
    );
    println!(
        "  Scheduler: {}",
        if scheduler_running {
            style("Running").green()
        } else {
            style("Stopped").dim()
        }
    );
    println!("  Working directory: {}", style(config.work_dir.display()).cyan());
    println!();
}

type History = Arc<Mutex<Vec<BackupResult>>>;

fn record(history: &History, result: BackupResult) {
    if let Ok(mut entries) = history.lock() {
        entries.insert(0, result);
        entries.truncate(HISTORY_LIMIT);
    }
}

struct BackgroundServices {
    scheduler_shutdown: Arc<AtomicUsize>,
    scheduler_handle: Option<JoinHandle<()>>,
    history: History,
}

impl BackgroundServices {
    fn new() -> Self {
        Self {
            scheduler_shutdown: Arc::new(AtomicUsize::new(0)),
            scheduler_handle: None,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn is_scheduler_running(&self) -> bool {
        self.scheduler_handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    fn stop_scheduler(&self) {
        self.scheduler_shutdown.store(1, Ordering::SeqCst);
    }
}

pub async fn run_menu(shutdown: Arc<AtomicUsize>, config_path: &Path) -> Result<()> {
    let mut config = config::load_from(config_path)?;
    let mut services = BackgroundServices::new();
    if !config.data.is_complete() {
        println!(
            "\n{}",
            style("No configuration found. Starting setup wizard...").yellow()
        );
        super::wizard::run_initial_setup(&mut config).await?;
        config::save_to(&config, config_path)?;
    }

    loop {
        if shutdown.load(Ordering::Relaxed) > 0 {
            services.stop_scheduler();
            break;
        }

        display_header();
        display_summary(&config, services.is_scheduler_running());

        let menu_items = vec![
            MenuOption::RunBackupNow,
            MenuOption::SchedulerMenu,
            MenuOption::EditConfiguration,
            MenuOption::TestDriveConnection,
            MenuOption::Quit,
        ];

        let display_items: Vec<String> = menu_items
            .iter()
            .map(|m| m.display(services.is_scheduler_running()))
            .collect();

        let selection = match Select::new()
            .with_prompt("Select an option")
            .items(&display_items)
            .default(0)
            .interact_opt()
        {
            Ok(Some(s)) => s,
            Ok(None) => break,
            Err(_) => break,
        };

        match menu_items[selection] {
            MenuOption::RunBackupNow => {
                if services.is_scheduler_running() {
                    println!(
                        "{}",
                        style("The scheduler is running. Stop it before starting a manual backup.").yellow()
                    );
                } else {
                    run_backup_now(&config, &services.history).await;
                }
            }
            MenuOption::SchedulerMenu => {
                scheduler_menu(&config, &mut services).await;
            }
            MenuOption::EditConfiguration => {
                if let Err(e) = edit_configuration(&mut config) {
                    println!("{}: {}", style("Error").red(), e);
                } else if let Err(e) = config::save_to(&config, config_path) {
                    println!("{}: {}", style("Failed to save configuration").red(), e);
                }
            }
            MenuOption::TestDriveConnection => {
                test_drive_connection(&config).await;
            }
            MenuOption::Quit => {
                if services.is_scheduler_running() {
                    println!("{}", style("Stopping scheduler...").yellow());
                    services.stop_scheduler();
                }
                println!("{}", style("Goodbye!").green());
                break;
            }
        }
    }

    Ok(())
}

async fn scheduler_menu(config: &AppConfig, services: &mut BackgroundServices) {
    loop {
        println!("\n{}", style("=== Scheduler ===").cyan().bold());

        let is_running = services.is_scheduler_running();
        println!(
            "Status: {}",
            if is_running {
                style("Running").green()
            } else {
                style("Stopped").dim()
            }
        );

        let options = vec![
            SchedulerOption::Start,
            SchedulerOption::Stop,
            SchedulerOption::ViewHistory,
            SchedulerOption::Back,
        ];

        let selection = match Select::new()
            .with_prompt("Select action")
            .items(&options)
            .default(0)
            .interact_opt()
        {
            Ok(Some(s)) => s,
            Ok(None) | Err(_) => break,
        };

        match options[selection] {
            SchedulerOption::Start => {
                if is_running {
                    println!("{}", style("Scheduler is already running!").yellow());
                    continue;
                }
                let Some(schedule) = config.schedule.clone() else {
                    println!("{}", style("No schedule configured. Please set one first.").red());
                    continue;
                };
                let engine = match BackupEngine::from_config(config) {
                    Ok(engine) => Arc::new(engine),
                    Err(e) => {
                        println!("{}: {}", style("Cannot start scheduler").red(), e);
                        continue;
                    }
                };

                services.scheduler_shutdown.store(0, Ordering::SeqCst);
                let shutdown = services.scheduler_shutdown.clone();
                let history = services.history.clone();
                services.scheduler_handle = Some(tokio::spawn(async move {
                    run_scheduler_with(engine, schedule, shutdown, move |result| {
                        record(&history, result.clone())
                    })
                    .await;
                }));

                println!("{}", style("Scheduler started!").green());
            }
            SchedulerOption::Stop => {
                if !is_running {
                    println!("{}", style("Scheduler is not running.").yellow());
                } else {
                    services.stop_scheduler();
                    println!(
                        "{}",
                        style("Scheduler stop signal sent! A backup in progress will finish first.").green()
                    );
                }
            }
            SchedulerOption::ViewHistory => {
                print_history(&services.history);
                println!("\n{}", style("Press Enter to return to menu...").dim());
                let _ = tokio::task::spawn_blocking(|| {
                    let _ = std::io::stdin().read_line(&mut String::new());
                })
                .await;
            }
            SchedulerOption::Back => break,
        }
    }
}

fn print_history(history: &History) {
    println!("\n{}", style("=== Backup History ===").cyan().bold());
    let entries = match history.lock() {
        Ok(entries) => entries,
        Err(_) => return,
    };
    if entries.is_empty() {
        println!("  {}", style("No backups yet").dim());
        return;
    }
    for result in entries.iter().take(15) {
        print_result(result);
    }
}

fn print_result(result: &BackupResult) {
    if result.success {
        println!(
            "{} {} - {} ({:.2} MB, {} sec)",
            style("✓").green(),
            result.archive_name,
            style("Success").green(),
            result.file_size.unwrap_or(0) as f64 / 1024.0 / 1024.0,
            result.duration_secs
        );
    } else {
        println!(
            "{} {} - {} ({})",
            style("✗").red(),
            result.archive_name,
            style("Failed").red(),
            result.error.as_deref().unwrap_or("Unknown error")
        );
    }
}

async fn run_backup_now(config: &AppConfig, history: &History) {
    println!("\n{}", style("Running backup...").yellow());

    match BackupEngine::from_config(config) {
        Ok(engine) => {
            let result = engine.run().await;
            println!("\n{}", style("=== Backup Result ===").cyan().bold());
            print_result(&result);
            record(history, result);
        }
        Err(e) => println!("{}: {}", style("Cannot run backup").red(), e),
    }

    println!("\nPress Enter to continue...");
    let _ = std::io::stdin().read_line(&mut String::new());
}

fn edit_configuration(config: &mut AppConfig) -> Result<()> {
    loop {
        println!("\n{}", style("=== Edit Configuration ===").cyan().bold());

        let edit_items = vec![
            EditOption::DataPaths,
            EditOption::DriveFolder,
            EditOption::Authorization,
            EditOption::ChangeSchedule,
            EditOption::WorkDirectory,
            EditOption::Back,
        ];

        let selection = match Select::new()
            .with_prompt("What would you like to edit?")
            .items(&edit_items)
            .default(0)
            .interact_opt()
        {
            Ok(Some(s)) => s,
            Ok(None) | Err(_) => break,
        };

        match edit_items[selection] {
            EditOption::DataPaths => super::wizard::configure_data_paths(config)?,
            EditOption::DriveFolder => super::wizard::configure_drive_folder(config)?,
            EditOption::Authorization => super::wizard::configure_auth(config)?,
            EditOption::ChangeSchedule => config.schedule = Some(super::wizard::configure_schedule()?),
            EditOption::WorkDirectory => super::wizard::configure_work_dir(config)?,
            EditOption::Back => break,
        }
    }

    Ok(())
}

async fn test_drive_connection(config: &AppConfig) {
    println!("\n{}", style("Testing Drive connection...").yellow());

    match BackupEngine::from_config(config) {
        Ok(engine) => match engine.test_connection().await {
            Ok(folder_id) => println!(
                "{}",
                style(format!(
                    "Drive connection successful! Folder '{}' ({})",
                    config.drive.folder_name, folder_id
                ))
                .green()
            ),
            Err(e) => println!("{}: {}", style("Drive test failed").red(), e),
        },
        Err(e) => println!("{}: {}", style("Configuration error").red(), e),
    }

    println!("\nPress Enter to continue...");
    let _ = std::io::stdin().read_line(&mut String::new());
}
