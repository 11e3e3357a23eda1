use crate::backup::BackupEngine;
use crate::config::{AppConfig, Schedule};
use crate::error::Result;
use console::style;
use dialoguer::{Input, Select};
use std::path::{Path, PathBuf};

fn prompt_path(prompt: &str, current: &Path) -> Result<PathBuf> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if !current.as_os_str().is_empty() {
        input = input.default(current.to_string_lossy().to_string());
    }
    let value = input.interact_text()?;
    Ok(PathBuf::from(value.trim()))
}

pub fn configure_data_paths(config: &mut AppConfig) -> Result<()> {
    println!("\n{}", style("=== Data to back up ===").cyan().bold());

    let database_file = prompt_path("Database file", &config.data.database_file)?;
    let id_file = prompt_path("Next-id file", &config.data.id_file)?;
    let notes_dir = prompt_path("Notes directory", &config.data.notes_dir)?;

    for (label, path, is_dir) in [
        ("Database file", &database_file, false),
        ("Next-id file", &id_file, false),
        ("Notes directory", &notes_dir, true),
    ] {
        let ok = if is_dir { path.is_dir() } else { path.is_file() };
        if !ok {
            println!(
                "{}",
                style(format!("⚠ {} {} does not exist yet", label, path.display())).yellow()
            );
        }
    }

    config.data.database_file = database_file;
    config.data.id_file = id_file;
    config.data.notes_dir = notes_dir;
    println!("{}", style("Data paths updated.").green());
    Ok(())
}

pub fn configure_drive_folder(config: &mut AppConfig) -> Result<()> {
    println!("\n{}", style("=== Drive Folder ===").cyan().bold());

    let folder_name: String = Input::new()
        .with_prompt("Folder name on Google Drive (created if it doesn't exist)")
        .default(config.drive.folder_name.clone())
        .interact_text()?;

    config.drive.folder_name = folder_name.trim().to_string();
    println!(
        "{}",
        style(format!("Backups will go to '{}'.", config.drive.folder_name)).green()
    );
    Ok(())
}

pub fn configure_auth(config: &mut AppConfig) -> Result<()> {
    println!("\n{}", style("=== Google Authorization ===").cyan().bold());

    config.auth.client_secret_file =
        prompt_path("OAuth client secret JSON", &config.auth.client_secret_file)?;
    config.auth.token_file = prompt_path("Where to store the refresh token", &config.auth.token_file)?;

    let interactive = Select::new()
        .with_prompt("Allow browser sign-in when no token is stored?")
        .items(&["Yes", "No"])
        .default(if config.auth.interactive { 0 } else { 1 })
        .interact()?;
    config.auth.interactive = interactive == 0;

    println!("{}", style("Authorization settings updated.").green());
    Ok(())
}

pub fn configure_schedule() -> Result<Schedule> {
    println!("\n{}", style("=== Backup Schedule ===").cyan().bold());

    let schedule_types = vec!["Every N minutes", "Every N hours", "Every N days"];
    let type_idx = Select::new()
        .with_prompt("Schedule type")
        .items(&schedule_types)
        .default(2)
        .interact()?;

    let value: u32 = Input::new()
        .with_prompt("Interval value")
        .default(1u32)
        .interact_text()?;

    let schedule = match type_idx {
        0 => Schedule::Minutes(value),
        1 => Schedule::Hours(value),
        _ => Schedule::Days(value),
    };

    println!("{}", style(format!("Schedule: {}", schedule)).green());
    Ok(schedule)
}

pub fn configure_work_dir(config: &mut AppConfig) -> Result<()> {
    println!("\n{}", style("=== Working Directory ===").cyan().bold());

    config.work_dir = prompt_path("Directory for temporary archives", &config.work_dir)?;
    println!(
        "{}",
        style(format!("Working directory set to: {}", config.work_dir.display())).green()
    );
    Ok(())
}

pub async fn run_initial_setup(config: &mut AppConfig) -> Result<()> {
    println!("\n{}", style("╔════════════════════════════════════════╗").cyan());
    println!("{}", style("║        Notes Backup - Setup            ║").cyan());
    println!("{}", style("╚════════════════════════════════════════╝").cyan());

    println!("\nWelcome! Let's configure your backup settings.\n");
    configure_data_paths(config)?;
    configure_drive_folder(config)?;
    configure_auth(config)?;

    let setup_schedule = Select::new()
        .with_prompt("Would you like to configure a backup schedule?")
        .items(&["Yes", "No"])
        .default(1)
        .interact()?;
    if setup_schedule == 0 {
        config.schedule = Some(configure_schedule()?);
    }

    let connect = Select::new()
        .with_prompt("Sign in to Google Drive now?")
        .items(&["Yes", "No"])
        .default(0)
        .interact()?;
    if connect == 0 {
        println!("\n{}", style("Testing Drive connection...").yellow());
        let folder_id = BackupEngine::from_config(config)?.test_connection().await?;
        println!("{}", style(format!("✓ Drive folder ready ({})", folder_id)).green());
    }

    println!("\n{}", style("Setup complete!").green().bold());
    Ok(())
}
