use crate::config::{Config, default_report_dir, expand_home};
use crate::db::Database;
use anyhow::{Context, Result};
use dialoguer::{Input, Password, theme::ColorfulTheme};
use url::Url;

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to Little Learners report setup.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::default();

    println!("\n[1/4] Backend REST endpoint");
    let backend_url: String = Input::with_theme(&theme)
        .with_prompt("  REST base URL")
        .default(defaults.backend_url.clone())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            Url::parse(input.trim())
                .map(|_| ())
                .map_err(|_| "Enter an absolute URL (example: https://xyz.supabase.co/rest/v1)")
        })
        .interact_text()
        .context("Failed to read backend URL")?;
    println!("  ✓ {}", backend_url.trim());

    println!("\n[2/4] Backend API key");
    println!("  Leave empty to use the LITTLELEARNERS_BACKEND_KEY environment variable.");
    let api_key = Password::with_theme(&theme)
        .with_prompt("  API key")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;
    if api_key.trim().is_empty() {
        println!("  ! No key stored");
    } else {
        println!("  ✓ Key stored (masked)");
    }

    println!("\n[3/4] Report output directory");
    let report_dir_input: String = Input::with_theme(&theme)
        .with_prompt("  Folder where reports will be saved")
        .default(default_report_dir().display().to_string())
        .interact_text()
        .context("Failed to read report directory")?;
    let report_dir = expand_home(&report_dir_input);
    println!("  ✓ {}", report_dir.display());

    println!("\n[4/4] Default student");
    let default_user: String = Input::with_theme(&theme)
        .with_prompt("  User id used when --user is omitted (optional)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read default user id")?;

    let mut config = Config {
        report_dir,
        ..defaults
    };
    config.set_value("backend_url", &backend_url)?;
    config.set_value("backend_api_key", &api_key)?;
    config.set_value("default_user_id", &default_user)?;

    config.ensure_bootstrap_files()?;
    config.save()?;
    let _ = Database::open(&config.db_path)?;

    println!("\n──────────────────────────────────────────");
    println!("  Setup complete!");
    println!("  Run `littlelearners doctor` to check the backend connection.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
