mod analyzer;
mod api;
mod backend;
mod cli;
mod config;
mod db;
mod export;
mod model;
mod render;

use crate::analyzer::report::ProgressReport;
use crate::backend::Backend;
use crate::cli::onboard::run_onboarding;
use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use crate::export::{ExportArtifact, ExportControl, ExportOutcome};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Summary { user, course } => handle_summary(user, course),
        Commands::Report { user } => handle_report(user),
        Commands::Enrollments { title } => handle_enrollments(&title),
        Commands::Capture {
            surface,
            root,
            title,
        } => handle_capture(&surface, &root, &title),
        Commands::Serve => {
            let config = load_config()?;
            run_service(config).await
        }
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let backend_mode = if config.snapshot_path.is_some() {
        "snapshot"
    } else {
        "rest"
    };

    println!("Little Learners status");
    println!("- backend: {backend_mode}");
    println!("- backend_url: {}", config.backend_url);
    println!(
        "- backend_api_key: {}",
        if config.resolve_api_key().is_some() {
            "set"
        } else {
            "not_set"
        }
    );
    println!("- report_dir: {}", config.report_dir.display());
    println!(
        "- default_user_id: {}",
        config.default_user_id.as_deref().unwrap_or("not_set")
    );
    println!(
        "- latest_export: {}",
        database
            .latest_export()?
            .map(|row| format!("{} {} ({})", row.kind, row.subject, row.pdf_path))
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] export ledger reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] export ledger check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.report_dir.exists() {
        println!("[OK] report dir exists: {}", config.report_dir.display());
    } else {
        println!("[WARN] report dir missing: {}", config.report_dir.display());
        issues.push("report dir missing".to_string());
    }

    if config.snapshot_path.is_none() && config.resolve_api_key().is_none() {
        println!("[WARN] backend API key is missing");
        issues.push("backend api key missing".to_string());
    }

    match backend::connect(&config).and_then(|backend| {
        let name = backend.describe();
        backend.profile("healthcheck").map(|_| name)
    }) {
        Ok(name) => println!("[OK] backend reachable: {name}"),
        Err(error) => {
            println!("[WARN] backend check failed: {error:#}");
            issues.push("backend unreachable".to_string());
        }
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_summary(user: Option<String>, course: Option<String>) -> Result<()> {
    let config = load_config()?;
    let user_id = config.resolve_user_id(user)?;
    let backend = backend::connect(&config)?;

    let summaries = match course {
        Some(course_id) => vec![analyzer::course_summary(
            backend.as_ref(),
            &user_id,
            &course_id,
        )?],
        None => analyzer::course_summaries(backend.as_ref(), &user_id)?,
    };

    if summaries.is_empty() {
        println!("No courses enrolled yet");
        return Ok(());
    }

    summaries.iter().for_each(|summary| {
        let marker = if summary.all_activities_complete() { "✓" } else { " " };
        println!(
            "{marker} {}: {}% ({})",
            summary.course_title,
            summary.completion_percent,
            summary.status.label()
        );
    });

    Ok(())
}

fn handle_report(user: Option<String>) -> Result<()> {
    let config = load_config()?;
    let user_id = config.resolve_user_id(user)?;
    let backend = backend::connect(&config)?;
    let control = ExportControl::new();
    let mut built: Option<ProgressReport> = None;

    let outcome = control.run_blocking("progress_report", || {
        let report = analyzer::progress_report(backend.as_ref(), &user_id)?;
        let artifact = analyzer::render_progress_report(&report)?;
        built = Some(report);
        Ok(artifact)
    });

    let artifact = completed_artifact(outcome)?;
    let report = built.context("Report export finished without a report")?;
    let saved = analyzer::store_progress_report(&config, &user_id, &report, &artifact)?;

    println!("Report generated for {}", report.user.name);
    println!("- PDF: {}", saved.pdf_path.display());
    println!("- JSON: {}", saved.json_path.display());

    Ok(())
}

fn handle_enrollments(title: &str) -> Result<()> {
    let config = load_config()?;
    let backend = backend::connect(&config)?;
    let control = ExportControl::new();

    let outcome = control.run_blocking("enrollment_listing", || {
        analyzer::export_enrollment_listing(backend.as_ref(), title)
    });

    let artifact = completed_artifact(outcome)?;
    let path = analyzer::store_artifact(&config, db::KIND_ENROLLMENT_LISTING, title, &artifact)?;

    println!("Enrollment listing exported: {}", path.display());
    Ok(())
}

fn handle_capture(surface: &Path, root: &str, title: &str) -> Result<()> {
    let config = load_or_default_config()?;
    let control = ExportControl::new();

    let outcome = control.run_blocking("capture", || {
        analyzer::export_capture(surface, root, title)
    });

    let artifact = completed_artifact(outcome)?;
    let path = analyzer::store_artifact(&config, db::KIND_CAPTURE, title, &artifact)?;

    println!("Capture exported: {}", path.display());
    Ok(())
}

fn completed_artifact(outcome: ExportOutcome) -> Result<ExportArtifact> {
    match outcome {
        ExportOutcome::Completed(artifact) => Ok(artifact),
        ExportOutcome::Failed { message } => bail!(message),
        ExportOutcome::Busy => bail!("An export is already in progress"),
    }
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let backend: Arc<dyn Backend> = Arc::from(backend::connect(&config)?);
    let shared_config = Arc::new(config);

    info!("Little Learners service started");

    tokio::select! {
        api_result = api::run_server(shared_config, backend) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load()
        .with_context(|| "Config file not found. Run `littlelearners onboard` first.".to_string())
}
