pub mod onboard;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "littlelearners",
    about = "Course progress summaries and PDF report exports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    /// Print per-course completion for one user.
    Summary {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        course: Option<String>,
    },
    /// Generate the learning progress report PDF (and its JSON).
    Report {
        #[arg(long)]
        user: Option<String>,
    },
    /// Export every enrollment as a table PDF.
    Enrollments {
        #[arg(long, default_value = "Enrollments")]
        title: String,
    },
    /// Rasterize one container of a captured surface into a single-page PDF.
    Capture {
        #[arg(long)]
        surface: PathBuf,
        #[arg(long)]
        root: String,
        #[arg(long)]
        title: String,
    },
    Serve,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
