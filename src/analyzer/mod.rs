pub mod progress;
pub mod report;

use crate::analyzer::report::{ProgressReport, ReportDocument, SavedReport};
use crate::backend::{self, Backend};
use crate::config::Config;
use crate::db::{self, Database};
use crate::export::ExportArtifact;
use crate::model::{CourseEnrollment, CourseSummary, EnrollmentListing, ProgressRecord, UserInfo};
use crate::render::{self, capture};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_LISTING_TITLE: &str = "Enrollments";

/// Everything one report invocation reads from the backend.
#[derive(Debug, Clone)]
pub struct ReportInputs {
    pub user: UserInfo,
    pub enrollments: Vec<CourseEnrollment>,
    pub records: Vec<ProgressRecord>,
}

pub fn load_inputs(backend: &dyn Backend, user_id: &str) -> Result<ReportInputs> {
    backend::ensure_user_id(user_id)?;

    let profile = backend
        .profile(user_id)
        .with_context(|| format!("Failed to load profile for user {user_id}"))?;
    let enrollments = backend
        .enrollments(user_id)
        .with_context(|| format!("Failed to load enrollments for user {user_id}"))?;
    let records = backend
        .progress(user_id)
        .with_context(|| format!("Failed to load progress for user {user_id}"))?;

    Ok(ReportInputs {
        user: backend::user_info(profile),
        enrollments: backend::unique_enrollments(enrollments),
        records: records.into_iter().map(ProgressRecord::from).collect(),
    })
}

pub fn course_summaries(backend: &dyn Backend, user_id: &str) -> Result<Vec<CourseSummary>> {
    let inputs = load_inputs(backend, user_id)?;
    Ok(progress::summarize_all(&inputs.enrollments, &inputs.records))
}

pub fn course_summary(
    backend: &dyn Backend,
    user_id: &str,
    course_id: &str,
) -> Result<CourseSummary> {
    let inputs = load_inputs(backend, user_id)?;

    Ok(inputs
        .enrollments
        .iter()
        .find(|enrollment| enrollment.course_id == course_id)
        .map(|enrollment| progress::summarize_enrollment(enrollment, &inputs.records))
        .unwrap_or_else(|| progress::summarize(course_id, &inputs.records)))
}

pub fn progress_report(backend: &dyn Backend, user_id: &str) -> Result<ProgressReport> {
    let inputs = load_inputs(backend, user_id)?;

    Ok(report::build_progress_report(
        &inputs.user,
        &inputs.enrollments,
        &inputs.records,
        Utc::now(),
    ))
}

pub fn export_progress_report(backend: &dyn Backend, user_id: &str) -> Result<ExportArtifact> {
    let inputs = load_inputs(backend, user_id)?;
    let document = report::build(&inputs.user, &inputs.enrollments, &inputs.records, Utc::now());

    render_document(&document)
}

/// Renders an already-built report, for callers that also keep its JSON.
pub fn render_progress_report(report: &ProgressReport) -> Result<ExportArtifact> {
    render_document(&report::document_for(report))
}

fn render_document(document: &ReportDocument) -> Result<ExportArtifact> {
    Ok(ExportArtifact {
        filename: document.filename.clone(),
        bytes: render::render(document)?,
    })
}

pub fn export_enrollment_listing(backend: &dyn Backend, title: &str) -> Result<ExportArtifact> {
    let listings = backend
        .all_enrollments()
        .context("Failed to load enrollments")?
        .into_iter()
        .map(EnrollmentListing::from)
        .collect::<Vec<_>>();

    render_document(&report::enrollment_listing_document(
        title,
        &listings,
        Utc::now(),
    ))
}

pub fn export_capture(surface_path: &Path, root_id: &str, title: &str) -> Result<ExportArtifact> {
    let surface = capture::SurfaceNode::load(surface_path)?;
    let bytes =
        capture::render_from_element(&surface, root_id, &capture::CaptureOptions::default())?;

    Ok(ExportArtifact {
        filename: render::pdf_filename(title),
        bytes,
    })
}

/// Saves the PDF and its JSON twin, then records both in the export ledger.
pub fn store_progress_report(
    config: &Config,
    user_id: &str,
    report: &ProgressReport,
    artifact: &ExportArtifact,
) -> Result<SavedReport> {
    let saved = report::save_report_files(report, &artifact.bytes, &config.report_dir)?;

    let database = Database::open(&config.db_path)?;
    database.record_export(
        db::KIND_PROGRESS_REPORT,
        user_id,
        report.generated_at.timestamp(),
        &saved.pdf_path.display().to_string(),
        Some(&saved.json_path.display().to_string()),
    )?;

    info!(user_id, pdf = %saved.pdf_path.display(), "progress report saved");

    Ok(saved)
}

/// Writes an artifact into the report directory and records it in the ledger.
pub fn store_artifact(
    config: &Config,
    kind: &str,
    subject: &str,
    artifact: &ExportArtifact,
) -> Result<PathBuf> {
    fs::create_dir_all(&config.report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            config.report_dir.display()
        )
    })?;

    let generated_at = Utc::now();
    let path = config.report_dir.join(format!(
        "{}-{}",
        generated_at.format("%Y-%m-%d-%H%M%S"),
        artifact.filename
    ));
    fs::write(&path, &artifact.bytes)
        .with_context(|| format!("Failed to write PDF: {}", path.display()))?;

    let database = Database::open(&config.db_path)?;
    database.record_export(
        kind,
        subject,
        generated_at.timestamp(),
        &path.display().to_string(),
        None,
    )?;

    info!(kind, subject, pdf = %path.display(), "export saved");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::snapshot::{Snapshot, SnapshotBackend};
    use crate::model::CompletionStatus;
    use serde_json::json;

    fn sample_backend() -> SnapshotBackend {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "profiles": [
                { "id": "u1", "full_name": "Mia", "email": "mia@example.com", "learning_streak": 4 }
            ],
            "enrollments": [
                {
                    "user_id": "u1", "course_id": "c1", "score": 100, "progress": 100,
                    "created_at": "2026-01-05T10:00:00Z",
                    "courses": { "title": "Animals", "level": "beginner" },
                    "profiles": { "full_name": "Mia", "email": "mia@example.com" }
                },
                {
                    "user_id": "u1", "course_id": "c2", "score": 40, "progress": 50,
                    "courses": { "title": "Colors", "level": "beginner" }
                }
            ],
            "progress": [
                {
                    "user_id": "u1", "course_id": "c1", "activity_id": "a1", "completed": true,
                    "score": 90, "updated_at": "2026-02-01T09:00:00Z",
                    "activities": { "title": "Farm Animals" }, "courses": { "title": "Animals" }
                },
                {
                    "user_id": "u1", "course_id": "c2", "activity_id": "a2", "completed": true,
                    "updated_at": "2026-02-03T09:00:00Z",
                    "activities": { "title": "Red and Blue" }, "courses": { "title": "Colors" }
                },
                {
                    "user_id": "u1", "course_id": "c2", "activity_id": "a3", "completed": false,
                    "updated_at": "2026-02-02T09:00:00Z",
                    "activities": { "title": "Rainbow" }, "courses": { "title": "Colors" }
                }
            ]
        }))
        .expect("snapshot parsed");

        SnapshotBackend::from_snapshot(snapshot)
    }

    #[test]
    fn summaries_follow_enrollment_order() {
        let summaries = course_summaries(&sample_backend(), "u1").expect("summaries");

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].course_title, "Animals");
        assert_eq!(summaries[0].status, CompletionStatus::Completed);
        assert_eq!(summaries[1].completion_percent, 50);
        assert_eq!(summaries[1].status, CompletionStatus::InProgress);
    }

    #[test]
    fn unknown_course_summary_is_zero() {
        let summary = course_summary(&sample_backend(), "u1", "c9").expect("summary");

        assert_eq!(summary.completion_percent, 0);
        assert_eq!(summary.status, CompletionStatus::InProgress);
    }

    #[test]
    fn report_export_uses_fixed_filename() {
        let artifact = export_progress_report(&sample_backend(), "u1").expect("export");

        assert_eq!(artifact.filename, report::REPORT_FILENAME);
        assert!(artifact.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn report_counts_and_recent_activity() {
        let report = progress_report(&sample_backend(), "u1").expect("report");

        assert_eq!(report.summary.courses_completed, 1);
        assert_eq!(report.summary.activities_completed, 2);
        assert_eq!(report.recent_activity[0].activity_title, "Red and Blue");
    }

    #[test]
    fn invalid_user_id_is_rejected_before_reading() {
        assert!(load_inputs(&sample_backend(), "u1&select=*").is_err());
    }

    #[test]
    fn listing_export_is_named_after_title() {
        let artifact =
            export_enrollment_listing(&sample_backend(), "All Enrollments").expect("export");

        assert_eq!(artifact.filename, "all-enrollments.pdf");
    }

    #[test]
    fn stored_report_is_recorded_in_ledger() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            report_dir: dir.path().join("reports"),
            db_path: dir.path().join("exports.db"),
            ..Config::default()
        };

        let report = progress_report(&sample_backend(), "u1").expect("report");
        let artifact = render_progress_report(&report).expect("rendered");
        let saved =
            store_progress_report(&config, "u1", &report, &artifact).expect("report stored");

        assert!(saved.pdf_path.exists());
        assert!(saved.json_path.exists());

        let latest = Database::open(&config.db_path)
            .expect("db opened")
            .latest_export()
            .expect("latest")
            .expect("row present");
        assert_eq!(latest.kind, db::KIND_PROGRESS_REPORT);
        assert_eq!(latest.subject, "u1");
    }

    #[test]
    fn stored_artifact_lands_in_report_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            report_dir: dir.path().join("reports"),
            db_path: dir.path().join("exports.db"),
            ..Config::default()
        };
        let artifact = ExportArtifact {
            filename: "enrollments.pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        };

        let path = store_artifact(&config, db::KIND_ENROLLMENT_LISTING, "all", &artifact)
            .expect("artifact stored");

        assert!(path.starts_with(&config.report_dir));
        assert!(path.to_string_lossy().ends_with("-enrollments.pdf"));
        assert_eq!(fs::read(&path).expect("pdf read"), artifact.bytes);
    }
}
