use crate::analyzer::progress;
use crate::model::{
    CompletionStatus, CourseEnrollment, EnrollmentListing, ProgressRecord, UNKNOWN, UserInfo,
};
use crate::render;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_TITLE: &str = "Learning Progress Report";
pub const REPORT_FILENAME: &str = "learning-progress-report.pdf";
pub const RECENT_ACTIVITY_LIMIT: usize = 5;
const FOOTER_TEXT: &str = "Little Learners - English for Kids";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub activities_completed: usize,
    pub courses_enrolled: usize,
    /// Enrollments whose backend score reached 100.
    pub courses_completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRow {
    pub course_id: String,
    pub title: String,
    pub completion_percent: u8,
    pub status: CompletionStatus,
    pub enrollment_score_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub activity_title: String,
    pub course_title: String,
    pub status: CompletionStatus,
    pub score: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub user: UserInfo,
    pub summary: SummaryCounts,
    pub courses: Vec<CourseRow>,
    pub recent_activity: Vec<RecentActivity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBlock {
    pub heading: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub empty_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Section {
    Title { text: String, subtitle: String },
    Fields { heading: String, fields: Vec<(String, String)> },
    Table(TableBlock),
}

/// Layout-independent description of one export; discarded after rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub title: String,
    pub filename: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<Section>,
    pub footer: String,
}

#[derive(Debug)]
pub struct SavedReport {
    pub pdf_path: PathBuf,
    pub json_path: PathBuf,
}

pub fn build(
    user: &UserInfo,
    enrollments: &[CourseEnrollment],
    records: &[ProgressRecord],
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    document_for(&build_progress_report(
        user,
        enrollments,
        records,
        generated_at,
    ))
}

pub fn build_progress_report(
    user: &UserInfo,
    enrollments: &[CourseEnrollment],
    records: &[ProgressRecord],
    generated_at: DateTime<Utc>,
) -> ProgressReport {
    let summary = SummaryCounts {
        activities_completed: records.iter().filter(|record| record.completed).count(),
        courses_enrolled: enrollments.len(),
        courses_completed: enrollments
            .iter()
            .filter(|enrollment| enrollment.enrollment_score_complete())
            .count(),
    };

    let courses = enrollments
        .iter()
        .map(|enrollment| {
            let course = progress::summarize_enrollment(enrollment, records);
            CourseRow {
                course_id: enrollment.course_id.clone(),
                title: course.course_title,
                completion_percent: course.completion_percent,
                status: course.status,
                enrollment_score_complete: enrollment.enrollment_score_complete(),
            }
        })
        .collect::<Vec<_>>();

    ProgressReport {
        title: REPORT_TITLE.to_string(),
        generated_at,
        user: user.clone(),
        summary,
        courses,
        recent_activity: recent_activity(records, RECENT_ACTIVITY_LIMIT),
    }
}

/// Most recently updated records first; ties keep fetch order.
pub fn recent_activity(records: &[ProgressRecord], limit: usize) -> Vec<RecentActivity> {
    let mut ordered = records.iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));

    ordered
        .into_iter()
        .take(limit)
        .map(|record| RecentActivity {
            activity_title: non_empty_or_unknown(&record.activity_title),
            course_title: non_empty_or_unknown(&record.course_title),
            status: if record.completed {
                CompletionStatus::Completed
            } else {
                CompletionStatus::InProgress
            },
            score: record.score,
            updated_at: record.updated_at,
        })
        .collect()
}

pub fn document_for(report: &ProgressReport) -> ReportDocument {
    let course_rows = report
        .courses
        .iter()
        .map(|course| {
            vec![
                course.title.clone(),
                format!("{}%", course.completion_percent),
                course.status.label().to_string(),
            ]
        })
        .collect::<Vec<_>>();

    let activity_rows = report
        .recent_activity
        .iter()
        .map(|activity| {
            vec![
                activity.activity_title.clone(),
                activity.status.label().to_string(),
                format_score(activity.score),
                format_date(activity.updated_at),
            ]
        })
        .collect::<Vec<_>>();

    ReportDocument {
        title: report.title.clone(),
        filename: REPORT_FILENAME.to_string(),
        generated_at: report.generated_at,
        sections: vec![
            Section::Title {
                text: report.title.clone(),
                subtitle: generated_line(report.generated_at),
            },
            Section::Fields {
                heading: "Student Information".to_string(),
                fields: vec![
                    ("Name".to_string(), report.user.name.clone()),
                    ("Email".to_string(), report.user.email.clone()),
                    (
                        "Learning Streak".to_string(),
                        format!("{} days", report.user.learning_streak),
                    ),
                ],
            },
            Section::Fields {
                heading: "Summary".to_string(),
                fields: vec![
                    (
                        "Activities Completed".to_string(),
                        report.summary.activities_completed.to_string(),
                    ),
                    (
                        "Courses Enrolled".to_string(),
                        report.summary.courses_enrolled.to_string(),
                    ),
                    (
                        "Courses Completed".to_string(),
                        report.summary.courses_completed.to_string(),
                    ),
                ],
            },
            Section::Table(TableBlock {
                heading: Some("Course Progress".to_string()),
                columns: columns(&["Course", "Progress", "Status"]),
                rows: course_rows,
                empty_message: "No courses enrolled yet".to_string(),
            }),
            Section::Table(TableBlock {
                heading: Some("Recent Activity".to_string()),
                columns: columns(&["Activity", "Status", "Score", "Date"]),
                rows: activity_rows,
                empty_message: "No activity recorded yet".to_string(),
            }),
        ],
        footer: FOOTER_TEXT.to_string(),
    }
}

/// Generic "export this table" document; the filename is the slugified title.
pub fn table_document(
    title: &str,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    ReportDocument {
        title: title.to_string(),
        filename: render::pdf_filename(title),
        generated_at,
        sections: vec![
            Section::Title {
                text: title.to_string(),
                subtitle: generated_line(generated_at),
            },
            Section::Table(TableBlock {
                heading: None,
                columns,
                rows,
                empty_message: "No data".to_string(),
            }),
        ],
        footer: FOOTER_TEXT.to_string(),
    }
}

pub fn enrollment_listing_document(
    title: &str,
    listings: &[EnrollmentListing],
    generated_at: DateTime<Utc>,
) -> ReportDocument {
    let rows = listings
        .iter()
        .map(|listing| {
            vec![
                listing.student_name.clone(),
                listing.student_email.clone(),
                listing.course_title.clone(),
                format!("{:.0}%", listing.progress_percent.clamp(0.0, 100.0)),
                format_score(Some(listing.score)),
                format_date(listing.enrolled_at),
            ]
        })
        .collect::<Vec<_>>();

    table_document(
        title,
        columns(&["Student", "Email", "Course", "Progress", "Score", "Enrolled"]),
        rows,
        generated_at,
    )
}

pub fn save_report_files(
    report: &ProgressReport,
    pdf: &[u8],
    report_dir: &Path,
) -> Result<SavedReport> {
    fs::create_dir_all(report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            report_dir.display()
        )
    })?;

    let stem = report.generated_at.format("%Y-%m-%d-%H%M%S").to_string();
    let pdf_path = report_dir.join(format!("{stem}-{REPORT_FILENAME}"));
    let json_path = report_dir.join(format!("{stem}-learning-progress-report.json"));

    fs::write(&pdf_path, pdf)
        .with_context(|| format!("Failed to write PDF report: {}", pdf_path.display()))?;

    let json_content =
        serde_json::to_string_pretty(report).context("Failed to serialize report JSON")?;
    fs::write(&json_path, json_content)
        .with_context(|| format!("Failed to write JSON report: {}", json_path.display()))?;

    Ok(SavedReport {
        pdf_path,
        json_path,
    })
}

pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) if value.is_finite() => {
            if value.fract() == 0.0 {
                format!("{value:.0}")
            } else {
                format!("{value:.1}")
            }
        }
        _ => "N/A".to_string(),
    }
}

pub fn format_date(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|value| value.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn generated_line(generated_at: DateTime<Utc>) -> String {
    format!(
        "Generated on {}",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    )
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn non_empty_or_unknown(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    fn record(activity: &str, course_id: &str, completed: bool, hours_ago: i64) -> ProgressRecord {
        ProgressRecord {
            activity_id: activity.to_lowercase(),
            activity_title: activity.to_string(),
            course_id: course_id.to_string(),
            course_title: format!("Course {course_id}"),
            completed,
            score: completed.then_some(90.0),
            time_spent_minutes: Some(12.0),
            updated_at: Some(base_time() - Duration::hours(hours_ago)),
        }
    }

    fn enrollment(course_id: &str, score: f64) -> CourseEnrollment {
        CourseEnrollment {
            course_id: course_id.to_string(),
            title: format!("Course {course_id}"),
            level: "beginner".to_string(),
            score,
            progress_percent: 0.0,
            enrolled_at: Some(base_time() - Duration::days(30)),
            updated_at: Some(base_time()),
        }
    }

    fn user() -> UserInfo {
        UserInfo {
            name: "Mina Park".to_string(),
            email: "mina@example.com".to_string(),
            learning_streak: 4,
        }
    }

    #[test]
    fn summary_counts_keep_score_based_completion() {
        let enrollments = vec![enrollment("c1", 100.0), enrollment("c2", 40.0)];
        let records = vec![
            record("Colors", "c1", true, 1),
            record("Numbers", "c2", true, 2),
            record("Shapes", "c2", true, 3),
        ];

        let report = build_progress_report(&user(), &enrollments, &records, base_time());

        assert_eq!(report.summary.activities_completed, 3);
        assert_eq!(report.summary.courses_enrolled, 2);
        assert_eq!(report.summary.courses_completed, 1);
        // c2 has every activity done but its enrollment score is not 100.
        assert_eq!(report.courses[1].status, CompletionStatus::Completed);
        assert!(!report.courses[1].enrollment_score_complete);
    }

    #[test]
    fn course_rows_follow_enrollment_order() {
        let enrollments = vec![
            enrollment("c3", 0.0),
            enrollment("c1", 0.0),
            enrollment("c2", 0.0),
        ];
        let records = vec![record("Colors", "c1", true, 1)];

        let first = build(&user(), &enrollments, &records, base_time());
        let second = build(&user(), &enrollments, &records, base_time());
        assert_eq!(first, second);

        let Section::Table(table) = &first.sections[3] else {
            panic!("expected course table");
        };
        let titles = table
            .rows
            .iter()
            .map(|row| row[0].as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["Course c3", "Course c1", "Course c2"]);
        assert_eq!(table.rows[0][1], "0%");
        assert_eq!(table.rows[1][2], "Completed");
    }

    #[test]
    fn recent_activity_is_capped_and_sorted_descending() {
        let records = (0..8)
            .map(|index| record(&format!("Activity {index}"), "c1", index % 2 == 0, index))
            .collect::<Vec<_>>();

        let recent = recent_activity(&records, RECENT_ACTIVITY_LIMIT);

        assert_eq!(recent.len(), 5);
        assert!(
            recent
                .windows(2)
                .all(|pair| pair[0].updated_at >= pair[1].updated_at)
        );
        assert_eq!(recent[0].activity_title, "Activity 0");
    }

    #[test]
    fn recent_activity_ties_keep_fetch_order() {
        let records = vec![
            record("First", "c1", true, 5),
            record("Second", "c1", false, 5),
            record("Newest", "c1", false, 0),
        ];

        let recent = recent_activity(&records, RECENT_ACTIVITY_LIMIT);
        let titles = recent
            .iter()
            .map(|activity| activity.activity_title.as_str())
            .collect::<Vec<_>>();

        assert_eq!(titles, vec!["Newest", "First", "Second"]);
    }

    #[test]
    fn document_sections_are_in_fixed_order() {
        let document = build(&user(), &[], &[], base_time());

        assert_eq!(document.filename, REPORT_FILENAME);
        assert!(matches!(document.sections[0], Section::Title { .. }));
        assert!(
            matches!(&document.sections[1], Section::Fields { heading, .. } if heading == "Student Information")
        );
        assert!(
            matches!(&document.sections[2], Section::Fields { heading, .. } if heading == "Summary")
        );
        assert!(matches!(document.sections[3], Section::Table(_)));
        assert!(matches!(document.sections[4], Section::Table(_)));
    }

    #[test]
    fn missing_score_and_date_fall_back() {
        assert_eq!(format_score(None), "N/A");
        assert_eq!(format_score(Some(85.0)), "85");
        assert_eq!(format_score(Some(72.5)), "72.5");
        assert_eq!(format_date(None), UNKNOWN);
        assert_eq!(format_date(Some(base_time())), "2026-03-02");
    }

    #[test]
    fn table_document_uses_slugified_filename() {
        let document = table_document(
            "Course Enrollments  Spring",
            columns(&["Student"]),
            vec![vec!["Mina".to_string()]],
            base_time(),
        );

        assert_eq!(document.filename, "course-enrollments-spring.pdf");
    }

    #[test]
    fn saves_pdf_and_json_side_by_side() {
        let dir = tempfile::tempdir().expect("temp dir");
        let report = build_progress_report(&user(), &[], &[], base_time());

        let saved = save_report_files(&report, b"%PDF-1.4", dir.path()).expect("saved");

        assert!(saved.pdf_path.ends_with("2026-03-02-093000-learning-progress-report.pdf"));
        let json = fs::read_to_string(&saved.json_path).expect("json written");
        let parsed: ProgressReport = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed, report);
    }
}
