pub mod capture;
pub mod layout;
pub mod pdf;

use crate::analyzer::report::{ReportDocument, Section};
use crate::render::layout::Layout;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\p{Cc}"]"#).expect("unsafe character pattern is valid"));

/// Lays the document out on A4 pages and serializes it to PDF bytes.
pub fn render(document: &ReportDocument) -> Result<Vec<u8>> {
    let mut layout = Layout::a4();

    for section in &document.sections {
        match section {
            Section::Title { text, subtitle } => layout.title(text, subtitle),
            Section::Fields { heading, fields } => {
                layout.heading(heading);
                layout.fields(fields);
            }
            Section::Table(table) => {
                if let Some(heading) = &table.heading {
                    layout.heading(heading);
                }
                layout.table(table);
            }
        }
    }

    layout.stamp_footer(&document.footer);
    debug!(filename = %document.filename, pages = layout.page_count(), "report laid out");

    pdf::write_document(&document.title, layout.into_pages())
        .with_context(|| format!("Failed to render PDF: {}", document.filename))
}

/// Lowercases, joins whitespace runs with `-` and drops control characters and quotes.
pub fn slugify(title: &str) -> String {
    let joined = WHITESPACE.replace_all(title.trim(), "-");
    UNSAFE_CHARS.replace_all(&joined, "").to_lowercase()
}

pub fn pdf_filename(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        "export.pdf".to_string()
    } else {
        format!("{slug}.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::report;
    use crate::model::{CourseEnrollment, ProgressRecord, UserInfo};
    use chrono::{TimeZone, Utc};

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Student Progress"), "student-progress");
        assert_eq!(slugify("  All   Users\tList "), "all-users-list");
        assert_eq!(pdf_filename("Course Enrollments"), "course-enrollments.pdf");
        assert_eq!(pdf_filename("   "), "export.pdf");
    }

    #[test]
    fn slugify_drops_control_characters_and_quotes() {
        assert_eq!(slugify("Spring \"Term\"\u{1}"), "spring-term");
        assert_eq!(slugify("Bell\u{7}\u{7f}Report"), "bellreport");
        assert_eq!(pdf_filename("\"\u{1}\""), "export.pdf");
    }

    #[test]
    fn renders_progress_report_to_pdf() {
        let generated_at = Utc
            .with_ymd_and_hms(2026, 3, 2, 9, 30, 0)
            .single()
            .expect("valid timestamp");
        let user = UserInfo {
            name: "Mina Park".to_string(),
            email: "mina@example.com".to_string(),
            learning_streak: 3,
        };
        let enrollments = vec![CourseEnrollment {
            course_id: "c1".to_string(),
            title: "Fun with Phonics".to_string(),
            level: "beginner".to_string(),
            score: 100.0,
            progress_percent: 100.0,
            enrolled_at: None,
            updated_at: None,
        }];
        let records = vec![ProgressRecord {
            activity_id: "a1".to_string(),
            activity_title: "Letter Sounds".to_string(),
            course_id: "c1".to_string(),
            course_title: "Fun with Phonics".to_string(),
            completed: true,
            score: Some(95.0),
            time_spent_minutes: Some(8.0),
            updated_at: Some(generated_at),
        }];

        let document = report::build(&user, &enrollments, &records, generated_at);
        let bytes = render(&document).expect("rendered");
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("(Learning Progress Report) Tj"));
        assert!(text.contains("(Fun with Phonics) Tj"));
        assert!(text.contains("(100%) Tj"));
        assert!(text.contains("(Letter Sounds) Tj"));
        assert!(text.contains("Page 1 of 1"));
    }

    #[test]
    fn rendering_is_deterministic_for_same_document() {
        let generated_at = Utc
            .with_ymd_and_hms(2026, 1, 5, 0, 0, 0)
            .single()
            .expect("valid timestamp");
        let document = report::build(&UserInfo::default(), &[], &[], generated_at);

        assert_eq!(
            render(&document).expect("first render"),
            render(&document).expect("second render")
        );
    }
}
