use crate::model::{CompletionStatus, CourseEnrollment, CourseSummary, ProgressRecord, UNKNOWN};

/// Completion for one course, computed from the user's full (unfiltered) record set.
pub fn summarize(course_id: &str, records: &[ProgressRecord]) -> CourseSummary {
    let course_records = records
        .iter()
        .filter(|record| record.course_id == course_id)
        .collect::<Vec<_>>();

    let course_title = course_records
        .iter()
        .map(|record| record.course_title.trim())
        .find(|title| !title.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();

    let total = course_records.len();
    let completed = course_records
        .iter()
        .filter(|record| record.completed)
        .count();

    CourseSummary {
        course_title,
        completion_percent: completion_percent(completed, total),
        status: if total > 0 && completed == total {
            CompletionStatus::Completed
        } else {
            CompletionStatus::InProgress
        },
    }
}

/// Same as [`summarize`] but labelled with the enrollment's course title.
pub fn summarize_enrollment(
    enrollment: &CourseEnrollment,
    records: &[ProgressRecord],
) -> CourseSummary {
    CourseSummary {
        course_title: enrollment.title.clone(),
        ..summarize(&enrollment.course_id, records)
    }
}

pub fn summarize_all(
    enrollments: &[CourseEnrollment],
    records: &[ProgressRecord],
) -> Vec<CourseSummary> {
    enrollments
        .iter()
        .map(|enrollment| summarize_enrollment(enrollment, records))
        .collect()
}

/// `round(100 * completed / total)` with half-up rounding; 0 for an empty set.
pub fn completion_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }

    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((200 * completed + total) / (2 * total)) as u8
}
