use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NOT_PROVIDED: &str = "Not provided";
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub email: String,
    pub learning_streak: u32,
}

impl Default for UserInfo {
    fn default() -> Self {
        Self {
            name: NOT_PROVIDED.to_string(),
            email: NOT_PROVIDED.to_string(),
            learning_streak: 0,
        }
    }
}

/// One activity attempt by the user, as fetched for a single report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub activity_id: String,
    pub activity_title: String,
    pub course_id: String,
    pub course_title: String,
    pub completed: bool,
    pub score: Option<f64>,
    pub time_spent_minutes: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseEnrollment {
    pub course_id: String,
    pub title: String,
    pub level: String,
    pub score: f64,
    pub progress_percent: f64,
    pub enrolled_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CourseEnrollment {
    /// Enrollment-level notion of "completed": the backend-maintained score hit 100.
    pub fn enrollment_score_complete(&self) -> bool {
        self.score == 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    InProgress,
}

impl CompletionStatus {
    pub fn label(self) -> &'static str {
        match self {
            CompletionStatus::Completed => "Completed",
            CompletionStatus::InProgress => "In Progress",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub course_title: String,
    pub completion_percent: u8,
    pub status: CompletionStatus,
}

impl CourseSummary {
    /// Activity-level notion of "completed": every progress record for the course is done.
    pub fn all_activities_complete(&self) -> bool {
        self.status == CompletionStatus::Completed
    }
}

/// One row of the admin enrollment listing, joined with the student profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentListing {
    pub student_name: String,
    pub student_email: String,
    pub course_title: String,
    pub progress_percent: f64,
    pub score: f64,
    pub enrolled_at: Option<DateTime<Utc>>,
}
