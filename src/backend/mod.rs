pub mod queries;
pub mod rest;
pub mod snapshot;

use crate::backend::rest::RestBackend;
use crate::backend::snapshot::SnapshotBackend;
use crate::config::Config;
use crate::model::{
    CourseEnrollment, EnrollmentListing, NOT_PROVIDED, ProgressRecord, UNKNOWN, UserInfo,
};
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Read-only view of the hosted backend. The reporting core never writes.
pub trait Backend: Send + Sync {
    fn profile(&self, user_id: &str) -> Result<Option<ProfileRow>>;
    fn enrollments(&self, user_id: &str) -> Result<Vec<EnrollmentRow>>;
    fn progress(&self, user_id: &str) -> Result<Vec<ProgressRow>>;
    fn all_enrollments(&self) -> Result<Vec<EnrollmentRow>>;
    fn describe(&self) -> String;
}

pub fn connect(config: &Config) -> Result<Box<dyn Backend>> {
    match &config.snapshot_path {
        Some(path) => Ok(Box::new(SnapshotBackend::load(path)?)),
        None => Ok(Box::new(RestBackend::new(
            &config.backend_url,
            config.resolve_api_key(),
            config.backend_timeout_seconds,
        )?)),
    }
}

pub fn ensure_user_id(user_id: &str) -> Result<()> {
    if !queries::is_safe_identifier(user_id) {
        bail!("Invalid user id: {user_id:?}");
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRow {
    pub id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub learning_streak: Option<i64>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseRef {
    pub title: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityRef {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRef {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentRow {
    pub user_id: String,
    pub course_id: String,
    pub progress: Option<f64>,
    pub score: Option<f64>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    pub courses: Option<CourseRef>,
    pub profiles: Option<ProfileRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressRow {
    pub user_id: String,
    pub course_id: String,
    pub activity_id: String,
    pub completed: Option<bool>,
    pub score: Option<f64>,
    pub time_spent: Option<f64>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    pub activities: Option<ActivityRef>,
    pub courses: Option<CourseRef>,
}

pub fn user_info(profile: Option<ProfileRow>) -> UserInfo {
    let Some(profile) = profile else {
        return UserInfo::default();
    };

    UserInfo {
        name: text_or(profile.full_name, NOT_PROVIDED),
        email: text_or(profile.email, NOT_PROVIDED),
        learning_streak: profile
            .learning_streak
            .map(|streak| u32::try_from(streak.max(0)).unwrap_or(u32::MAX))
            .unwrap_or_default(),
    }
}

impl From<ProgressRow> for ProgressRecord {
    fn from(row: ProgressRow) -> Self {
        Self {
            activity_title: text_or(row.activities.and_then(|activity| activity.title), UNKNOWN),
            course_title: text_or(row.courses.and_then(|course| course.title), UNKNOWN),
            activity_id: row.activity_id,
            course_id: row.course_id,
            completed: row.completed.unwrap_or(false),
            score: row.score.filter(|value| value.is_finite()),
            time_spent_minutes: row.time_spent.filter(|value| value.is_finite()),
            updated_at: row.updated_at,
        }
    }
}

impl From<EnrollmentRow> for CourseEnrollment {
    fn from(row: EnrollmentRow) -> Self {
        let course = row.courses.unwrap_or_default();

        Self {
            course_id: row.course_id,
            title: text_or(course.title, UNKNOWN),
            level: text_or(course.level, UNKNOWN),
            score: finite_or_zero(row.score),
            progress_percent: finite_or_zero(row.progress),
            enrolled_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<EnrollmentRow> for EnrollmentListing {
    fn from(row: EnrollmentRow) -> Self {
        let profile = row.profiles.unwrap_or_default();

        Self {
            student_name: text_or(profile.full_name, NOT_PROVIDED),
            student_email: text_or(profile.email, NOT_PROVIDED),
            course_title: text_or(row.courses.and_then(|course| course.title), UNKNOWN),
            progress_percent: finite_or_zero(row.progress),
            score: finite_or_zero(row.score),
            enrolled_at: row.created_at,
        }
    }
}

/// Converts enrollment rows keeping the first row per course, in fetch order.
pub fn unique_enrollments(rows: Vec<EnrollmentRow>) -> Vec<CourseEnrollment> {
    let mut seen = HashSet::new();

    rows.into_iter()
        .filter(|row| {
            let first = seen.insert(row.course_id.clone());
            if !first {
                warn!(course_id = %row.course_id, "duplicate enrollment ignored");
            }
            first
        })
        .map(CourseEnrollment::from)
        .collect()
}

fn text_or(value: Option<String>, fallback: &str) -> String {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|number| number.is_finite()).unwrap_or_default()
}

/// Accepts RFC 3339 and zone-less Postgres timestamps; anything else becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;

    Ok(raw.and_then(|value| parse_timestamp(&value)))
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();

    DateTime::parse_from_rfc3339(trimmed)
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z")
                .map(|parsed| parsed.with_timezone(&Utc))
                .ok()
        })
}
