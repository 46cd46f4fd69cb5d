pub const PROFILES_TABLE: &str = "profiles";
pub const ENROLLMENTS_TABLE: &str = "enrollments";
pub const PROGRESS_TABLE: &str = "user_progress";

pub const PROFILE_SELECT: &str = "id,full_name,email,learning_streak,role";

pub const ENROLLMENT_SELECT: &str = "user_id,course_id,progress,score,created_at,updated_at,\
courses(title,level),profiles(full_name,email)";

pub const PROGRESS_SELECT: &str = "user_id,course_id,activity_id,completed,score,time_spent,\
updated_at,activities(title),courses(title)";

/// PostgREST equality filter value.
pub fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// Identifiers are interpolated into filter expressions, so PostgREST operator
/// syntax is not allowed in them.
pub fn is_safe_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 128
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}
