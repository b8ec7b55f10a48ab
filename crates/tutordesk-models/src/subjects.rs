//! Subjects and scheduled lessons.

use crate::ids::{LessonId, SubjectId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Serialize, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct CreateSubjectDto {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub description: String,
}

/// A scheduled lesson. `student_id` is empty for group or not yet assigned
/// lessons.
#[derive(Serialize, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: LessonId,
    pub subject_id: SubjectId,
    pub teacher_id: UserId,
    pub student_id: Option<UserId>,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct ScheduleLessonDto {
    pub subject_id: SubjectId,
    pub teacher_id: UserId,
    pub student_id: Option<UserId>,
    pub starts_at: DateTime<Utc>,
    #[validate(range(min = 15, max = 480))]
    pub duration_minutes: i32,
}
