//! Subject enrollments: "this teacher teaches this subject to this student".
//!
//! At most one active row exists per (student, subject, teacher) triple.
//! Inactive rows are history and may outlive the rows they referenced, in
//! which case the reference is empty.

use crate::ids::{EnrollmentId, SubjectId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "enrollment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Dropped,
}

#[derive(Serialize, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct SubjectEnrollment {
    pub id: EnrollmentId,
    pub student_id: Option<UserId>,
    pub subject_id: Option<SubjectId>,
    pub teacher_id: Option<UserId>,
    pub assigned_by: Option<UserId>,
    pub status: EnrollmentStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubjectEnrollment {
    pub fn new(
        student_id: UserId,
        subject_id: SubjectId,
        teacher_id: UserId,
        assigned_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EnrollmentId::new(),
            student_id: Some(student_id),
            subject_id: Some(subject_id),
            teacher_id: Some(teacher_id),
            assigned_by: Some(assigned_by),
            status: EnrollmentStatus::Active,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn matches(&self, student_id: UserId, subject_id: SubjectId, teacher_id: UserId) -> bool {
        self.student_id == Some(student_id)
            && self.subject_id == Some(subject_id)
            && self.teacher_id == Some(teacher_id)
    }

    pub fn reactivate(&mut self, assigned_by: UserId, now: DateTime<Utc>) {
        self.assigned_by = Some(assigned_by);
        self.status = EnrollmentStatus::Active;
        self.is_active = true;
        self.updated_at = now;
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.status = EnrollmentStatus::Dropped;
        self.is_active = false;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deactivate_then_reactivate_keeps_id() {
        let (student, subject, teacher, tutor) =
            (UserId::new(), SubjectId::new(), UserId::new(), UserId::new());
        let mut enrollment = SubjectEnrollment::new(student, subject, teacher, tutor, Utc::now());
        let id = enrollment.id;

        enrollment.deactivate(Utc::now());
        assert!(!enrollment.is_active);
        assert_eq!(enrollment.status, EnrollmentStatus::Dropped);

        let other_tutor = UserId::new();
        enrollment.reactivate(other_tutor, Utc::now());
        assert!(enrollment.is_active);
        assert_eq!(enrollment.id, id);
        assert_eq!(enrollment.assigned_by, Some(other_tutor));
        assert!(enrollment.matches(student, subject, teacher));
    }
}
