use std::collections::BTreeSet;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use tutordesk_cache::CacheTarget;
use tutordesk_core::AppError;
use tutordesk_db::{ACTIVE_ENROLLMENT_UNIQUE, Store, StoreError, StoreTx};
use tutordesk_models::{Role, StudentProfile, SubjectEnrollment, SubjectId, User, UserId};
use tutordesk_observability::{track_enrollment_change, track_validation_failure};

use crate::effects::Outcome;
use crate::modules::access::{require_any_role, require_student_manager};
use crate::notifications::{Notification, NotificationEvent};

/// What `assign_subject` did to the enrollment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    AlreadyActive,
    Reactivated,
    Created,
}

fn is_enrollment_race(err: &AppError) -> bool {
    err.error
        .downcast_ref::<StoreError>()
        .is_some_and(|e| e.is_unique_violation_of(ACTIVE_ENROLLMENT_UNIQUE))
}

/// Loads the student's profile and checks that `actor` may manage it.
async fn managed_student(
    tx: &mut dyn StoreTx,
    actor: &User,
    student_id: UserId,
) -> Result<StudentProfile, AppError> {
    let student = tx
        .find_user(student_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Student {student_id} not found")))?;
    if student.role != Role::Student {
        return Err(AppError::invalid_field(
            "student",
            anyhow!("User {student_id} has role {}, expected student", student.role),
        ));
    }

    let profile = tx
        .find_student_profile(student_id)
        .await?
        .ok_or_else(|| AppError::internal(anyhow!("Student {student_id} has no profile")))?;
    require_student_manager(actor, &profile)?;
    Ok(profile)
}

pub struct EnrollmentService;

impl EnrollmentService {
    /// Enrolls the student in `subject_id` with `teacher_id`.
    ///
    /// Assigning an already active triple returns the existing row. A
    /// previously unassigned triple is reactivated in place, keeping its id.
    ///
    /// # Arguments
    /// * `actor` - An admin, or the student's tutor
    /// * `student_id` - The student to enroll
    /// * `subject_id` - An existing subject
    /// * `teacher_id` - An active teacher
    ///
    /// # Errors
    /// * `Authorization` when `actor` may not manage the student.
    /// * `NotFound` for an unknown student.
    /// * `Validation` on `student` when the user is not a student, and on
    ///   `subject` or `teacher` when the reference is missing or unusable.
    ///
    /// # Example
    /// ```ignore
    /// let enrollment = EnrollmentService::assign_subject(&store, &tutor, student, maths, teacher)
    ///     .await?
    ///     .apply(&hooks)
    ///     .await;
    /// assert!(enrollment.is_active);
    /// ```
    #[instrument(skip(store, actor), fields(actor_id = %actor.id))]
    pub async fn assign_subject(
        store: &dyn Store,
        actor: &User,
        student_id: UserId,
        subject_id: SubjectId,
        teacher_id: UserId,
    ) -> Result<Outcome<SubjectEnrollment>, AppError> {
        require_any_role(actor, &[Role::Admin, Role::Tutor])?;

        let (enrollment, assignment) =
            match Self::assign(store, actor, student_id, subject_id, teacher_id).await {
                Err(err) if is_enrollment_race(&err) => {
                    // Another request activated the triple first; the second
                    // pass finds that row.
                    warn!("Concurrent enrollment detected, retrying");
                    Self::assign(store, actor, student_id, subject_id, teacher_id).await?
                }
                result => result?,
            };

        if assignment == Assignment::AlreadyActive {
            debug!(enrollment_id = %enrollment.id, "Enrollment already active");
            return Ok(Outcome::new(enrollment));
        }

        info!(enrollment_id = %enrollment.id, ?assignment, "Subject assigned");
        track_enrollment_change(match assignment {
            Assignment::Reactivated => "reactivated",
            _ => "assigned",
        });

        Ok(Outcome::new(enrollment)
            .invalidate(CacheTarget::Enrollments(student_id))
            .notify(Notification::new(
                teacher_id,
                NotificationEvent::SubjectAssigned {
                    student_id,
                    subject_id,
                },
            )))
    }

    async fn assign(
        store: &dyn Store,
        actor: &User,
        student_id: UserId,
        subject_id: SubjectId,
        teacher_id: UserId,
    ) -> Result<(SubjectEnrollment, Assignment), AppError> {
        let mut tx = store.begin().await?;
        managed_student(tx.as_mut(), actor, student_id).await?;

        let teacher = tx.find_user(teacher_id).await?;
        if !teacher.is_some_and(|t| t.is_active_with_role(Role::Teacher)) {
            track_validation_failure("teacher");
            return Err(AppError::invalid_field(
                "teacher",
                anyhow!("User {teacher_id} is not an active teacher"),
            ));
        }
        if tx.find_subject(subject_id).await?.is_none() {
            return Err(AppError::invalid_field(
                "subject",
                anyhow!("Subject {subject_id} does not exist"),
            ));
        }

        let rows = tx
            .find_enrollments_for_triple(student_id, subject_id, teacher_id)
            .await?;

        let result = if let Some(active) = rows.iter().find(|e| e.is_active) {
            (active.clone(), Assignment::AlreadyActive)
        } else if let Some(mut latest) = rows.into_iter().next() {
            latest.reactivate(actor.id, Utc::now());
            tx.update_enrollment(&latest).await?;
            (latest, Assignment::Reactivated)
        } else {
            let enrollment =
                SubjectEnrollment::new(student_id, subject_id, teacher_id, actor.id, Utc::now());
            tx.insert_enrollment(&enrollment).await?;
            (enrollment, Assignment::Created)
        };

        tx.commit().await?;
        Ok(result)
    }

    /// Deactivates every active enrollment of the student in the subject,
    /// whoever teaches it. Each teacher involved is notified once.
    ///
    /// # Errors
    /// * `Authorization` when `actor` may not manage the student.
    /// * `NotFound` when no active enrollment exists for the pair.
    #[instrument(skip(store, actor), fields(actor_id = %actor.id))]
    pub async fn unassign_subject(
        store: &dyn Store,
        actor: &User,
        student_id: UserId,
        subject_id: SubjectId,
    ) -> Result<Outcome<Vec<SubjectEnrollment>>, AppError> {
        require_any_role(actor, &[Role::Admin, Role::Tutor])?;

        let mut tx = store.begin().await?;
        managed_student(tx.as_mut(), actor, student_id).await?;

        let mut rows = tx.find_active_enrollments(student_id, subject_id).await?;
        if rows.is_empty() {
            return Err(AppError::not_found(anyhow!(
                "Student {student_id} has no active enrollment in subject {subject_id}"
            )));
        }

        let now = Utc::now();
        for row in &mut rows {
            row.deactivate(now);
            tx.update_enrollment(row).await?;
        }
        tx.commit().await?;

        info!(count = rows.len(), "Subject unassigned");
        track_enrollment_change("unassigned");

        let teachers: BTreeSet<UserId> = rows.iter().filter_map(|e| e.teacher_id).collect();
        let mut outcome = Outcome::new(rows).invalidate(CacheTarget::Enrollments(student_id));
        for teacher in teachers {
            outcome = outcome.notify(Notification::new(
                teacher,
                NotificationEvent::SubjectUnassigned {
                    student_id,
                    subject_id,
                },
            ));
        }
        Ok(outcome)
    }

    /// The student's enrollments in creation order; inactive rows only when
    /// asked for.
    #[instrument(skip(store))]
    pub async fn list_enrollments(
        store: &dyn Store,
        student_id: UserId,
        include_inactive: bool,
    ) -> Result<Vec<SubjectEnrollment>, AppError> {
        let mut tx = store.begin().await?;
        if tx.find_user(student_id).await?.is_none() {
            return Err(AppError::not_found(anyhow!("Student {student_id} not found")));
        }
        let mut rows = tx.list_enrollments_for_student(student_id).await?;
        tx.commit().await?;

        if !include_inactive {
            rows.retain(|e| e.is_active);
        }
        Ok(rows)
    }
}
