use anyhow::anyhow;
use chrono::Utc;
use tracing::{info, instrument};
use tutordesk_cache::CacheTarget;
use tutordesk_core::AppError;
use tutordesk_db::{Store, StoreError};
use tutordesk_models::{
    CreateSubjectDto, Lesson, LessonId, Role, ScheduleLessonDto, Subject, SubjectId, User,
};

use crate::effects::Outcome;
use crate::modules::access::{require_admin, require_any_role, require_student_manager};
use crate::modules::validation::validate_dto;

pub struct SubjectService;

impl SubjectService {
    #[instrument(skip(store, actor, dto), fields(actor_id = %actor.id, name = %dto.name))]
    pub async fn create_subject(
        store: &dyn Store,
        actor: &User,
        dto: CreateSubjectDto,
    ) -> Result<Outcome<Subject>, AppError> {
        require_admin(actor)?;
        validate_dto(&dto)?;

        let subject = Subject {
            id: SubjectId::new(),
            name: dto.name.trim().to_string(),
            description: dto.description.trim().to_string(),
            created_at: Utc::now(),
        };

        let mut tx = store.begin().await?;
        tx.insert_subject(&subject).await.map_err(|e| match e {
            StoreError::UniqueViolation { .. } => AppError::invalid_field("name", e),
            e => e.into(),
        })?;
        tx.commit().await?;

        info!(subject_id = %subject.id, "Subject created");
        let target = CacheTarget::Subject(subject.id);
        Ok(Outcome::new(subject).invalidate(target))
    }

    /// Refused while active enrollments or lessons reference the subject.
    /// Inactive enrollments keep their history with the subject cleared.
    ///
    /// # Errors
    /// * `Authorization` unless `actor` is an active admin.
    /// * `NotFound` for an unknown subject.
    /// * `ProtectedReference` (400) naming the dependent tables.
    #[instrument(skip(store, actor), fields(actor_id = %actor.id))]
    pub async fn delete_subject(
        store: &dyn Store,
        actor: &User,
        subject_id: SubjectId,
    ) -> Result<Outcome<()>, AppError> {
        require_admin(actor)?;

        let mut tx = store.begin().await?;
        if tx.find_subject(subject_id).await?.is_none() {
            return Err(AppError::not_found(anyhow!("Subject {subject_id} not found")));
        }
        tx.delete_subject(subject_id).await?;
        tx.commit().await?;

        info!(%subject_id, "Subject deleted");
        Ok(Outcome::new(()).invalidate(CacheTarget::Subject(subject_id)))
    }

    /// Teachers schedule their own lessons; tutors only for students they
    /// manage. A lesson without a student is a group lesson.
    #[instrument(skip(store, actor, dto), fields(actor_id = %actor.id))]
    pub async fn schedule_lesson(
        store: &dyn Store,
        actor: &User,
        dto: ScheduleLessonDto,
    ) -> Result<Outcome<Lesson>, AppError> {
        require_any_role(actor, &[Role::Admin, Role::Teacher, Role::Tutor])?;
        validate_dto(&dto)?;
        if actor.role == Role::Teacher && dto.teacher_id != actor.id {
            return Err(AppError::forbidden(anyhow!(
                "Teacher {} cannot schedule lessons for {}",
                actor.id,
                dto.teacher_id
            )));
        }

        let mut tx = store.begin().await?;

        let teacher = tx.find_user(dto.teacher_id).await?;
        if !teacher.is_some_and(|t| t.is_active_with_role(Role::Teacher)) {
            return Err(AppError::invalid_field(
                "teacher",
                anyhow!("User {} is not an active teacher", dto.teacher_id),
            ));
        }

        if let Some(student_id) = dto.student_id {
            let profile = tx.find_student_profile(student_id).await?.ok_or_else(|| {
                AppError::invalid_field("student", anyhow!("Student {student_id} does not exist"))
            })?;
            if actor.role == Role::Tutor {
                require_student_manager(actor, &profile)?;
            }
        } else if actor.role == Role::Tutor {
            return Err(AppError::forbidden(anyhow!(
                "Tutors can only schedule lessons for their students"
            )));
        }

        if tx.find_subject(dto.subject_id).await?.is_none() {
            return Err(AppError::invalid_field(
                "subject",
                anyhow!("Subject {} does not exist", dto.subject_id),
            ));
        }

        let lesson = Lesson {
            id: LessonId::new(),
            subject_id: dto.subject_id,
            teacher_id: dto.teacher_id,
            student_id: dto.student_id,
            starts_at: dto.starts_at,
            duration_minutes: dto.duration_minutes,
            created_at: Utc::now(),
        };
        tx.insert_lesson(&lesson).await?;
        tx.commit().await?;

        info!(lesson_id = %lesson.id, "Lesson scheduled");
        Ok(Outcome::new(lesson))
    }

    #[instrument(skip(store, actor), fields(actor_id = %actor.id))]
    pub async fn cancel_lesson(
        store: &dyn Store,
        actor: &User,
        lesson_id: LessonId,
    ) -> Result<Outcome<()>, AppError> {
        require_any_role(actor, &[Role::Admin, Role::Teacher])?;

        let mut tx = store.begin().await?;
        let lesson = tx
            .find_lesson(lesson_id)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Lesson {lesson_id} not found")))?;
        if actor.role == Role::Teacher && lesson.teacher_id != actor.id {
            return Err(AppError::forbidden(anyhow!(
                "Teacher {} does not teach lesson {lesson_id}",
                actor.id
            )));
        }

        tx.delete_lesson(lesson_id).await?;
        tx.commit().await?;

        info!(%lesson_id, "Lesson cancelled");
        Ok(Outcome::new(()))
    }
}
