//! PostgreSQL store.
//!
//! Relational rules live in the schema (see `migrations/`); this module maps
//! rows and translates constraint errors.

use crate::error::StoreError;
use crate::store::{Store, StoreTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tutordesk_models::{
    CredentialHandoff, Lesson, LessonId, ParentProfile, StudentProfile, Subject,
    SubjectEnrollment, SubjectId, TeacherProfile, TutorProfile, User, UserId, Username,
};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, password_hash, role, \
     is_active, is_verified, created_by, created_at, updated_at";

const STUDENT_COLUMNS: &str = "user_id, grade, goal, tutor_id, parent_id, generated_username, \
     messaging_channel_id, created_at, updated_at";

const ENROLLMENT_COLUMNS: &str = "id, student_id, subject_id, teacher_id, assigned_by, status, \
     is_active, created_at, updated_at";

const LESSON_COLUMNS: &str =
    "id, subject_id, teacher_id, student_id, starts_at, duration_minutes, created_at";

const HANDOFF_COLUMNS: &str = "user_id, username, password, issued_to, expires_at, created_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx + '_>, StoreError> {
        let tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;
        Ok(Box::new(PgTx { tx }))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn affected(rows: u64, entity: &'static str) -> Result<(), StoreError> {
    if rows == 0 {
        Err(StoreError::NotFound(entity))
    } else {
        Ok(())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn find_user_by_username(
        &mut self,
        username: &Username,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn usernames_with_prefix(&mut self, prefix: &str) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE starts_with(username, $1)")
            .bind(prefix)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(user.created_by)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET username = $2, email = $3, first_name = $4, last_name = $5, \
             password_hash = $6, role = $7, is_active = $8, is_verified = $9, \
             created_by = $10, updated_at = $11 \
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(user.created_by)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        affected(result.rows_affected(), "user")
    }

    async fn delete_user(&mut self, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::from_sqlx_delete(e, "user"))?;
        affected(result.rows_affected(), "user")
    }

    async fn insert_student_profile(&mut self, profile: &StudentProfile) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO student_profiles ({STUDENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(profile.user_id)
        .bind(&profile.grade)
        .bind(&profile.goal)
        .bind(profile.tutor_id)
        .bind(profile.parent_id)
        .bind(&profile.generated_username)
        .bind(&profile.messaging_channel_id)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn update_student_profile(&mut self, profile: &StudentProfile) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE student_profiles SET grade = $2, goal = $3, tutor_id = $4, parent_id = $5, \
             generated_username = $6, messaging_channel_id = $7, updated_at = $8 \
             WHERE user_id = $1",
        )
        .bind(profile.user_id)
        .bind(&profile.grade)
        .bind(&profile.goal)
        .bind(profile.tutor_id)
        .bind(profile.parent_id)
        .bind(&profile.generated_username)
        .bind(&profile.messaging_channel_id)
        .bind(profile.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        affected(result.rows_affected(), "student profile")
    }

    async fn find_student_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<StudentProfile>, StoreError> {
        sqlx::query_as::<_, StudentProfile>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM student_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn list_student_profiles_by_tutor(
        &mut self,
        tutor_id: UserId,
    ) -> Result<Vec<StudentProfile>, StoreError> {
        sqlx::query_as::<_, StudentProfile>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM student_profiles \
             WHERE tutor_id = $1 ORDER BY created_at"
        ))
        .bind(tutor_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn list_student_profiles_by_parent(
        &mut self,
        parent_id: UserId,
    ) -> Result<Vec<StudentProfile>, StoreError> {
        sqlx::query_as::<_, StudentProfile>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM student_profiles \
             WHERE parent_id = $1 ORDER BY created_at"
        ))
        .bind(parent_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn insert_parent_profile(&mut self, profile: &ParentProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO parent_profiles (user_id, messaging_channel_id, created_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(profile.user_id)
        .bind(&profile.messaging_channel_id)
        .bind(profile.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn find_parent_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<ParentProfile>, StoreError> {
        sqlx::query_as::<_, ParentProfile>(
            "SELECT user_id, messaging_channel_id, created_at \
             FROM parent_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn insert_teacher_profile(&mut self, profile: &TeacherProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO teacher_profiles \
             (user_id, subject, experience_years, bio, messaging_channel_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(profile.user_id)
        .bind(&profile.subject)
        .bind(profile.experience_years)
        .bind(&profile.bio)
        .bind(&profile.messaging_channel_id)
        .bind(profile.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn find_teacher_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TeacherProfile>, StoreError> {
        sqlx::query_as::<_, TeacherProfile>(
            "SELECT user_id, subject, experience_years, bio, messaging_channel_id, created_at \
             FROM teacher_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn insert_tutor_profile(&mut self, profile: &TutorProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tutor_profiles \
             (user_id, specialization, experience_years, bio, messaging_channel_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(profile.user_id)
        .bind(&profile.specialization)
        .bind(profile.experience_years)
        .bind(&profile.bio)
        .bind(&profile.messaging_channel_id)
        .bind(profile.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn find_tutor_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TutorProfile>, StoreError> {
        sqlx::query_as::<_, TutorProfile>(
            "SELECT user_id, specialization, experience_years, bio, messaging_channel_id, \
             created_at FROM tutor_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn insert_subject(&mut self, subject: &Subject) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO subjects (id, name, description, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(subject.id)
        .bind(&subject.name)
        .bind(&subject.description)
        .bind(subject.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn find_subject(&mut self, id: SubjectId) -> Result<Option<Subject>, StoreError> {
        sqlx::query_as::<_, Subject>(
            "SELECT id, name, description, created_at FROM subjects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn delete_subject(&mut self, id: SubjectId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::from_sqlx_delete(e, "subject"))?;
        affected(result.rows_affected(), "subject")
    }

    async fn insert_lesson(&mut self, lesson: &Lesson) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO lessons ({LESSON_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(lesson.id)
        .bind(lesson.subject_id)
        .bind(lesson.teacher_id)
        .bind(lesson.student_id)
        .bind(lesson.starts_at)
        .bind(lesson.duration_minutes)
        .bind(lesson.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn find_lesson(&mut self, id: LessonId) -> Result<Option<Lesson>, StoreError> {
        sqlx::query_as::<_, Lesson>(&format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn delete_lesson(&mut self, id: LessonId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::from_sqlx_delete(e, "lesson"))?;
        affected(result.rows_affected(), "lesson")
    }

    async fn find_enrollments_for_triple(
        &mut self,
        student_id: UserId,
        subject_id: SubjectId,
        teacher_id: UserId,
    ) -> Result<Vec<SubjectEnrollment>, StoreError> {
        sqlx::query_as::<_, SubjectEnrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM subject_enrollments \
             WHERE student_id = $1 AND subject_id = $2 AND teacher_id = $3 \
             ORDER BY updated_at DESC, created_at DESC"
        ))
        .bind(student_id)
        .bind(subject_id)
        .bind(teacher_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_active_enrollments(
        &mut self,
        student_id: UserId,
        subject_id: SubjectId,
    ) -> Result<Vec<SubjectEnrollment>, StoreError> {
        sqlx::query_as::<_, SubjectEnrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM subject_enrollments \
             WHERE student_id = $1 AND subject_id = $2 AND is_active \
             FOR UPDATE"
        ))
        .bind(student_id)
        .bind(subject_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn list_enrollments_for_student(
        &mut self,
        student_id: UserId,
    ) -> Result<Vec<SubjectEnrollment>, StoreError> {
        sqlx::query_as::<_, SubjectEnrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM subject_enrollments \
             WHERE student_id = $1 ORDER BY created_at"
        ))
        .bind(student_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn insert_enrollment(
        &mut self,
        enrollment: &SubjectEnrollment,
    ) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO subject_enrollments ({ENROLLMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(enrollment.id)
        .bind(enrollment.student_id)
        .bind(enrollment.subject_id)
        .bind(enrollment.teacher_id)
        .bind(enrollment.assigned_by)
        .bind(enrollment.status)
        .bind(enrollment.is_active)
        .bind(enrollment.created_at)
        .bind(enrollment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn update_enrollment(
        &mut self,
        enrollment: &SubjectEnrollment,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE subject_enrollments SET student_id = $2, subject_id = $3, teacher_id = $4, \
             assigned_by = $5, status = $6, is_active = $7, updated_at = $8 \
             WHERE id = $1",
        )
        .bind(enrollment.id)
        .bind(enrollment.student_id)
        .bind(enrollment.subject_id)
        .bind(enrollment.teacher_id)
        .bind(enrollment.assigned_by)
        .bind(enrollment.status)
        .bind(enrollment.is_active)
        .bind(enrollment.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        affected(result.rows_affected(), "enrollment")
    }

    async fn insert_handoff(&mut self, handoff: &CredentialHandoff) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO credential_handoffs ({HANDOFF_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(handoff.user_id)
        .bind(&handoff.username)
        .bind(&handoff.password)
        .bind(handoff.issued_to)
        .bind(handoff.expires_at)
        .bind(handoff.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn take_handoff(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<CredentialHandoff>, StoreError> {
        sqlx::query_as::<_, CredentialHandoff>(&format!(
            "DELETE FROM credential_handoffs WHERE user_id = $1 RETURNING {HANDOFF_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn purge_expired_handoffs(&mut self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM credential_handoffs WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(StoreError::from_sqlx)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(StoreError::from_sqlx)
    }
}
