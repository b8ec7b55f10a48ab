//! The persistence interface the services are written against.
//!
//! Every service call opens one [`StoreTx`] and either commits it or drops
//! it. Dropping an uncommitted transaction discards its writes.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tutordesk_models::{
    CredentialHandoff, Lesson, LessonId, ParentProfile, StudentProfile, Subject,
    SubjectEnrollment, SubjectId, TeacherProfile, TutorProfile, User, UserId, Username,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx + '_>, StoreError>;
}

/// One atomic unit of work.
///
/// Implementations enforce the relational rules themselves: unique usernames,
/// one active enrollment per triple, the student profile link rules, and
/// refusal to delete users, subjects or lessons that active rows depend on.
#[async_trait]
pub trait StoreTx: Send {
    // Users
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(
        &mut self,
        username: &Username,
    ) -> Result<Option<User>, StoreError>;
    /// Existing usernames that start with `prefix`.
    async fn usernames_with_prefix(&mut self, prefix: &str) -> Result<Vec<String>, StoreError>;
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;
    async fn update_user(&mut self, user: &User) -> Result<(), StoreError>;
    /// Deletes the user with their own profile and pending handoffs.
    async fn delete_user(&mut self, id: UserId) -> Result<(), StoreError>;

    // Profiles
    async fn insert_student_profile(&mut self, profile: &StudentProfile) -> Result<(), StoreError>;
    async fn update_student_profile(&mut self, profile: &StudentProfile) -> Result<(), StoreError>;
    async fn find_student_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<StudentProfile>, StoreError>;
    async fn list_student_profiles_by_tutor(
        &mut self,
        tutor_id: UserId,
    ) -> Result<Vec<StudentProfile>, StoreError>;
    async fn list_student_profiles_by_parent(
        &mut self,
        parent_id: UserId,
    ) -> Result<Vec<StudentProfile>, StoreError>;
    async fn insert_parent_profile(&mut self, profile: &ParentProfile) -> Result<(), StoreError>;
    async fn find_parent_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<ParentProfile>, StoreError>;
    async fn insert_teacher_profile(&mut self, profile: &TeacherProfile) -> Result<(), StoreError>;
    async fn find_teacher_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TeacherProfile>, StoreError>;
    async fn insert_tutor_profile(&mut self, profile: &TutorProfile) -> Result<(), StoreError>;
    async fn find_tutor_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TutorProfile>, StoreError>;

    // Subjects and lessons
    async fn insert_subject(&mut self, subject: &Subject) -> Result<(), StoreError>;
    async fn find_subject(&mut self, id: SubjectId) -> Result<Option<Subject>, StoreError>;
    async fn delete_subject(&mut self, id: SubjectId) -> Result<(), StoreError>;
    async fn insert_lesson(&mut self, lesson: &Lesson) -> Result<(), StoreError>;
    async fn find_lesson(&mut self, id: LessonId) -> Result<Option<Lesson>, StoreError>;
    async fn delete_lesson(&mut self, id: LessonId) -> Result<(), StoreError>;

    // Enrollments
    /// All rows for the triple, most recently updated first.
    async fn find_enrollments_for_triple(
        &mut self,
        student_id: UserId,
        subject_id: SubjectId,
        teacher_id: UserId,
    ) -> Result<Vec<SubjectEnrollment>, StoreError>;
    async fn find_active_enrollments(
        &mut self,
        student_id: UserId,
        subject_id: SubjectId,
    ) -> Result<Vec<SubjectEnrollment>, StoreError>;
    async fn list_enrollments_for_student(
        &mut self,
        student_id: UserId,
    ) -> Result<Vec<SubjectEnrollment>, StoreError>;
    async fn insert_enrollment(&mut self, enrollment: &SubjectEnrollment)
    -> Result<(), StoreError>;
    async fn update_enrollment(&mut self, enrollment: &SubjectEnrollment)
    -> Result<(), StoreError>;

    // Credential handoffs
    async fn insert_handoff(&mut self, handoff: &CredentialHandoff) -> Result<(), StoreError>;
    /// Removes and returns the pending handoff for `user_id`, expired or not.
    async fn take_handoff(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<CredentialHandoff>, StoreError>;
    /// Deletes every handoff that expired at or before `now` and returns how
    /// many went.
    async fn purge_expired_handoffs(&mut self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
