//! In-memory store with the same relational rules as the Postgres schema.
//!
//! A transaction holds the table lock for its whole lifetime and works on a
//! copy of the tables; commit swaps the copy in. Transactions are therefore
//! serialized, which is the strongest isolation Postgres offers as well.

use crate::error::{ACTIVE_ENROLLMENT_UNIQUE, StoreError, USERNAME_UNIQUE};
use crate::store::{Store, StoreTx};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tutordesk_models::{
    CredentialHandoff, Lesson, LessonId, ParentProfile, Role, StudentProfile, Subject,
    SubjectEnrollment, SubjectId, TeacherProfile, TutorProfile, User, UserId, Username,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    students: HashMap<UserId, StudentProfile>,
    parents: HashMap<UserId, ParentProfile>,
    teachers: HashMap<UserId, TeacherProfile>,
    tutors: HashMap<UserId, TutorProfile>,
    subjects: HashMap<SubjectId, Subject>,
    enrollments: Vec<SubjectEnrollment>,
    lessons: HashMap<LessonId, Lesson>,
    handoffs: HashMap<UserId, CredentialHandoff>,
}

/// Operation counter and armed faults, shared by the store and its
/// transactions.
#[derive(Debug, Default)]
struct CallTracker {
    operations: AtomicUsize,
    faults: std::sync::Mutex<HashMap<String, VecDeque<StoreError>>>,
}

impl CallTracker {
    fn touch(&self, op: &str) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let armed = self
            .faults
            .lock()
            .ok()
            .and_then(|mut faults| faults.get_mut(op).and_then(VecDeque::pop_front));
        match armed {
            Some(err) => {
                tracing::debug!(op, error = %err, "Injected store fault");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    tracker: Arc<CallTracker>,
}

/// Committed row counts, for assertions about what a call left behind.
#[cfg(feature = "test-utils")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub users: usize,
    pub student_profiles: usize,
    pub parent_profiles: usize,
    pub enrollments: usize,
    pub lessons: usize,
    pub handoffs: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "test-utils")]
impl MemoryStore {
    /// Make the next call to `op` fail with a transient error.
    pub fn fail_on(&self, op: &str) {
        self.fail_with(op, StoreError::transient(format!("injected fault in {op}")));
    }

    /// Queue `err` for a future call to `op`. Errors queued for the same
    /// operation fire one per call, in order.
    pub fn fail_with(&self, op: &str, err: StoreError) {
        if let Ok(mut faults) = self.tracker.faults.lock() {
            faults.entry(op.to_string()).or_default().push_back(err);
        }
    }

    /// Number of store calls made so far, `begin` and `commit` included.
    pub fn operation_count(&self) -> usize {
        self.tracker.operations.load(Ordering::SeqCst)
    }

    pub async fn row_counts(&self) -> RowCounts {
        let tables = self.tables.lock().await;
        RowCounts {
            users: tables.users.len(),
            student_profiles: tables.students.len(),
            parent_profiles: tables.parents.len(),
            enrollments: tables.enrollments.len(),
            lessons: tables.lessons.len(),
            handoffs: tables.handoffs.len(),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx + '_>, StoreError> {
        self.tracker.touch("begin")?;
        let committed = self.tables.clone().lock_owned().await;
        let working = committed.clone();
        Ok(Box::new(MemoryTx {
            committed,
            working,
            tracker: self.tracker.clone(),
        }))
    }
}

pub struct MemoryTx {
    committed: OwnedMutexGuard<Tables>,
    working: Tables,
    tracker: Arc<CallTracker>,
}

fn missing(constraint: &str) -> StoreError {
    StoreError::MissingReference {
        constraint: constraint.to_string(),
    }
}

fn check(constraint: &str) -> StoreError {
    StoreError::CheckViolation {
        constraint: constraint.to_string(),
    }
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

impl Tables {
    fn user_exists(&self, id: Option<UserId>, constraint: &str) -> Result<(), StoreError> {
        match id {
            Some(id) if !self.users.contains_key(&id) => Err(missing(constraint)),
            _ => Ok(()),
        }
    }

    fn check_username(&self, user: &User) -> Result<(), StoreError> {
        let taken = self
            .users
            .values()
            .any(|other| other.id != user.id && other.username == user.username);
        if taken {
            return Err(unique(USERNAME_UNIQUE));
        }
        self.user_exists(user.created_by, "users_created_by_fkey")
    }

    /// Link rules for student profiles, checked on every write.
    fn check_student_profile(&self, profile: &StudentProfile) -> Result<(), StoreError> {
        let owner = self
            .users
            .get(&profile.user_id)
            .ok_or_else(|| missing("student_profiles_user_id_fkey"))?;
        if owner.role != Role::Student {
            return Err(check("student_profiles_user_role"));
        }

        let links = [
            (profile.tutor_id, Role::Tutor, "tutor"),
            (profile.parent_id, Role::Parent, "parent"),
        ];
        for (id, role, name) in links {
            let Some(id) = id else { continue };
            let linked = self
                .users
                .get(&id)
                .ok_or_else(|| missing(&format!("student_profiles_{name}_id_fkey")))?;
            if linked.role != role {
                return Err(check(&format!("student_profiles_{name}_role")));
            }
            if !linked.is_active {
                return Err(check(&format!("student_profiles_{name}_active")));
            }
        }
        Ok(())
    }

    fn check_enrollment(&self, enrollment: &SubjectEnrollment) -> Result<(), StoreError> {
        use tutordesk_models::EnrollmentStatus;

        if enrollment.is_active != (enrollment.status == EnrollmentStatus::Active) {
            return Err(check("subject_enrollments_status_flag"));
        }
        if enrollment.is_active
            && (enrollment.student_id.is_none()
                || enrollment.subject_id.is_none()
                || enrollment.teacher_id.is_none())
        {
            return Err(check("subject_enrollments_active_refs"));
        }

        self.user_exists(enrollment.student_id, "subject_enrollments_student_id_fkey")?;
        self.user_exists(enrollment.teacher_id, "subject_enrollments_teacher_id_fkey")?;
        self.user_exists(enrollment.assigned_by, "subject_enrollments_assigned_by_fkey")?;
        if let Some(subject_id) = enrollment.subject_id {
            if !self.subjects.contains_key(&subject_id) {
                return Err(missing("subject_enrollments_subject_id_fkey"));
            }
        }

        if enrollment.is_active {
            let duplicate = self.enrollments.iter().any(|other| {
                other.id != enrollment.id
                    && other.is_active
                    && other.student_id == enrollment.student_id
                    && other.subject_id == enrollment.subject_id
                    && other.teacher_id == enrollment.teacher_id
            });
            if duplicate {
                return Err(unique(ACTIVE_ENROLLMENT_UNIQUE));
            }
        }
        Ok(())
    }

    fn protected(entity: &str, dependents: Vec<&str>) -> Result<(), StoreError> {
        if dependents.is_empty() {
            return Ok(());
        }
        Err(StoreError::ProtectedReference {
            entity: entity.to_string(),
            dependents: dependents.into_iter().map(String::from).collect(),
        })
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        self.tracker.touch("find_user")?;
        Ok(self.working.users.get(&id).cloned())
    }

    async fn find_user_by_username(
        &mut self,
        username: &Username,
    ) -> Result<Option<User>, StoreError> {
        self.tracker.touch("find_user_by_username")?;
        Ok(self
            .working
            .users
            .values()
            .find(|user| &user.username == username)
            .cloned())
    }

    async fn usernames_with_prefix(&mut self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.tracker.touch("usernames_with_prefix")?;
        Ok(self
            .working
            .users
            .values()
            .filter(|user| user.username.as_str().starts_with(prefix))
            .map(|user| user.username.as_str().to_string())
            .collect())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        self.tracker.touch("insert_user")?;
        if self.working.users.contains_key(&user.id) {
            return Err(unique("users_pkey"));
        }
        self.working.check_username(user)?;
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<(), StoreError> {
        self.tracker.touch("update_user")?;
        if !self.working.users.contains_key(&user.id) {
            return Err(StoreError::NotFound("user"));
        }
        self.working.check_username(user)?;
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&mut self, id: UserId) -> Result<(), StoreError> {
        self.tracker.touch("delete_user")?;
        let tables = &mut self.working;
        if !tables.users.contains_key(&id) {
            return Err(StoreError::NotFound("user"));
        }

        let mut dependents = Vec::new();
        if tables.enrollments.iter().any(|e| {
            e.is_active && (e.student_id == Some(id) || e.teacher_id == Some(id))
        }) {
            dependents.push("subject_enrollments");
        }
        if tables
            .lessons
            .values()
            .any(|l| l.teacher_id == id || l.student_id == Some(id))
        {
            dependents.push("lessons");
        }
        Tables::protected("user", dependents)?;

        tables.students.remove(&id);
        tables.parents.remove(&id);
        tables.teachers.remove(&id);
        tables.tutors.remove(&id);
        tables
            .handoffs
            .retain(|user_id, handoff| *user_id != id && handoff.issued_to != id);

        for profile in tables.students.values_mut() {
            if profile.tutor_id == Some(id) {
                profile.tutor_id = None;
            }
            if profile.parent_id == Some(id) {
                profile.parent_id = None;
            }
        }
        for enrollment in tables.enrollments.iter_mut() {
            for reference in [
                &mut enrollment.student_id,
                &mut enrollment.teacher_id,
                &mut enrollment.assigned_by,
            ] {
                if *reference == Some(id) {
                    *reference = None;
                }
            }
        }
        for user in tables.users.values_mut() {
            if user.created_by == Some(id) {
                user.created_by = None;
            }
        }

        tables.users.remove(&id);
        Ok(())
    }

    async fn insert_student_profile(&mut self, profile: &StudentProfile) -> Result<(), StoreError> {
        self.tracker.touch("insert_student_profile")?;
        if self.working.students.contains_key(&profile.user_id) {
            return Err(unique("student_profiles_pkey"));
        }
        self.working.check_student_profile(profile)?;
        self.working.students.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn update_student_profile(&mut self, profile: &StudentProfile) -> Result<(), StoreError> {
        self.tracker.touch("update_student_profile")?;
        if !self.working.students.contains_key(&profile.user_id) {
            return Err(StoreError::NotFound("student profile"));
        }
        self.working.check_student_profile(profile)?;
        self.working.students.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn find_student_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<StudentProfile>, StoreError> {
        self.tracker.touch("find_student_profile")?;
        Ok(self.working.students.get(&user_id).cloned())
    }

    async fn list_student_profiles_by_tutor(
        &mut self,
        tutor_id: UserId,
    ) -> Result<Vec<StudentProfile>, StoreError> {
        self.tracker.touch("list_student_profiles_by_tutor")?;
        let mut profiles: Vec<StudentProfile> = self
            .working
            .students
            .values()
            .filter(|profile| profile.tutor_id == Some(tutor_id))
            .cloned()
            .collect();
        profiles.sort_by_key(|profile| profile.created_at);
        Ok(profiles)
    }

    async fn list_student_profiles_by_parent(
        &mut self,
        parent_id: UserId,
    ) -> Result<Vec<StudentProfile>, StoreError> {
        self.tracker.touch("list_student_profiles_by_parent")?;
        let mut profiles: Vec<StudentProfile> = self
            .working
            .students
            .values()
            .filter(|profile| profile.parent_id == Some(parent_id))
            .cloned()
            .collect();
        profiles.sort_by_key(|profile| profile.created_at);
        Ok(profiles)
    }

    async fn insert_parent_profile(&mut self, profile: &ParentProfile) -> Result<(), StoreError> {
        self.tracker.touch("insert_parent_profile")?;
        if self.working.parents.contains_key(&profile.user_id) {
            return Err(unique("parent_profiles_pkey"));
        }
        self.working
            .user_exists(Some(profile.user_id), "parent_profiles_user_id_fkey")?;
        self.working.parents.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn find_parent_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<ParentProfile>, StoreError> {
        self.tracker.touch("find_parent_profile")?;
        Ok(self.working.parents.get(&user_id).cloned())
    }

    async fn insert_teacher_profile(&mut self, profile: &TeacherProfile) -> Result<(), StoreError> {
        self.tracker.touch("insert_teacher_profile")?;
        if self.working.teachers.contains_key(&profile.user_id) {
            return Err(unique("teacher_profiles_pkey"));
        }
        self.working
            .user_exists(Some(profile.user_id), "teacher_profiles_user_id_fkey")?;
        self.working.teachers.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn find_teacher_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TeacherProfile>, StoreError> {
        self.tracker.touch("find_teacher_profile")?;
        Ok(self.working.teachers.get(&user_id).cloned())
    }

    async fn insert_tutor_profile(&mut self, profile: &TutorProfile) -> Result<(), StoreError> {
        self.tracker.touch("insert_tutor_profile")?;
        if self.working.tutors.contains_key(&profile.user_id) {
            return Err(unique("tutor_profiles_pkey"));
        }
        self.working
            .user_exists(Some(profile.user_id), "tutor_profiles_user_id_fkey")?;
        self.working.tutors.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn find_tutor_profile(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TutorProfile>, StoreError> {
        self.tracker.touch("find_tutor_profile")?;
        Ok(self.working.tutors.get(&user_id).cloned())
    }

    async fn insert_subject(&mut self, subject: &Subject) -> Result<(), StoreError> {
        self.tracker.touch("insert_subject")?;
        if self.working.subjects.contains_key(&subject.id) {
            return Err(unique("subjects_pkey"));
        }
        if self
            .working
            .subjects
            .values()
            .any(|other| other.name == subject.name)
        {
            return Err(unique("subjects_name_key"));
        }
        self.working.subjects.insert(subject.id, subject.clone());
        Ok(())
    }

    async fn find_subject(&mut self, id: SubjectId) -> Result<Option<Subject>, StoreError> {
        self.tracker.touch("find_subject")?;
        Ok(self.working.subjects.get(&id).cloned())
    }

    async fn delete_subject(&mut self, id: SubjectId) -> Result<(), StoreError> {
        self.tracker.touch("delete_subject")?;
        let tables = &mut self.working;
        if !tables.subjects.contains_key(&id) {
            return Err(StoreError::NotFound("subject"));
        }

        let mut dependents = Vec::new();
        if tables
            .enrollments
            .iter()
            .any(|e| e.is_active && e.subject_id == Some(id))
        {
            dependents.push("subject_enrollments");
        }
        if tables.lessons.values().any(|l| l.subject_id == id) {
            dependents.push("lessons");
        }
        Tables::protected("subject", dependents)?;

        for enrollment in tables.enrollments.iter_mut() {
            if enrollment.subject_id == Some(id) {
                enrollment.subject_id = None;
            }
        }
        tables.subjects.remove(&id);
        Ok(())
    }

    async fn insert_lesson(&mut self, lesson: &Lesson) -> Result<(), StoreError> {
        self.tracker.touch("insert_lesson")?;
        let tables = &mut self.working;
        if tables.lessons.contains_key(&lesson.id) {
            return Err(unique("lessons_pkey"));
        }
        if !tables.subjects.contains_key(&lesson.subject_id) {
            return Err(missing("lessons_subject_id_fkey"));
        }
        tables.user_exists(Some(lesson.teacher_id), "lessons_teacher_id_fkey")?;
        tables.user_exists(lesson.student_id, "lessons_student_id_fkey")?;
        tables.lessons.insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn find_lesson(&mut self, id: LessonId) -> Result<Option<Lesson>, StoreError> {
        self.tracker.touch("find_lesson")?;
        Ok(self.working.lessons.get(&id).cloned())
    }

    async fn delete_lesson(&mut self, id: LessonId) -> Result<(), StoreError> {
        self.tracker.touch("delete_lesson")?;
        self.working
            .lessons
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("lesson"))
    }

    async fn find_enrollments_for_triple(
        &mut self,
        student_id: UserId,
        subject_id: SubjectId,
        teacher_id: UserId,
    ) -> Result<Vec<SubjectEnrollment>, StoreError> {
        self.tracker.touch("find_enrollments_for_triple")?;
        let mut rows: Vec<SubjectEnrollment> = self
            .working
            .enrollments
            .iter()
            .filter(|e| e.matches(student_id, subject_id, teacher_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn find_active_enrollments(
        &mut self,
        student_id: UserId,
        subject_id: SubjectId,
    ) -> Result<Vec<SubjectEnrollment>, StoreError> {
        self.tracker.touch("find_active_enrollments")?;
        Ok(self
            .working
            .enrollments
            .iter()
            .filter(|e| {
                e.is_active
                    && e.student_id == Some(student_id)
                    && e.subject_id == Some(subject_id)
            })
            .cloned()
            .collect())
    }

    async fn list_enrollments_for_student(
        &mut self,
        student_id: UserId,
    ) -> Result<Vec<SubjectEnrollment>, StoreError> {
        self.tracker.touch("list_enrollments_for_student")?;
        let mut rows: Vec<SubjectEnrollment> = self
            .working
            .enrollments
            .iter()
            .filter(|e| e.student_id == Some(student_id))
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.created_at);
        Ok(rows)
    }

    async fn insert_enrollment(
        &mut self,
        enrollment: &SubjectEnrollment,
    ) -> Result<(), StoreError> {
        self.tracker.touch("insert_enrollment")?;
        if self.working.enrollments.iter().any(|e| e.id == enrollment.id) {
            return Err(unique("subject_enrollments_pkey"));
        }
        self.working.check_enrollment(enrollment)?;
        self.working.enrollments.push(enrollment.clone());
        Ok(())
    }

    async fn update_enrollment(
        &mut self,
        enrollment: &SubjectEnrollment,
    ) -> Result<(), StoreError> {
        self.tracker.touch("update_enrollment")?;
        self.working.check_enrollment(enrollment)?;
        let row = self
            .working
            .enrollments
            .iter_mut()
            .find(|e| e.id == enrollment.id)
            .ok_or(StoreError::NotFound("enrollment"))?;
        *row = enrollment.clone();
        Ok(())
    }

    async fn insert_handoff(&mut self, handoff: &CredentialHandoff) -> Result<(), StoreError> {
        self.tracker.touch("insert_handoff")?;
        let tables = &mut self.working;
        if tables.handoffs.contains_key(&handoff.user_id) {
            return Err(unique("credential_handoffs_pkey"));
        }
        tables.user_exists(Some(handoff.user_id), "credential_handoffs_user_id_fkey")?;
        tables.user_exists(Some(handoff.issued_to), "credential_handoffs_issued_to_fkey")?;
        tables.handoffs.insert(handoff.user_id, handoff.clone());
        Ok(())
    }

    async fn take_handoff(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<CredentialHandoff>, StoreError> {
        self.tracker.touch("take_handoff")?;
        Ok(self.working.handoffs.remove(&user_id))
    }

    async fn purge_expired_handoffs(&mut self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.tracker.touch("purge_expired_handoffs")?;
        let before = self.working.handoffs.len();
        self.working.handoffs.retain(|_, handoff| !handoff.is_expired(now));
        Ok((before - self.working.handoffs.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tracker.touch("commit")?;
        let MemoryTx {
            mut committed,
            working,
            ..
        } = *self;
        *committed = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tracker.touch("rollback")?;
        Ok(())
    }
}
