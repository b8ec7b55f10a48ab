#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use fake::Fake;
use fake::faker::name::en::{FirstName, LastName};
use tutordesk::effects::Hooks;
use tutordesk::notifications::{Notification, Notifier};
use tutordesk::tutordesk_cache::{CacheInvalidator, CacheTarget};
use tutordesk::tutordesk_config::AccountsConfig;
use tutordesk::tutordesk_db::{MemoryStore, Store};
use tutordesk::tutordesk_models::{
    CreateStudentWithParentDto, CreateSubjectDto, CredentialHandoff, NewParentDto, NewStudentDto, ParentProfile,
    Role, StudentProfile, Subject, TeacherProfile, TutorProfile, User, UserId, Username,
};
use tutordesk::{StudentService, SubjectService};
use uuid::Uuid;

pub fn config() -> AccountsConfig {
    AccountsConfig::fast()
}

/// Inserts a user of `role` with its profile, bypassing the services.
pub async fn seed_user(store: &MemoryStore, role: Role, active: bool) -> User {
    let now = Utc::now();
    let first_name: String = FirstName().fake();
    let last_name: String = LastName().fake();
    let user = User {
        id: UserId::new(),
        username: Username::new(format!("{role}_{}", Uuid::new_v4().simple())).unwrap(),
        email: None,
        first_name,
        last_name,
        password_hash: String::new(),
        role,
        is_active: active,
        is_verified: true,
        created_by: None,
        created_at: now,
        updated_at: now,
    };

    let mut tx = store.begin().await.unwrap();
    tx.insert_user(&user).await.unwrap();
    match role {
        Role::Student => tx
            .insert_student_profile(&StudentProfile::new(
                user.id,
                "9".into(),
                String::new(),
                now,
            ))
            .await
            .unwrap(),
        Role::Parent => tx
            .insert_parent_profile(&ParentProfile {
                user_id: user.id,
                messaging_channel_id: None,
                created_at: now,
            })
            .await
            .unwrap(),
        Role::Teacher => tx
            .insert_teacher_profile(&TeacherProfile {
                user_id: user.id,
                subject: "Maths".into(),
                experience_years: 5,
                bio: String::new(),
                messaging_channel_id: None,
                created_at: now,
            })
            .await
            .unwrap(),
        Role::Tutor => tx
            .insert_tutor_profile(&TutorProfile {
                user_id: user.id,
                specialization: "Exam prep".into(),
                experience_years: 3,
                bio: String::new(),
                messaging_channel_id: None,
                created_at: now,
            })
            .await
            .unwrap(),
        Role::Admin => {}
    }
    tx.commit().await.unwrap();
    user
}

/// Inserts bare admin accounts holding `usernames`, to occupy those names.
pub async fn seed_usernames(store: &MemoryStore, usernames: impl IntoIterator<Item = String>) {
    let now = Utc::now();
    let mut tx = store.begin().await.unwrap();
    for username in usernames {
        let user = User {
            id: UserId::new(),
            username: Username::new(username).unwrap(),
            email: None,
            first_name: FirstName().fake(),
            last_name: LastName().fake(),
            password_hash: String::new(),
            role: Role::Admin,
            is_active: true,
            is_verified: true,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        tx.insert_user(&user).await.unwrap();
    }
    tx.commit().await.unwrap();
}

/// Stores a handoff for `owner` issued to `tutor` that expired an hour ago.
pub async fn seed_expired_handoff(store: &MemoryStore, owner: &User, tutor: &User) {
    let now = Utc::now();
    let mut tx = store.begin().await.unwrap();
    tx.insert_handoff(&CredentialHandoff {
        user_id: owner.id,
        username: owner.username.clone(),
        password: "stale-password".into(),
        issued_to: tutor.id,
        expires_at: now - chrono::Duration::hours(1),
        created_at: now - chrono::Duration::hours(73),
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();
}

pub fn family_dto(first_name: &str, last_name: &str, parent_email: &str) -> CreateStudentWithParentDto {
    CreateStudentWithParentDto {
        student: NewStudentDto {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            grade: "9".into(),
            goal: "Pass the maths exam".into(),
        },
        parent: NewParentDto {
            first_name: String::new(),
            last_name: last_name.into(),
            email: parent_email.into(),
        },
    }
}

pub fn ivan_petrov() -> CreateStudentWithParentDto {
    family_dto("Ivan", "Petrov", "olga@example.com")
}

/// Creates a family through the service and returns the student and parent.
pub async fn create_family(store: &MemoryStore, tutor: &User) -> (User, User) {
    let first_name: String = FirstName().fake();
    let last_name: String = LastName().fake();
    let email = format!("parent{}@example.com", Uuid::new_v4().simple());
    let family = StudentService::create_student_with_parent(
        store,
        &config(),
        tutor,
        family_dto(&first_name, &last_name, &email),
    )
    .await
    .unwrap()
    .into_value();
    (family.student.user, family.parent.user)
}

pub async fn create_subject(store: &MemoryStore, admin: &User, name: &str) -> Subject {
    SubjectService::create_subject(
        store,
        admin,
        CreateSubjectDto {
            name: name.into(),
            description: String::new(),
        },
    )
    .await
    .unwrap()
    .into_value()
}

/// Records invalidated targets and notifications for assertions.
#[derive(Default)]
pub struct Recorder {
    pub targets: Mutex<Vec<CacheTarget>>,
    pub notifications: Mutex<Vec<Notification>>,
}

impl Recorder {
    pub fn hooks(self: &Arc<Self>) -> Hooks {
        Hooks::new(self.clone(), self.clone())
    }

    pub fn targets(&self) -> Vec<CacheTarget> {
        self.targets.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheInvalidator for Recorder {
    async fn invalidate(&self, target: &CacheTarget) {
        self.targets.lock().unwrap().push(*target);
    }
}

impl Notifier for Recorder {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
