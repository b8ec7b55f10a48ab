mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{Recorder, create_family, create_subject, seed_user};
use tutordesk::tutordesk_cache::CacheTarget;
use tutordesk::tutordesk_core::ErrorKind;
use tutordesk::tutordesk_db::{MemoryStore, Store};
use tutordesk::tutordesk_models::{Role, ScheduleLessonDto, SubjectId, User};
use tutordesk::{EnrollmentService, SubjectService, UserService};

async fn enroll(store: &MemoryStore, tutor: &User, student: &User, subject: SubjectId, teacher: &User) {
    EnrollmentService::assign_subject(store, tutor, student.id, subject, teacher.id)
        .await
        .unwrap()
        .into_value();
}

#[tokio::test]
async fn test_subject_with_active_enrollment_cannot_be_deleted() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin, true).await;
    let tutor = seed_user(&store, Role::Tutor, true).await;
    let teacher = seed_user(&store, Role::Teacher, true).await;
    let (student, _) = create_family(&store, &tutor).await;
    let subject = create_subject(&store, &admin, "Physics").await;
    enroll(&store, &tutor, &student, subject.id, &teacher).await;

    let err = SubjectService::delete_subject(&store, &admin, subject.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ProtectedReference);
    assert_eq!(err.status.as_u16(), 400);

    EnrollmentService::unassign_subject(&store, &tutor, student.id, subject.id)
        .await
        .unwrap()
        .into_value();
    SubjectService::delete_subject(&store, &admin, subject.id)
        .await
        .unwrap()
        .into_value();

    // History survives with the subject cleared
    let history = EnrollmentService::list_enrollments(&store, student.id, true)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].subject_id, None);
    assert!(!history[0].is_active);
}

#[tokio::test]
async fn test_enrolled_users_cannot_be_deleted() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin, true).await;
    let tutor = seed_user(&store, Role::Tutor, true).await;
    let teacher = seed_user(&store, Role::Teacher, true).await;
    let (student, _) = create_family(&store, &tutor).await;
    let subject = create_subject(&store, &admin, "Chemistry").await;
    enroll(&store, &tutor, &student, subject.id, &teacher).await;

    for user in [&student, &teacher] {
        let err = UserService::delete_user(&store, &admin, user.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtectedReference, "{}", user.role);
    }

    EnrollmentService::unassign_subject(&store, &admin, student.id, subject.id)
        .await
        .unwrap()
        .into_value();
    UserService::delete_user(&store, &admin, teacher.id)
        .await
        .unwrap()
        .into_value();

    let history = EnrollmentService::list_enrollments(&store, student.id, true)
        .await
        .unwrap();
    assert_eq!(history[0].teacher_id, None);
    assert_eq!(history[0].subject_id, Some(subject.id));
}

#[tokio::test]
async fn test_lessons_always_protect() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin, true).await;
    let teacher = seed_user(&store, Role::Teacher, true).await;
    let subject = create_subject(&store, &admin, "Biology").await;

    let lesson = SubjectService::schedule_lesson(
        &store,
        &teacher,
        ScheduleLessonDto {
            subject_id: subject.id,
            teacher_id: teacher.id,
            student_id: None,
            starts_at: Utc::now() + Duration::days(1),
            duration_minutes: 60,
        },
    )
    .await
    .unwrap()
    .into_value();

    let err = UserService::delete_user(&store, &admin, teacher.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ProtectedReference);
    let err = SubjectService::delete_subject(&store, &admin, subject.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ProtectedReference);

    SubjectService::cancel_lesson(&store, &teacher, lesson.id)
        .await
        .unwrap()
        .into_value();
    SubjectService::delete_subject(&store, &admin, subject.id)
        .await
        .unwrap()
        .into_value();
    UserService::delete_user(&store, &admin, teacher.id)
        .await
        .unwrap()
        .into_value();
}

#[tokio::test]
async fn test_teachers_schedule_only_their_own_lessons() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin, true).await;
    let teacher = seed_user(&store, Role::Teacher, true).await;
    let colleague = seed_user(&store, Role::Teacher, true).await;
    let subject = create_subject(&store, &admin, "History").await;

    let dto = ScheduleLessonDto {
        subject_id: subject.id,
        teacher_id: colleague.id,
        student_id: None,
        starts_at: Utc::now(),
        duration_minutes: 45,
    };
    let err = SubjectService::schedule_lesson(&store, &teacher, dto.clone())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);

    let lesson = SubjectService::schedule_lesson(&store, &admin, dto)
        .await
        .unwrap()
        .into_value();
    let err = SubjectService::cancel_lesson(&store, &teacher, lesson.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);
}

#[tokio::test]
async fn test_deleting_linked_accounts_clears_the_links() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin, true).await;
    let tutor = seed_user(&store, Role::Tutor, true).await;
    let (student, parent) = create_family(&store, &tutor).await;

    UserService::delete_user(&store, &admin, parent.id)
        .await
        .unwrap()
        .into_value();
    // The parent's pending credentials went with the account
    assert_eq!(store.row_counts().await.handoffs, 1);

    UserService::delete_user(&store, &admin, tutor.id)
        .await
        .unwrap()
        .into_value();

    let mut tx = store.begin().await.unwrap();
    let profile = tx.find_student_profile(student.id).await.unwrap().unwrap();
    let student = tx.find_user(student.id).await.unwrap().unwrap();
    drop(tx);

    assert_eq!(profile.parent_id, None);
    assert_eq!(profile.tutor_id, None);
    assert_eq!(student.created_by, None);
    assert_eq!(store.row_counts().await.handoffs, 0);
}

#[tokio::test]
async fn test_deleting_linked_accounts_invalidates_their_students() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin, true).await;
    let tutor = seed_user(&store, Role::Tutor, true).await;
    let (first, parent) = create_family(&store, &tutor).await;
    let (second, _) = create_family(&store, &tutor).await;

    let recorder = Arc::new(Recorder::default());
    UserService::delete_user(&store, &admin, parent.id)
        .await
        .unwrap()
        .apply(&recorder.hooks())
        .await;
    assert_eq!(
        recorder.targets(),
        vec![
            CacheTarget::User(parent.id),
            CacheTarget::Student {
                student: first.id,
                tutor: Some(tutor.id),
            },
        ]
    );

    let recorder = Arc::new(Recorder::default());
    UserService::delete_user(&store, &admin, tutor.id)
        .await
        .unwrap()
        .apply(&recorder.hooks())
        .await;
    let targets = recorder.targets();
    assert!(targets.contains(&CacheTarget::TutorRoster(tutor.id)));
    for student in [&first, &second] {
        assert!(targets.contains(&CacheTarget::Student {
            student: student.id,
            tutor: None,
        }));
    }

    // Teachers have no linked students
    let teacher = seed_user(&store, Role::Teacher, true).await;
    let outcome = UserService::delete_user(&store, &admin, teacher.id)
        .await
        .unwrap();
    assert_eq!(outcome.effects.len(), 1);
}

#[tokio::test]
async fn test_admins_cannot_delete_themselves() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin, true).await;

    let err = UserService::delete_user(&store, &admin, admin.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let tutor = seed_user(&store, Role::Tutor, true).await;
    let err = UserService::delete_user(&store, &tutor, admin.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);
}
