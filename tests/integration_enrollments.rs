mod common;

use std::sync::Arc;

use common::{Recorder, create_family, create_subject, seed_user};
use tutordesk::notifications::NotificationEvent;
use tutordesk::tutordesk_cache::CacheTarget;
use tutordesk::tutordesk_core::ErrorKind;
use tutordesk::tutordesk_db::MemoryStore;
use tutordesk::tutordesk_models::{EnrollmentStatus, Role, SubjectId, User};
use tutordesk::{EnrollmentService, UserService};

struct School {
    store: MemoryStore,
    admin: User,
    tutor: User,
    teacher: User,
    student: User,
}

async fn school() -> School {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin, true).await;
    let tutor = seed_user(&store, Role::Tutor, true).await;
    let teacher = seed_user(&store, Role::Teacher, true).await;
    let (student, _) = create_family(&store, &tutor).await;
    School {
        store,
        admin,
        tutor,
        teacher,
        student,
    }
}

#[tokio::test]
async fn test_assign_subject_creates_and_notifies_teacher() {
    let s = school().await;
    let maths = create_subject(&s.store, &s.admin, "Maths").await;
    let recorder = Arc::new(Recorder::default());

    let enrollment =
        EnrollmentService::assign_subject(&s.store, &s.tutor, s.student.id, maths.id, s.teacher.id)
            .await
            .unwrap()
            .apply(&recorder.hooks())
            .await;

    assert!(enrollment.is_active);
    assert_eq!(enrollment.status, EnrollmentStatus::Active);
    assert_eq!(enrollment.assigned_by, Some(s.tutor.id));
    assert!(enrollment.matches(s.student.id, maths.id, s.teacher.id));

    assert_eq!(recorder.targets(), vec![CacheTarget::Enrollments(s.student.id)]);
    let notifications = recorder.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].recipient, s.teacher.id);
    assert_eq!(
        notifications[0].event,
        NotificationEvent::SubjectAssigned {
            student_id: s.student.id,
            subject_id: maths.id,
        }
    );
}

#[tokio::test]
async fn test_assigning_twice_returns_the_active_row() {
    let s = school().await;
    let maths = create_subject(&s.store, &s.admin, "Maths").await;

    let first =
        EnrollmentService::assign_subject(&s.store, &s.tutor, s.student.id, maths.id, s.teacher.id)
            .await
            .unwrap()
            .into_value();
    let again =
        EnrollmentService::assign_subject(&s.store, &s.admin, s.student.id, maths.id, s.teacher.id)
            .await
            .unwrap();

    assert!(again.effects.is_empty());
    assert_eq!(again.value, first);
    assert_eq!(s.store.row_counts().await.enrollments, 1);
}

#[tokio::test]
async fn test_reassignment_reactivates_the_same_row() {
    let s = school().await;
    let maths = create_subject(&s.store, &s.admin, "Maths").await;

    let original =
        EnrollmentService::assign_subject(&s.store, &s.tutor, s.student.id, maths.id, s.teacher.id)
            .await
            .unwrap()
            .into_value();

    let dropped = EnrollmentService::unassign_subject(&s.store, &s.tutor, s.student.id, maths.id)
        .await
        .unwrap()
        .into_value();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].id, original.id);
    assert!(!dropped[0].is_active);
    assert_eq!(dropped[0].status, EnrollmentStatus::Dropped);

    let active = EnrollmentService::list_enrollments(&s.store, s.student.id, false)
        .await
        .unwrap();
    assert!(active.is_empty());

    let reactivated =
        EnrollmentService::assign_subject(&s.store, &s.admin, s.student.id, maths.id, s.teacher.id)
            .await
            .unwrap()
            .into_value();
    assert_eq!(reactivated.id, original.id);
    assert!(reactivated.is_active);
    assert_eq!(reactivated.status, EnrollmentStatus::Active);
    assert_eq!(reactivated.assigned_by, Some(s.admin.id));

    let all = EnrollmentService::list_enrollments(&s.store, s.student.id, true)
        .await
        .unwrap();
    assert_eq!(all, vec![reactivated]);
}

#[tokio::test]
async fn test_unassign_covers_every_teacher() {
    let s = school().await;
    let maths = create_subject(&s.store, &s.admin, "Maths").await;
    let second_teacher = seed_user(&s.store, Role::Teacher, true).await;

    for teacher in [&s.teacher, &second_teacher] {
        EnrollmentService::assign_subject(&s.store, &s.tutor, s.student.id, maths.id, teacher.id)
            .await
            .unwrap()
            .into_value();
    }

    let outcome = EnrollmentService::unassign_subject(&s.store, &s.tutor, s.student.id, maths.id)
        .await
        .unwrap();
    assert_eq!(outcome.value.len(), 2);
    assert!(outcome.value.iter().all(|e| !e.is_active));
    assert_eq!(outcome.notifications().count(), 2);

    let err = EnrollmentService::unassign_subject(&s.store, &s.tutor, s.student.id, maths.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_assignment_checks_teacher_and_subject() {
    let s = school().await;
    let maths = create_subject(&s.store, &s.admin, "Maths").await;
    let inactive_teacher = seed_user(&s.store, Role::Teacher, false).await;

    for teacher in [&inactive_teacher, &s.tutor] {
        let err = EnrollmentService::assign_subject(
            &s.store,
            &s.tutor,
            s.student.id,
            maths.id,
            teacher.id,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.field(), Some("teacher"));
    }

    let err = EnrollmentService::assign_subject(
        &s.store,
        &s.tutor,
        s.student.id,
        SubjectId::new(),
        s.teacher.id,
    )
    .await
    .unwrap_err();
    assert_eq!(err.field(), Some("subject"));

    // Only students can be enrolled
    let err =
        EnrollmentService::assign_subject(&s.store, &s.admin, s.teacher.id, maths.id, s.teacher.id)
            .await
            .unwrap_err();
    assert_eq!(err.field(), Some("student"));

    assert_eq!(s.store.row_counts().await.enrollments, 0);
}

#[tokio::test]
async fn test_only_the_students_tutor_or_an_admin_assigns() {
    let s = school().await;
    let maths = create_subject(&s.store, &s.admin, "Maths").await;
    let other_tutor = seed_user(&s.store, Role::Tutor, true).await;

    for actor in [&other_tutor, &s.teacher] {
        let err =
            EnrollmentService::assign_subject(&s.store, actor, s.student.id, maths.id, s.teacher.id)
                .await
                .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authorization);
    }

    // A deactivated tutor loses access as well
    UserService::set_active(&s.store, &s.admin, s.tutor.id, false)
        .await
        .unwrap()
        .into_value();
    let mut inactive_tutor = s.tutor.clone();
    inactive_tutor.is_active = false;
    let err = EnrollmentService::assign_subject(
        &s.store,
        &inactive_tutor,
        s.student.id,
        maths.id,
        s.teacher.id,
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);
}
