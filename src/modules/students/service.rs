use anyhow::anyhow;
use chrono::Utc;
use tracing::{info, instrument, warn};
use tutordesk_cache::CacheTarget;
use tutordesk_config::AccountsConfig;
use tutordesk_core::AppError;
use tutordesk_db::{Store, StoreError, StoreTx, USERNAME_UNIQUE};
use tutordesk_models::{
    Account, CreateStudentWithParentDto, CreatedFamily, Email, ParentProfile, Profile, Role,
    StudentProfile, User, UserId,
};
use tutordesk_observability::track_account_created;

use crate::effects::Outcome;
use crate::modules::access::{require_admin, require_any_role, require_role, require_student_manager};
use crate::modules::credentials::{
    AllocatedCredentials, CredentialService, username_base_from_email, username_base_from_name,
};
use crate::modules::users::load_account;
use crate::modules::validation::{save_student_profile, validate_dto};
use crate::notifications::{Notification, NotificationEvent};

/// Attempts at creating a family when a concurrent request takes one of the
/// allocated usernames first.
pub const MAX_CREATE_ATTEMPTS: u32 = 3;

/// True when the store rejected an insert because the username was taken
/// after it had been allocated.
fn is_username_race(err: &AppError) -> bool {
    err.error
        .downcast_ref::<StoreError>()
        .is_some_and(|e| e.is_unique_violation_of(USERNAME_UNIQUE))
}

fn new_account_user(
    credentials: &AllocatedCredentials,
    email: Option<Email>,
    first_name: &str,
    last_name: &str,
    role: Role,
    creator: &User,
) -> User {
    let now = Utc::now();
    User {
        id: UserId::new(),
        username: credentials.username().clone(),
        email,
        first_name: first_name.trim().to_string(),
        last_name: last_name.trim().to_string(),
        password_hash: credentials.password_hash.clone(),
        role,
        is_active: true,
        is_verified: false,
        created_by: Some(creator.id),
        created_at: now,
        updated_at: now,
    }
}

async fn find_profile_or_404(
    tx: &mut dyn StoreTx,
    student_id: UserId,
) -> Result<StudentProfile, AppError> {
    tx.find_student_profile(student_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Student {student_id} not found")))
}

pub struct StudentService;

impl StudentService {
    /// Creates a student account and a parent account for a tutor, links
    /// them, and keeps the generated credentials for the tutor to claim.
    ///
    /// Either both accounts exist afterwards or neither does. The returned
    /// credentials are the only copy of the passwords outside the pending
    /// handoffs, which expire after `handoff_ttl_hours`.
    ///
    /// # Arguments
    /// * `store` - Store to open the transaction on
    /// * `config` - Password length, hash cost and handoff lifetime
    /// * `creator` - The tutor creating the family; linked as the student's tutor
    /// * `dto` - Student and parent details
    ///
    /// # Errors
    /// * `Authorization` when `creator` is not an active tutor. Nothing is
    ///   read from the store in that case.
    /// * `Validation` naming the offending field for bad input, or `username`
    ///   when a generated name was taken concurrently on every attempt.
    /// * `IdentifierExhausted` when no free username exists for a base.
    /// * `Transient` when the store fails; no rows are left behind.
    ///
    /// # Example
    /// ```ignore
    /// let family = StudentService::create_student_with_parent(&store, &config, &tutor, dto)
    ///     .await?
    ///     .apply(&hooks)
    ///     .await;
    /// println!("{}", family.student_credentials.username);
    /// ```
    #[instrument(skip_all, fields(creator_id = %creator.id))]
    pub async fn create_student_with_parent(
        store: &dyn Store,
        config: &AccountsConfig,
        creator: &User,
        dto: CreateStudentWithParentDto,
    ) -> Result<Outcome<CreatedFamily>, AppError> {
        require_role(creator, Role::Tutor)?;
        validate_dto(&dto)?;

        let student_email = dto
            .student
            .email
            .as_deref()
            .map(Email::new)
            .transpose()
            .map_err(|e| AppError::invalid_field("student.email", e))?;
        let parent_email = Email::new(dto.parent.email.as_str())
            .map_err(|e| AppError::invalid_field("parent.email", e))?;

        let mut attempt = 1;
        let family = loop {
            match Self::create_family(
                store,
                config,
                creator,
                &dto,
                student_email.clone(),
                parent_email.clone(),
            )
            .await
            {
                Ok(family) => break family,
                Err(err) if is_username_race(&err) && attempt < MAX_CREATE_ATTEMPTS => {
                    warn!(attempt, "Generated username taken concurrently, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        let (student, parent) = (&family.student.user, &family.parent.user);
        info!(
            student_id = %student.id,
            parent_id = %parent.id,
            "Student and parent created"
        );
        track_account_created(Role::Student.as_str());
        track_account_created(Role::Parent.as_str());

        let account_created = |user: &User| {
            Notification::new(
                creator.id,
                NotificationEvent::AccountCreated {
                    user_id: user.id,
                    username: user.username.clone(),
                    role: user.role,
                },
            )
        };
        let student_created = account_created(student);
        let parent_created = account_created(parent);
        let (student_id, parent_id) = (student.id, parent.id);

        Ok(Outcome::new(family)
            .invalidate(CacheTarget::Student {
                student: student_id,
                tutor: Some(creator.id),
            })
            .invalidate(CacheTarget::User(parent_id))
            .notify(student_created)
            .notify(parent_created))
    }

    async fn create_family(
        store: &dyn Store,
        config: &AccountsConfig,
        creator: &User,
        dto: &CreateStudentWithParentDto,
        student_email: Option<Email>,
        parent_email: Email,
    ) -> Result<CreatedFamily, AppError> {
        let mut tx = store.begin().await?;

        let base = username_base_from_name(&dto.student.first_name, &dto.student.last_name, "student");
        let student_credentials = CredentialService::allocate(tx.as_mut(), &base, config).await?;
        let student = new_account_user(
            &student_credentials,
            student_email,
            &dto.student.first_name,
            &dto.student.last_name,
            Role::Student,
            creator,
        );
        tx.insert_user(&student).await?;

        let mut profile = StudentProfile::new(
            student.id,
            dto.student.grade.trim().to_string(),
            dto.student.goal.trim().to_string(),
            student.created_at,
        );
        profile.tutor_id = Some(creator.id);
        save_student_profile(tx.as_mut(), &profile, true).await?;

        let base = username_base_from_email(&parent_email, "parent");
        let parent_credentials = CredentialService::allocate(tx.as_mut(), &base, config).await?;
        let parent = new_account_user(
            &parent_credentials,
            Some(parent_email),
            &dto.parent.first_name,
            &dto.parent.last_name,
            Role::Parent,
            creator,
        );
        tx.insert_user(&parent).await?;

        let parent_profile = ParentProfile {
            user_id: parent.id,
            messaging_channel_id: None,
            created_at: parent.created_at,
        };
        tx.insert_parent_profile(&parent_profile).await?;

        profile.parent_id = Some(parent.id);
        profile.generated_username = Some(student.username.clone());
        profile.updated_at = Utc::now();
        save_student_profile(tx.as_mut(), &profile, false).await?;

        let now = Utc::now();
        tx.insert_handoff(&student_credentials.handoff(student.id, creator.id, now, config))
            .await?;
        tx.insert_handoff(&parent_credentials.handoff(parent.id, creator.id, now, config))
            .await?;
        CredentialService::purge_expired(tx.as_mut(), now).await?;

        tx.commit().await?;

        Ok(CreatedFamily {
            student: Account {
                user: student,
                profile: Profile::Student(profile),
            },
            parent: Account {
                user: parent,
                profile: Profile::Parent(parent_profile),
            },
            student_credentials: student_credentials.credentials,
            parent_credentials: parent_credentials.credentials,
        })
    }

    /// Assigns, replaces or clears the student's tutor. Admin only.
    #[instrument(skip(store, actor), fields(actor_id = %actor.id))]
    pub async fn assign_tutor(
        store: &dyn Store,
        actor: &User,
        student_id: UserId,
        tutor_id: Option<UserId>,
    ) -> Result<Outcome<StudentProfile>, AppError> {
        require_admin(actor)?;

        let mut tx = store.begin().await?;
        let mut profile = find_profile_or_404(tx.as_mut(), student_id).await?;
        let previous = profile.tutor_id;

        profile.tutor_id = tutor_id;
        profile.updated_at = Utc::now();
        save_student_profile(tx.as_mut(), &profile, false).await?;
        tx.commit().await?;

        info!(?previous, ?tutor_id, "Tutor assigned");

        let mut outcome = Outcome::new(profile).invalidate(CacheTarget::Student {
            student: student_id,
            tutor: tutor_id,
        });
        if let Some(previous) = previous.filter(|p| Some(*p) != tutor_id) {
            outcome = outcome.invalidate(CacheTarget::TutorRoster(previous));
        }
        if let Some(tutor_id) = tutor_id.filter(|t| Some(*t) != previous) {
            outcome = outcome.notify(Notification::new(
                tutor_id,
                NotificationEvent::TutorAssigned { student_id },
            ));
        }
        Ok(outcome)
    }

    /// Links or unlinks the student's parent. Admins, or the student's tutor.
    ///
    /// Pending credentials of a parent who is unlinked here are discarded,
    /// since claims follow the current link.
    ///
    /// # Errors
    /// * `Authorization` for tutors who do not manage the student.
    /// * `Validation` on `parent` when the new parent is missing, inactive or
    ///   not a parent.
    /// * `NotFound` when the student has no profile.
    #[instrument(skip(store, actor), fields(actor_id = %actor.id))]
    pub async fn assign_parent(
        store: &dyn Store,
        actor: &User,
        student_id: UserId,
        parent_id: Option<UserId>,
    ) -> Result<Outcome<StudentProfile>, AppError> {
        require_any_role(actor, &[Role::Admin, Role::Tutor])?;

        let mut tx = store.begin().await?;
        let mut profile = find_profile_or_404(tx.as_mut(), student_id).await?;
        require_student_manager(actor, &profile)?;
        let previous = profile.parent_id;

        profile.parent_id = parent_id;
        profile.updated_at = Utc::now();
        save_student_profile(tx.as_mut(), &profile, false).await?;

        // Claims go through the current link, so an unlinked parent's
        // credentials could never be handed over.
        if let Some(previous) = previous.filter(|p| Some(*p) != parent_id) {
            if tx.take_handoff(previous).await?.is_some() {
                info!(parent_id = %previous, "Discarded pending credentials of unlinked parent");
            }
        }
        tx.commit().await?;

        info!(?previous, ?parent_id, "Parent linked");

        let tutor = profile.tutor_id;
        let mut outcome = Outcome::new(profile).invalidate(CacheTarget::Student {
            student: student_id,
            tutor,
        });
        if let Some(parent_id) = parent_id.filter(|p| Some(*p) != previous) {
            outcome = outcome.notify(Notification::new(
                parent_id,
                NotificationEvent::ParentLinked { student_id },
            ));
        }
        Ok(outcome)
    }

    /// Students assigned to `tutor_id`. Visible to that tutor and to admins.
    #[instrument(skip(store, actor), fields(actor_id = %actor.id))]
    pub async fn list_students_for_tutor(
        store: &dyn Store,
        actor: &User,
        tutor_id: UserId,
    ) -> Result<Vec<Account>, AppError> {
        require_any_role(actor, &[Role::Admin, Role::Tutor])?;
        if actor.role == Role::Tutor && actor.id != tutor_id {
            return Err(AppError::forbidden(anyhow!(
                "Tutor {} cannot list students of tutor {tutor_id}",
                actor.id
            )));
        }

        let mut tx = store.begin().await?;
        let profiles = tx.list_student_profiles_by_tutor(tutor_id).await?;

        let mut accounts = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let user = tx.find_user(profile.user_id).await?.ok_or_else(|| {
                AppError::internal(anyhow!("Profile {} has no user", profile.user_id))
            })?;
            accounts.push(load_account(tx.as_mut(), user).await?);
        }
        tx.commit().await?;

        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_username_conflicts_restart_creation() {
        let race: AppError = StoreError::UniqueViolation {
            constraint: USERNAME_UNIQUE.into(),
        }
        .into();
        assert!(is_username_race(&race));
        assert_eq!(race.field(), Some("username"));

        let other: AppError = StoreError::UniqueViolation {
            constraint: "subjects_name_key".into(),
        }
        .into();
        assert!(!is_username_race(&other));
        assert!(!is_username_race(&AppError::transient(anyhow!("reset"))));
    }
}
