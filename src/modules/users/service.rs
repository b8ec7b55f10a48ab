use anyhow::anyhow;
use chrono::Utc;
use tracing::{info, instrument};
use tutordesk_cache::CacheTarget;
use tutordesk_config::AccountsConfig;
use tutordesk_core::{AppError, hash_password_with_cost};
use tutordesk_db::{Store, StoreTx};
use tutordesk_models::{
    Account, Email, ParentProfile, Profile, RegisterUserDto, Role, StudentProfile, TeacherProfile,
    TutorProfile, User, UserId, Username,
};
use tutordesk_observability::track_account_created;

use crate::effects::Outcome;
use crate::modules::access::require_admin;
use crate::modules::validation::{save_student_profile, validate_dto};

/// Reads the profile matching `user.role` and pairs it with the user.
///
/// A non-admin user without a profile is a broken invariant, not a client
/// error.
pub async fn load_account(tx: &mut dyn StoreTx, user: User) -> Result<Account, AppError> {
    let missing = || AppError::internal(anyhow!("User {} has no {} profile", user.id, user.role));

    let profile = match user.role {
        Role::Student => Profile::Student(
            tx.find_student_profile(user.id)
                .await?
                .ok_or_else(missing)?,
        ),
        Role::Parent => Profile::Parent(
            tx.find_parent_profile(user.id)
                .await?
                .ok_or_else(missing)?,
        ),
        Role::Teacher => Profile::Teacher(
            tx.find_teacher_profile(user.id)
                .await?
                .ok_or_else(missing)?,
        ),
        Role::Tutor => Profile::Tutor(
            tx.find_tutor_profile(user.id)
                .await?
                .ok_or_else(missing)?,
        ),
        Role::Admin => Profile::Admin,
    };

    Ok(Account { user, profile })
}

async fn find_user_or_404(tx: &mut dyn StoreTx, user_id: UserId) -> Result<User, AppError> {
    tx.find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User {user_id} not found")))
}

pub struct UserService;

impl UserService {
    /// Self-registration. Creates the user and the profile for its role in
    /// one transaction; admins cannot register themselves.
    ///
    /// # Errors
    /// * `Authorization` for the admin role.
    /// * `Validation` on the offending field, including `username` when the
    ///   name is taken. Usernames compare after trimming and lowercasing.
    #[instrument(skip(store, config, dto), fields(username = %dto.username, role = %dto.role))]
    pub async fn register(
        store: &dyn Store,
        config: &AccountsConfig,
        dto: RegisterUserDto,
    ) -> Result<Outcome<Account>, AppError> {
        validate_dto(&dto)?;
        if !dto.role.can_self_register() {
            return Err(AppError::forbidden(anyhow!(
                "Role {} cannot self-register",
                dto.role
            )));
        }

        let username = Username::new(dto.username.trim().to_lowercase())
            .map_err(|e| AppError::invalid_field("username", e))?;
        let email = dto
            .email
            .as_deref()
            .map(Email::new)
            .transpose()
            .map_err(|e| AppError::invalid_field("email", e))?;
        let password_hash = hash_password_with_cost(&dto.password, config.password_hash_cost)?;

        let mut tx = store.begin().await?;

        if tx.find_user_by_username(&username).await?.is_some() {
            return Err(AppError::invalid_field(
                "username",
                anyhow!("Username {username} is already taken"),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            username,
            email,
            first_name: dto.first_name.trim().to_string(),
            last_name: dto.last_name.trim().to_string(),
            password_hash,
            role: dto.role,
            is_active: true,
            is_verified: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        tx.insert_user(&user).await?;

        let profile = match dto.role {
            Role::Student => {
                let profile = StudentProfile::new(
                    user.id,
                    dto.grade.unwrap_or_default(),
                    dto.goal.unwrap_or_default(),
                    now,
                );
                save_student_profile(tx.as_mut(), &profile, true).await?;
                Profile::Student(profile)
            }
            Role::Parent => {
                let profile = ParentProfile {
                    user_id: user.id,
                    messaging_channel_id: None,
                    created_at: now,
                };
                tx.insert_parent_profile(&profile).await?;
                Profile::Parent(profile)
            }
            Role::Teacher => {
                let profile = TeacherProfile {
                    user_id: user.id,
                    subject: dto.subject.unwrap_or_default(),
                    experience_years: dto.experience_years.unwrap_or(0),
                    bio: dto.bio.unwrap_or_default(),
                    messaging_channel_id: None,
                    created_at: now,
                };
                tx.insert_teacher_profile(&profile).await?;
                Profile::Teacher(profile)
            }
            Role::Tutor => {
                let profile = TutorProfile {
                    user_id: user.id,
                    specialization: dto.subject.unwrap_or_default(),
                    experience_years: dto.experience_years.unwrap_or(0),
                    bio: dto.bio.unwrap_or_default(),
                    messaging_channel_id: None,
                    created_at: now,
                };
                tx.insert_tutor_profile(&profile).await?;
                Profile::Tutor(profile)
            }
            Role::Admin => {
                return Err(AppError::internal(anyhow!("Admin reached registration")));
            }
        };

        tx.commit().await?;

        info!(user_id = %user.id, "User registered");
        track_account_created(user.role.as_str());

        let target = CacheTarget::User(user.id);
        Ok(Outcome::new(Account { user, profile }).invalidate(target))
    }

    #[instrument(skip(store))]
    pub async fn get_account(store: &dyn Store, user_id: UserId) -> Result<Account, AppError> {
        let mut tx = store.begin().await?;
        let user = find_user_or_404(tx.as_mut(), user_id).await?;
        let account = load_account(tx.as_mut(), user).await?;
        tx.commit().await?;
        Ok(account)
    }

    /// Activates or deactivates an account. Deactivated tutors and parents
    /// can no longer be linked to students.
    #[instrument(skip(store, actor), fields(actor_id = %actor.id))]
    pub async fn set_active(
        store: &dyn Store,
        actor: &User,
        user_id: UserId,
        active: bool,
    ) -> Result<Outcome<User>, AppError> {
        require_admin(actor)?;

        let mut tx = store.begin().await?;
        let mut user = find_user_or_404(tx.as_mut(), user_id).await?;

        if user.is_active == active {
            tx.commit().await?;
            return Ok(Outcome::new(user));
        }

        user.is_active = active;
        user.updated_at = Utc::now();
        tx.update_user(&user).await?;
        tx.commit().await?;

        info!(%user_id, active, "User activity changed");

        let mut outcome = Outcome::new(user).invalidate(CacheTarget::User(user_id));
        if outcome.value.role == Role::Tutor {
            outcome = outcome.invalidate(CacheTarget::TutorRoster(user_id));
        }
        Ok(outcome)
    }

    /// Deletes an account. Refused while active enrollments or lessons
    /// reference the user.
    ///
    /// Students linked to a deleted tutor or parent lose the link, and their
    /// cached profiles are invalidated along with the user's own entries.
    ///
    /// # Arguments
    /// * `actor` - An active admin other than the target
    /// * `user_id` - The account to delete
    ///
    /// # Errors
    /// * `Authorization` unless `actor` is an active admin.
    /// * `Validation` when an admin targets their own account.
    /// * `NotFound` for an unknown user.
    /// * `ProtectedReference` while active enrollments or lessons depend on
    ///   the user.
    #[instrument(skip(store, actor), fields(actor_id = %actor.id))]
    pub async fn delete_user(
        store: &dyn Store,
        actor: &User,
        user_id: UserId,
    ) -> Result<Outcome<()>, AppError> {
        require_admin(actor)?;
        if actor.id == user_id {
            return Err(AppError::validation(anyhow!("Admins cannot delete themselves")));
        }

        let mut tx = store.begin().await?;
        let user = find_user_or_404(tx.as_mut(), user_id).await?;

        // Student profiles whose cached form changes with this deletion,
        // paired with the tutor they stay linked to afterwards.
        let affected: Vec<(UserId, Option<UserId>)> = match user.role {
            Role::Student => tx
                .find_student_profile(user_id)
                .await?
                .map(|profile| vec![(user_id, profile.tutor_id)])
                .unwrap_or_default(),
            Role::Tutor => tx
                .list_student_profiles_by_tutor(user_id)
                .await?
                .into_iter()
                .map(|profile| (profile.user_id, None))
                .collect(),
            Role::Parent => tx
                .list_student_profiles_by_parent(user_id)
                .await?
                .into_iter()
                .map(|profile| (profile.user_id, profile.tutor_id))
                .collect(),
            Role::Teacher | Role::Admin => Vec::new(),
        };

        tx.delete_user(user_id).await?;
        tx.commit().await?;

        info!(%user_id, role = %user.role, unlinked = affected.len(), "User deleted");

        let mut outcome = Outcome::new(()).invalidate(CacheTarget::User(user_id));
        if user.role == Role::Tutor {
            outcome = outcome.invalidate(CacheTarget::TutorRoster(user_id));
        }
        for (student, tutor) in affected {
            outcome = outcome.invalidate(CacheTarget::Student { student, tutor });
        }
        Ok(outcome)
    }
}
