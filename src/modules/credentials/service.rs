use std::collections::HashSet;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use tutordesk_config::AccountsConfig;
use tutordesk_core::{AppError, hash_password_with_cost};
use tutordesk_db::{Store, StoreTx};
use tutordesk_models::{
    ClaimedCredentials, CredentialHandoff, GeneratedCredentials, Role, User, UserId, Username,
};

use super::generator::{generate_password, generate_unique_username};
use crate::modules::access::require_role;

/// A freshly allocated login: the plaintext pair for the handoff and the
/// hash to store on the user.
#[derive(Debug, Clone)]
pub struct AllocatedCredentials {
    pub credentials: GeneratedCredentials,
    pub password_hash: String,
}

impl AllocatedCredentials {
    pub fn username(&self) -> &Username {
        &self.credentials.username
    }

    /// Handoff row for `user_id`, claimable by `issued_to` until `now + ttl`.
    pub fn handoff(
        &self,
        user_id: UserId,
        issued_to: UserId,
        now: DateTime<Utc>,
        config: &AccountsConfig,
    ) -> CredentialHandoff {
        CredentialHandoff {
            user_id,
            username: self.credentials.username.clone(),
            password: self.credentials.password.clone(),
            issued_to,
            expires_at: now + chrono::Duration::hours(config.handoff_ttl_hours),
            created_at: now,
        }
    }
}

pub struct CredentialService;

impl CredentialService {
    /// Picks a username free in the store for `base` and generates a password.
    ///
    /// Reads happen inside `tx`, so names inserted earlier in the same
    /// transaction are seen. A concurrent transaction can still take the same
    /// name; the store's unique constraint reports that at insert time.
    #[instrument(skip(tx, config))]
    pub async fn allocate(
        tx: &mut dyn StoreTx,
        base: &str,
        config: &AccountsConfig,
    ) -> Result<AllocatedCredentials, AppError> {
        let taken: HashSet<String> = tx.usernames_with_prefix(base).await?.into_iter().collect();
        let username = generate_unique_username(base, |candidate| taken.contains(candidate))?;
        let username = Username::new(username).map_err(AppError::internal)?;

        let password = generate_password(config.generated_password_length);
        let password_hash = hash_password_with_cost(&password, config.password_hash_cost)?;

        debug!(username = %username, "Allocated credentials");

        Ok(AllocatedCredentials {
            credentials: GeneratedCredentials { username, password },
            password_hash,
        })
    }

    /// Hands the pending credentials for a student and their parent to the
    /// tutor who issued them, deleting them in the process.
    ///
    /// Expired handoffs are purged without being returned. Credentials issued
    /// to someone else, or none at all, read as not found.
    ///
    /// # Arguments
    /// * `tutor` - The tutor who created the student
    /// * `student_id` - The student whose family credentials to hand over
    ///
    /// # Errors
    /// * `Authorization` unless `tutor` is an active tutor.
    /// * `NotFound` when nothing is pending for this tutor.
    #[instrument(skip_all, fields(tutor_id = %tutor.id, %student_id))]
    pub async fn claim(
        store: &dyn Store,
        tutor: &User,
        student_id: UserId,
    ) -> Result<ClaimedCredentials, AppError> {
        require_role(tutor, Role::Tutor)?;

        let mut tx = store.begin().await?;
        let profile = tx
            .find_student_profile(student_id)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Student not found")))?;

        let now = Utc::now();
        Self::purge_expired(tx.as_mut(), now).await?;
        let mut claimed = ClaimedCredentials::default();

        claimed.student = Self::take(tx.as_mut(), student_id, tutor.id, now).await?;
        if let Some(parent_id) = profile.parent_id {
            claimed.parent = Self::take(tx.as_mut(), parent_id, tutor.id, now).await?;
        }

        tx.commit().await?;

        if claimed.student.is_none() && claimed.parent.is_none() {
            return Err(AppError::not_found(anyhow!(
                "No pending credentials for student {student_id}"
            )));
        }
        Ok(claimed)
    }

    /// Deletes every handoff past its expiry, whoever it was issued to.
    pub async fn purge_expired(tx: &mut dyn StoreTx, now: DateTime<Utc>) -> Result<u64, AppError> {
        let purged = tx.purge_expired_handoffs(now).await?;
        if purged > 0 {
            debug!(purged, "Purged expired credential handoffs");
        }
        Ok(purged)
    }

    async fn take(
        tx: &mut dyn StoreTx,
        user_id: UserId,
        tutor_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<GeneratedCredentials>, AppError> {
        match tx.take_handoff(user_id).await? {
            Some(handoff) if handoff.issued_to != tutor_id => Err(AppError::not_found(anyhow!(
                "No pending credentials for user {user_id}"
            ))),
            Some(handoff) if handoff.is_expired(now) => {
                debug!(%user_id, "Purged expired credential handoff");
                Ok(None)
            }
            Some(handoff) => Ok(Some(handoff.into_credentials())),
            None => Ok(None),
        }
    }
}
