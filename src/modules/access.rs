//! Role checks on the acting user.
//!
//! The authentication layer supplies the actor; these checks only compare
//! roles and relationships. They run before any write.

use anyhow::anyhow;
use tutordesk_core::AppError;
use tutordesk_models::{Role, StudentProfile, User};

/// Actor must be active and hold `role`.
pub fn require_role(actor: &User, role: Role) -> Result<(), AppError> {
    require_any_role(actor, &[role])
}

/// Actor must be active and hold one of `roles`.
pub fn require_any_role(actor: &User, roles: &[Role]) -> Result<(), AppError> {
    if !actor.is_active {
        return Err(AppError::forbidden(anyhow!(
            "User {} is inactive",
            actor.id
        )));
    }
    if !roles.contains(&actor.role) {
        return Err(AppError::forbidden(anyhow!(
            "Role {} is not permitted, expected one of {:?}",
            actor.role,
            roles
        )));
    }
    Ok(())
}

pub fn require_admin(actor: &User) -> Result<(), AppError> {
    require_role(actor, Role::Admin)
}

/// Admins, or the tutor the student is assigned to.
pub fn require_student_manager(actor: &User, profile: &StudentProfile) -> Result<(), AppError> {
    require_any_role(actor, &[Role::Admin, Role::Tutor])?;
    if actor.role == Role::Tutor && profile.tutor_id != Some(actor.id) {
        return Err(AppError::forbidden(anyhow!(
            "Tutor {} does not manage student {}",
            actor.id,
            profile.user_id
        )));
    }
    Ok(())
}
