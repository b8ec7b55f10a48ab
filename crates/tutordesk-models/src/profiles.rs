//! Role profiles and the [`Account`] view that pairs a user with its profile.
//!
//! Profile access is a match on [`Profile`]; a user of role `Student` always
//! carries `Profile::Student`, and so on.

use crate::ids::UserId;
use crate::users::{Role, User};
use crate::value_types::Username;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Serialize, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct StudentProfile {
    pub user_id: UserId,
    pub grade: String,
    pub goal: String,
    pub tutor_id: Option<UserId>,
    pub parent_id: Option<UserId>,
    /// Login issued on the student's behalf, kept for the tutor's reference.
    pub generated_username: Option<Username>,
    pub messaging_channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentProfile {
    pub fn new(user_id: UserId, grade: String, goal: String, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            grade,
            goal,
            tutor_id: None,
            parent_id: None,
            generated_username: None,
            messaging_channel_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Serialize, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct ParentProfile {
    pub user_id: UserId,
    pub messaging_channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct TeacherProfile {
    pub user_id: UserId,
    pub subject: String,
    pub experience_years: i32,
    pub bio: String,
    pub messaging_channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct TutorProfile {
    pub user_id: UserId,
    pub specialization: String,
    pub experience_years: i32,
    pub bio: String,
    pub messaging_channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The role-specific half of an account.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    Student(StudentProfile),
    Teacher(TeacherProfile),
    Tutor(TutorProfile),
    Parent(ParentProfile),
    Admin,
}

impl Profile {
    /// The role this profile belongs to.
    pub fn role(&self) -> Role {
        match self {
            Profile::Student(_) => Role::Student,
            Profile::Teacher(_) => Role::Teacher,
            Profile::Tutor(_) => Role::Tutor,
            Profile::Parent(_) => Role::Parent,
            Profile::Admin => Role::Admin,
        }
    }
}

/// A user together with its profile.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user: User,
    pub profile: Profile,
}

impl Account {
    pub fn student_profile(&self) -> Option<&StudentProfile> {
        match &self.profile {
            Profile::Student(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn parent_profile(&self) -> Option<&ParentProfile> {
        match &self.profile {
            Profile::Parent(profile) => Some(profile),
            _ => None,
        }
    }
}
