//! User account use-case service.
//!
//! Thin facade over the user repository; credential hashing and session
//! handling live in the API layer.

use crate::model::user::{Role, User, UserId};
use crate::model::ValidationError;
use crate::repo::user_repo::UserRepository;
use crate::repo::{RepoError, RepoResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for user account use-cases.
#[derive(Debug)]
pub enum UserServiceError {
    UserNotFound(UserId),
    UsernameTaken(String),
    Validation(ValidationError),
    Repo(RepoError),
    InconsistentState(&'static str),
}

impl Display for UserServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::UsernameTaken(username) => write!(f, "username already taken: `{username}`"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent user state: {details}"),
        }
    }
}

impl Error for UserServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

/// User service facade over repository implementations.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates an account; usernames are normalized to lowercase.
    pub fn create_user(&self, mut user: User) -> Result<User, UserServiceError> {
        user.username = user.username.trim().to_lowercase();
        user.validate().map_err(UserServiceError::Validation)?;

        let id = match self.repo.create_user(&user) {
            Ok(id) => id,
            Err(RepoError::Constraint(_)) => {
                return Err(UserServiceError::UsernameTaken(user.username))
            }
            Err(RepoError::Validation(err)) => return Err(UserServiceError::Validation(err)),
            Err(other) => return Err(UserServiceError::Repo(other)),
        };

        self.require_user(id)
    }

    pub fn update_profile(
        &self,
        id: UserId,
        display_name: &str,
        role: Role,
    ) -> Result<User, UserServiceError> {
        if display_name.trim().is_empty() {
            return Err(UserServiceError::Validation(ValidationError::BlankField(
                "display_name",
            )));
        }
        self.repo
            .update_profile(id, display_name, role)
            .map_err(map_user_repo_error)?;
        self.require_user(id)
    }

    pub fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), UserServiceError> {
        if password_hash.trim().is_empty() {
            return Err(UserServiceError::Validation(ValidationError::BlankField(
                "password_hash",
            )));
        }
        self.repo
            .set_password_hash(id, password_hash)
            .map_err(map_user_repo_error)
    }

    pub fn set_active(&self, id: UserId, active: bool) -> Result<User, UserServiceError> {
        self.repo
            .set_active(id, active)
            .map_err(map_user_repo_error)?;
        self.require_user(id)
    }

    pub fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.repo.get_user(id)
    }

    pub fn get_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.repo.get_by_username(username)
    }

    pub fn list_users(&self) -> RepoResult<Vec<User>> {
        self.repo.list_users()
    }

    pub fn count_users(&self) -> RepoResult<u32> {
        self.repo.count_users()
    }

    fn require_user(&self, id: UserId) -> Result<User, UserServiceError> {
        self.repo
            .get_user(id)
            .map_err(map_user_repo_error)?
            .ok_or(UserServiceError::InconsistentState(
                "user not found in read-back",
            ))
    }
}

fn map_user_repo_error(value: RepoError) -> UserServiceError {
    match value {
        RepoError::NotFound { entity: "user", id } => UserServiceError::UserNotFound(id),
        RepoError::Validation(err) => UserServiceError::Validation(err),
        other => UserServiceError::Repo(other),
    }
}
