//! User service.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use grievance_common::{AppError, AppResult, IdGenerator};
use grievance_db::{
    entities::{user, user::Role},
    repositories::UserRepository,
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Input for registering a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 256))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,

    pub role: Role,

    /// Optional supervising teacher (students only).
    pub teacher_id: Option<String>,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user.
    pub async fn create(&self, input: CreateUserInput) -> AppResult<user::Model> {
        input.validate()?;

        let email = input.email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::BadRequest("Email already in use".to_string()));
        }

        if let Some(teacher_id) = &input.teacher_id {
            let teacher = self.user_repo.get_by_id(teacher_id).await?;
            if teacher.role != Role::Teacher {
                return Err(AppError::Validation(
                    "Supervising teacher must have the teacher role".to_string(),
                ));
            }
        }

        let password_hash = hash_password(&input.password)?;
        let token = self.id_gen.generate_token();

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(input.name),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(input.role),
            teacher_id: Set(input.teacher_id),
            token: Set(Some(token)),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        self.user_repo.create(model).await
    }

    /// Authenticate by email and password, rotating the API token.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<user::Model> {
        let email = email.trim().to_lowercase();
        let user = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        // Rotate on every login so stale tokens stop working.
        let token = self.id_gen.generate_token();
        self.user_repo.update_token(&user.id, &token).await
    }

    /// Authenticate by API token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }
}

/// Hash a password with Argon2id.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

/// Verify a password against a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_create_user_input_validation() {
        let input = CreateUserInput {
            name: "A Student".to_string(),
            email: "not-an-email".to_string(),
            password: "secret1".to_string(),
            role: Role::Student,
            teacher_id: None,
        };
        assert!(input.validate().is_err());

        let input = CreateUserInput {
            email: "student@example.edu".to_string(),
            ..input
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_short_password_rejected() {
        let input = CreateUserInput {
            name: "A Student".to_string(),
            email: "student@example.edu".to_string(),
            password: "short".to_string(),
            role: Role::Student,
            teacher_id: None,
        };
        assert!(input.validate().is_err());
    }
}
