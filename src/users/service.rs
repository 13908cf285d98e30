//! User service - registration, profiles and admin user management

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{hash_password, PasswordError};
use crate::error::ApiError;
use crate::models::{SignupRequest, User, UserRole};

use super::model::UpdateUserRequest;

const USER_COLUMNS: &str = "id, first_name, last_name, email, phone_number, password_hash, \
                            payment_details, role, created_at, updated_at";

/// User service errors
#[derive(Error, Debug)]
pub enum UserError {
    #[error("Please fill in all fields")]
    MissingFields(Vec<String>),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Password not strong enough")]
    WeakPassword,

    #[error("Email already in use")]
    EmailTaken,

    #[error("User not found")]
    NotFound,

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<PasswordError> for UserError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooWeak => UserError::WeakPassword,
            PasswordError::HashFailed(msg) => UserError::Hash(msg),
        }
    }
}

impl From<validator::ValidationErrors> for UserError {
    fn from(e: validator::ValidationErrors) -> Self {
        UserError::Invalid(e.to_string())
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::MissingFields(fields) => ApiError::MissingFields(fields),
            UserError::Invalid(msg) => ApiError::ValidationError(msg),
            UserError::WeakPassword => {
                ApiError::BadRequest("Password not strong enough".to_string())
            }
            UserError::EmailTaken => ApiError::Conflict("Email already in use".to_string()),
            UserError::NotFound => ApiError::NotFound("User not found".to_string()),
            UserError::Hash(msg) => ApiError::InternalError(msg),
            UserError::Database(err) => err.into(),
        }
    }
}

fn map_unique(err: sqlx::Error) -> UserError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => UserError::EmailTaken,
        _ => UserError::Database(err),
    }
}

/// Service for user records
#[derive(Clone)]
pub struct UserService {
    db_pool: PgPool,
    bcrypt_cost: u32,
    admin_emails: Vec<String>,
}

impl UserService {
    pub fn new(db_pool: PgPool, bcrypt_cost: u32, admin_emails: Vec<String>) -> Self {
        Self {
            db_pool,
            bcrypt_cost,
            admin_emails,
        }
    }

    /// Validate, hash and insert a new user together with an empty wallet.
    ///
    /// `role` overrides the default role; when absent, emails listed in
    /// `ADMIN_EMAILS` become admins and everyone else a regular user.
    pub async fn register(
        &self,
        req: SignupRequest,
        role: Option<UserRole>,
    ) -> Result<User, UserError> {
        let req = req.normalized();
        let empty = req.empty_fields();
        if !empty.is_empty() {
            return Err(UserError::MissingFields(empty));
        }
        req.validate()?;

        // empty_fields() guarantees these are present
        let first_name = req.first_name.unwrap_or_default();
        let last_name = req.last_name.unwrap_or_default();
        let email = req.email.unwrap_or_default();
        let phone_number = req.phone_number.unwrap_or_default();
        let password = req.password.unwrap_or_default();

        let role = role.unwrap_or_else(|| {
            if self.admin_emails.contains(&email) {
                UserRole::Admin
            } else {
                UserRole::User
            }
        });

        let password_hash = hash_password(password, self.bcrypt_cost).await?;

        let mut tx = self.db_pool.begin().await?;

        let user: User = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, first_name, last_name, email, phone_number, password_hash, payment_details, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&first_name)
        .bind(&last_name)
        .bind(&email)
        .bind(&phone_number)
        .bind(&password_hash)
        .bind(req.payment_details)
        .bind(role)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique)?;

        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let user = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, UserError> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(UserError::NotFound)
    }

    /// All users, newest first
    pub async fn list_users(&self) -> Result<Vec<User>, UserError> {
        let users = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(users)
    }

    /// Apply a partial update. Role changes are dropped unless `allow_role` is set.
    pub async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
        allow_role: bool,
    ) -> Result<User, UserError> {
        let req = req.normalized();
        req.validate()?;

        if req.is_empty() {
            return self.get_user(id).await;
        }

        let password_hash = match req.password {
            Some(password) => Some(hash_password(password, self.bcrypt_cost).await?),
            None => None,
        };
        let role = if allow_role { req.role } else { None };

        sqlx::query_as(&format!(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                phone_number = COALESCE($5, phone_number),
                password_hash = COALESCE($6, password_hash),
                payment_details = COALESCE($7, payment_details),
                role = COALESCE($8, role),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.email)
        .bind(req.phone_number)
        .bind(password_hash)
        .bind(req.payment_details)
        .bind(role)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(map_unique)?
        .ok_or(UserError::NotFound)
    }

    /// Delete a user; wallet, holdings, sessions and ledger rows cascade.
    pub async fn delete_user(&self, id: Uuid) -> Result<(), UserError> {
        let rows = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(UserError::NotFound);
        }

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_user_error_status_mapping() {
        let cases = [
            (UserError::MissingFields(vec!["email".into()]), StatusCode::BAD_REQUEST),
            (UserError::WeakPassword, StatusCode::BAD_REQUEST),
            (UserError::EmailTaken, StatusCode::CONFLICT),
            (UserError::NotFound, StatusCode::NOT_FOUND),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }
}
