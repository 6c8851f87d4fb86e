//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use study_assistant_core::domain::{NewUser, ProfileFields, UserCredentials, UserProfile};
use study_assistant_core::ports::{DatabaseService, PortError, PortResult};

const PROFILE_COLUMNS: &str =
    "email, nickname, dob, recent_topic, topics_learned, learning_style";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    email: String,
    nickname: String,
    dob: Option<NaiveDate>,
    recent_topic: Option<String>,
    topics_learned: Vec<String>,
    learning_style: Option<String>,
}
impl ProfileRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            email: self.email,
            nickname: self.nickname,
            date_of_birth: self.dob,
            recent_topic: self.recent_topic,
            topics_learned: self.topics_learned,
            learning_style: self.learning_style,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    email: String,
    password_hash: String,
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn find_user(&self, email: &str) -> PortResult<Option<UserProfile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            PROFILE_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(ProfileRecord::to_domain))
    }

    async fn create_user(&self, user: NewUser) -> PortResult<UserProfile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "INSERT INTO users (email, password_hash, nickname, dob) VALUES ($1, $2, $3, $4) RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.nickname)
        .bind(user.date_of_birth)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::AlreadyExists(format!("User {} already exists", user.email))
            } else {
                unexpected(e)
            }
        })?;

        Ok(record.to_domain())
    }

    async fn update_details(
        &self,
        email: &str,
        nickname: &str,
        date_of_birth: NaiveDate,
    ) -> PortResult<UserProfile> {
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE users SET nickname = $2, dob = $3 WHERE email = $1 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(email)
        .bind(nickname)
        .bind(date_of_birth)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn upsert_profile(&self, email: &str, fields: &ProfileFields) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET
                recent_topic = COALESCE($2, recent_topic),
                learning_style = COALESCE($3, learning_style),
                topics_learned = COALESCE($4::text[], topics_learned)
             WHERE email = $1",
        )
        .bind(email)
        .bind(fields.recent_topic.as_deref())
        .bind(fields.learning_style.as_deref())
        .bind(fields.topics_learned.as_deref())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", email)));
        }
        Ok(())
    }

    async fn get_credentials(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;

        Ok(UserCredentials {
            email: record.email,
            password_hash: record.password_hash,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, email, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(email)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String> {
        let email: Option<String> = sqlx::query_scalar(
            "SELECT email FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        email.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
