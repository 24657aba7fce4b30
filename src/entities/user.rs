// 👤 User Entity - accounts that can sign in and author events

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use crate::auth::{hash_password, verify_password};
use crate::db::{format_timestamp, now, timestamp_column};
use crate::error::{is_constraint_violation, FleetError, Result};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@fleet.com";

// ============================================================================
// USER ROLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }

    /// Unknown role strings degrade to the unprivileged role
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

// ============================================================================
// USER ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: NaiveDateTime,
}

impl User {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let role: String = row.get(4)?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: UserRole::parse(&role),
            created_at: timestamp_column(row, 5)?,
        })
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
    role: UserRole,
) -> Result<User> {
    if username.trim().is_empty() {
        return Err(FleetError::InvalidInput("username must not be empty".to_string()));
    }

    if find_by_username(conn, username)?.is_some() {
        return Err(FleetError::Conflict {
            field: "username",
            value: username.to_string(),
        });
    }

    let hash = hash_password(password)?;
    let result = conn.execute(
        "INSERT INTO users (username, email, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![username, email, hash, role.as_str(), format_timestamp(&now())],
    );

    match result {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(FleetError::Conflict {
                field: "email",
                value: email.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    info!(user_id = id, username, "User created");
    get_user(conn, id)
}

pub fn get_user(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        User::from_row,
    )
    .optional()?
    .ok_or_else(|| FleetError::not_found("user", id))
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            [username],
            User::from_row,
        )
        .optional()?)
}

/// Check credentials. Unknown users and wrong passwords give the same error.
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<User> {
    let user = find_by_username(conn, username)?.ok_or(FleetError::Unauthorized)?;
    check_password(user, password)
}

/// Hand the user back only if `password` matches. Argon2 is slow on purpose,
/// so async callers run this off the runtime threads.
pub fn check_password(user: User, password: &str) -> Result<User> {
    if verify_password(password, &user.password_hash)? {
        Ok(user)
    } else {
        Err(FleetError::Unauthorized)
    }
}

/// Create the default administrator if it does not exist yet.
/// Returns true when a new account was created.
pub fn seed_admin(conn: &Connection, password: &str) -> Result<bool> {
    if find_by_username(conn, DEFAULT_ADMIN_USERNAME)?.is_some() {
        return Ok(false);
    }

    create_user(
        conn,
        DEFAULT_ADMIN_USERNAME,
        DEFAULT_ADMIN_EMAIL,
        password,
        UserRole::Admin,
    )?;
    Ok(true)
}
