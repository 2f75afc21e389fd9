//! User repository contract and SQLite implementation.
//!
//! # Invariants
//! - Usernames are unique; lookups are done on the lowercased form.
//! - Deactivation never deletes the row; history keeps its references.

use crate::model::user::{Role, User, UserId};
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, map_constraint, parse_uuid_text,
    RepoError, RepoResult, TableSpec,
};
use rusqlite::{params, Connection, Row};

const REQUIRED_TABLES: &[TableSpec] = &[(
    "users",
    &["uuid", "username", "role", "password_hash", "active"],
)];

const USER_SELECT_SQL: &str = "SELECT
    uuid,
    username,
    display_name,
    role,
    password_hash,
    active
FROM users";

/// Repository interface for user accounts.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    fn update_profile(&self, id: UserId, display_name: &str, role: Role) -> RepoResult<()>;
    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()>;
    fn set_active(&self, id: UserId, active: bool) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn get_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    fn list_users(&self) -> RepoResult<Vec<User>>;
    fn count_users(&self) -> RepoResult<u32>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;

        self.conn
            .execute(
                "INSERT INTO users (uuid, username, display_name, role, password_hash, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    user.id.to_string(),
                    user.username.as_str(),
                    user.display_name.as_str(),
                    user.role.as_str(),
                    user.password_hash.as_str(),
                    bool_to_int(user.active),
                ],
            )
            .map_err(|err| map_constraint(err, "username already taken"))?;

        Ok(user.id)
    }

    fn update_profile(&self, id: UserId, display_name: &str, role: Role) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET display_name = ?2, role = ?3, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), display_name, role.as_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }
        Ok(())
    }

    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET password_hash = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), password_hash],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }
        Ok(())
    }

    fn set_active(&self, id: UserId, active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET active = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), bool_to_int(active)],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }
        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn get_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let normalized = username.trim().to_lowercase();
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE username = ?1;"))?;
        let mut rows = stmt.query([normalized])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY username ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn count_users(&self) -> RepoResult<u32> {
        let count: u32 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let uuid_text: String = row.get("uuid")?;
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in users.role"))
    })?;
    let active = int_to_bool(row.get("active")?, "users.active").map_err(RepoError::InvalidData)?;

    Ok(User {
        id: parse_uuid_text(&uuid_text, "users.uuid").map_err(RepoError::InvalidData)?,
        username: row.get("username")?,
        display_name: row.get("display_name")?,
        role,
        password_hash: row.get("password_hash")?,
        active,
    })
}
