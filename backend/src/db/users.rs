use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use tccon_common::model::reviewers::User;

const USER_COLUMNS: &str = "username, first_name, last_name, email, is_staff";

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        username: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        is_staff: row.get(4)?,
    })
}

pub fn get_user(conn: &Connection, username: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            params![username],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY username",
        USER_COLUMNS
    ))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn upsert_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (username, first_name, last_name, email, is_staff)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(username) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            email = excluded.email,
            is_staff = excluded.is_staff",
        params![
            &user.username,
            &user.first_name,
            &user.last_name,
            &user.email,
            user.is_staff
        ],
    )?;
    Ok(())
}

pub fn grant_permission(conn: &Connection, username: &str, permission: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_permissions (username, permission) VALUES (?1, ?2)",
        params![username, permission],
    )?;
    Ok(())
}

pub fn permissions(conn: &Connection, username: &str) -> Result<BTreeSet<String>> {
    let mut stmt =
        conn.prepare("SELECT permission FROM user_permissions WHERE username = ?1")?;
    let perms = stmt
        .query_map(params![username], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;
    Ok(perms)
}
