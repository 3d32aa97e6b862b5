use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult, AuthError};
use crate::models::{NewUser, User, UserWithRoles};
use crate::repository::{is_unique_violation, roles};

const COLUMNS: &str = "id, username, email, password, salt, created_at, updated_at, last_login";

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        salt: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        last_login: row.get(7)?,
    })
}

/// 插入用户，用户名或邮箱重复时返回 `AlreadyExists`
pub fn insert(conn: &Connection, user: &NewUser) -> AppResult<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (username, email, password, salt, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![user.username, user.email, user.password_hash, user.salt, now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::from(AuthError::AlreadyExists(
                "Username or email already exists".to_string(),
            ))
        } else {
            AppError::from(e)
        }
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> AppResult<User> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("User", id))
}

/// 按用户名或邮箱查找（登录用）
pub fn find_by_login(conn: &Connection, login: &str) -> AppResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE username = ?1 OR email = ?1 ORDER BY id LIMIT 1"),
            params![login],
            from_row,
        )
        .optional()?)
}

pub fn find_by_username(conn: &Connection, username: &str) -> AppResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            from_row,
        )
        .optional()?)
}

/// 用户名或邮箱是否已被占用
pub fn username_or_email_taken(conn: &Connection, username: &str, email: &str) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1 OR email = ?2",
        params![username, email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list(conn: &Connection) -> AppResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM users ORDER BY id"))?;
    let users = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// 用户列表及每个用户的角色名
pub fn list_with_roles(conn: &Connection) -> AppResult<Vec<UserWithRoles>> {
    list(conn)?
        .into_iter()
        .map(|user| {
            let roles = roles::roles_for_user(conn, user.id)?
                .into_iter()
                .map(|r| r.name)
                .collect();
            Ok(UserWithRoles { user, roles })
        })
        .collect()
}

pub fn set_last_login(conn: &Connection, id: i64, at: DateTime<Utc>) -> AppResult<()> {
    conn.execute(
        "UPDATE users SET last_login = ?2 WHERE id = ?1",
        params![id, at],
    )?;
    Ok(())
}

pub fn set_password(conn: &Connection, id: i64, password_hash: &str, salt: &str) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE users SET password = ?2, salt = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, password_hash, salt, Utc::now()],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("User", id));
    }
    Ok(())
}

/// 修改邮箱，新邮箱不能被其他用户占用
pub fn set_email(conn: &Connection, id: i64, email: &str) -> AppResult<()> {
    let taken: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1 AND id != ?2",
        params![email, id],
        |row| row.get(0),
    )?;
    if taken > 0 {
        return Err(AuthError::AlreadyExists("Email already in use".to_string()).into());
    }

    let changed = conn.execute(
        "UPDATE users SET email = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, email, Utc::now()],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("User", id));
    }
    Ok(())
}

/// 删除用户（级联删除角色关联、进度和讨论）
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::not_found("User", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::Database;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
            salt: "salt".to_string(),
        }
    }

    #[test]
    fn test_login_lookup_by_username_or_email() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = insert(conn, &new_user("alice"))?;
            assert_eq!(find_by_login(conn, "alice")?.unwrap().id, id);
            assert_eq!(find_by_login(conn, "alice@example.com")?.unwrap().id, id);
            assert!(find_by_login(conn, "bob")?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_duplicate_username_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            insert(conn, &new_user("alice"))?;
            let err = insert(conn, &new_user("alice")).unwrap_err();
            assert!(matches!(err, AppError::Auth(AuthError::AlreadyExists(_))));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_set_email_excludes_self() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let alice = insert(conn, &new_user("alice"))?;
            insert(conn, &new_user("bob"))?;
            set_email(conn, alice, "alice@example.com")?;
            assert!(set_email(conn, alice, "bob@example.com").is_err());
            assert!(delete(conn, 999).unwrap_err().is_not_found());
            Ok(())
        })
        .unwrap();
    }
}
