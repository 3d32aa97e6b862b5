use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult, DatabaseError};
use crate::models::{PermissionSet, Role};
use crate::repository::is_unique_violation;

const COLUMNS: &str = "id, name, permissions, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Role> {
    Ok(Role {
        id: row.get(0)?,
        name: row.get(1)?,
        permissions: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Role> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM roles WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Role", id))
}

pub fn find_by_name(conn: &Connection, name: &str) -> AppResult<Option<Role>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM roles WHERE name = ?1"),
            params![name],
            from_row,
        )
        .optional()?)
}

pub fn list(conn: &Connection) -> AppResult<Vec<Role>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM roles ORDER BY id"))?;
    let roles = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(roles)
}

/// 新建角色，重名时返回 `Conflict`
pub fn insert(conn: &Connection, name: &str, permissions: &PermissionSet) -> AppResult<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO roles (name, permissions, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![name, permissions.to_json(), now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Database(DatabaseError::Conflict {
                entity: "Role",
                detail: name.to_string(),
            })
        } else {
            AppError::from(e)
        }
    })?;
    Ok(conn.last_insert_rowid())
}

/// 存在则覆盖权限，不存在则新建；返回角色 id
pub fn upsert(conn: &Connection, name: &str, permissions: &PermissionSet) -> AppResult<i64> {
    match find_by_name(conn, name)? {
        Some(role) => {
            update_permissions(conn, role.id, permissions)?;
            Ok(role.id)
        }
        None => insert(conn, name, permissions),
    }
}

pub fn update_permissions(conn: &Connection, id: i64, permissions: &PermissionSet) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE roles SET permissions = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, permissions.to_json(), Utc::now()],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Role", id));
    }
    Ok(())
}

/// 删除角色（级联删除用户关联）
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let changed = conn.execute("DELETE FROM roles WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::not_found("Role", id));
    }
    Ok(())
}

/// 给用户分配角色，已存在的关联不做改动
pub fn assign(conn: &Connection, user_id: i64, role_id: i64) -> AppResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, role_id, Utc::now()],
    )?;
    Ok(())
}

pub fn revoke(conn: &Connection, user_id: i64, role_id: i64) -> AppResult<()> {
    conn.execute(
        "DELETE FROM user_roles WHERE user_id = ?1 AND role_id = ?2",
        params![user_id, role_id],
    )?;
    Ok(())
}

/// 移除用户的全部角色
pub fn clear_user_roles(conn: &Connection, user_id: i64) -> AppResult<()> {
    conn.execute("DELETE FROM user_roles WHERE user_id = ?1", params![user_id])?;
    Ok(())
}

/// 用户的角色，按分配先后排列
pub fn roles_for_user(conn: &Connection, user_id: i64) -> AppResult<Vec<Role>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.name, r.permissions, r.created_at, r.updated_at
         FROM roles r
         JOIN user_roles ur ON ur.role_id = r.id
         WHERE ur.user_id = ?1
         ORDER BY ur.created_at, ur.rowid",
    )?;
    let roles = stmt
        .query_map(params![user_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(roles)
}
