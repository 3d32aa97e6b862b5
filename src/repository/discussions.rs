use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::{Discussion, DiscussionEntry};

const UNKNOWN_AUTHOR: &str = "Unknown User";

const ENTRY_SELECT: &str = "SELECT d.id, d.question_id, d.user_id, d.parent_id, d.content, d.created_at, d.updated_at,
                                   COALESCE(u.username, 'Unknown User')
                            FROM discussions d LEFT JOIN users u ON u.id = d.user_id";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Discussion> {
    Ok(Discussion {
        id: row.get(0)?,
        question_id: row.get(1)?,
        user_id: row.get(2)?,
        parent_id: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<DiscussionEntry> {
    let author: Option<String> = row.get(7)?;
    Ok(DiscussionEntry {
        discussion: from_row(row)?,
        author: author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
    })
}

pub fn insert(
    conn: &Connection,
    question_id: i64,
    user_id: i64,
    parent_id: Option<i64>,
    content: &str,
) -> AppResult<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO discussions (question_id, user_id, parent_id, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![question_id, user_id, parent_id, content, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Discussion> {
    conn.query_row(
        "SELECT id, question_id, user_id, parent_id, content, created_at, updated_at FROM discussions WHERE id = ?1",
        params![id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Discussion", id))
}

/// 顶层评论，最新的在前
pub fn top_level(conn: &Connection, question_id: i64) -> AppResult<Vec<DiscussionEntry>> {
    let mut stmt = conn.prepare(&format!(
        "{ENTRY_SELECT} WHERE d.question_id = ?1 AND d.parent_id IS NULL ORDER BY d.created_at DESC, d.id DESC"
    ))?;
    let rows = stmt
        .query_map(params![question_id], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// 某条评论的回复，最早的在前
pub fn replies(conn: &Connection, parent_id: i64) -> AppResult<Vec<DiscussionEntry>> {
    let mut stmt = conn.prepare(&format!(
        "{ENTRY_SELECT} WHERE d.parent_id = ?1 ORDER BY d.created_at ASC, d.id ASC"
    ))?;
    let rows = stmt
        .query_map(params![parent_id], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// 删除评论及其回复
pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let changed = conn.execute("DELETE FROM discussions WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::not_found("Discussion", id));
    }
    Ok(())
}
