//! 课程与章节

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::{Chapter, ChapterInput, Course, CourseInput};

const COURSE_COLUMNS: &str = "id, title, description, created_by, created_at, updated_at";
const CHAPTER_COLUMNS: &str = "id, course_id, title, summary, ilos, created_at, updated_at";

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn chapter_from_row(row: &Row<'_>) -> rusqlite::Result<Chapter> {
    Ok(Chapter {
        id: row.get(0)?,
        course_id: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        ilos: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

// ========== 课程 ==========

pub fn insert_course(conn: &Connection, input: &CourseInput, created_by: Option<i64>) -> AppResult<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO courses (title, description, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![input.title, input.description, created_by, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_course(conn: &Connection, id: i64) -> AppResult<Course> {
    conn.query_row(
        &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"),
        params![id],
        course_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Course", id))
}

pub fn find_course_by_title(conn: &Connection, title: &str) -> AppResult<Option<Course>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE title = ?1 ORDER BY id LIMIT 1"),
            params![title],
            course_from_row,
        )
        .optional()?)
}

/// 课程列表，`search` 对标题和描述做不区分大小写的子串匹配
pub fn list_courses(conn: &Connection, search: Option<&str>) -> AppResult<Vec<Course>> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let mut stmt = conn.prepare(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses
         WHERE ?1 IS NULL
            OR instr(lower(title), lower(?1)) > 0
            OR instr(lower(coalesce(description, '')), lower(?1)) > 0
         ORDER BY id"
    ))?;
    let courses = stmt
        .query_map(params![search], course_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(courses)
}

pub fn update_course(conn: &Connection, id: i64, input: &CourseInput) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE courses SET title = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, input.title, input.description, Utc::now()],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Course", id));
    }
    Ok(())
}

/// 删除课程（级联删除章节、题目以及相关反馈、进度、讨论和试卷）
pub fn delete_course(conn: &Connection, id: i64) -> AppResult<()> {
    let changed = conn.execute("DELETE FROM courses WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::not_found("Course", id));
    }
    Ok(())
}

// ========== 章节 ==========

pub fn insert_chapter(conn: &Connection, input: &ChapterInput) -> AppResult<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO chapters (course_id, title, summary, ilos, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![input.course_id, input.title, input.summary, input.ilos, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_chapter(conn: &Connection, id: i64) -> AppResult<Chapter> {
    conn.query_row(
        &format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = ?1"),
        params![id],
        chapter_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Chapter", id))
}

/// 课程下的章节，`search` 匹配标题和摘要
pub fn chapters_for_course(conn: &Connection, course_id: i64, search: Option<&str>) -> AppResult<Vec<Chapter>> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHAPTER_COLUMNS} FROM chapters
         WHERE course_id = ?1
           AND (?2 IS NULL
                OR instr(lower(title), lower(?2)) > 0
                OR instr(lower(coalesce(summary, '')), lower(?2)) > 0)
         ORDER BY id"
    ))?;
    let chapters = stmt
        .query_map(params![course_id, search], chapter_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(chapters)
}

pub fn update_chapter(conn: &Connection, id: i64, input: &ChapterInput) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE chapters SET title = ?2, summary = ?3, ilos = ?4, updated_at = ?5 WHERE id = ?1",
        params![id, input.title, input.summary, input.ilos, Utc::now()],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Chapter", id));
    }
    Ok(())
}

pub fn delete_chapter(conn: &Connection, id: i64) -> AppResult<()> {
    let changed = conn.execute("DELETE FROM chapters WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::not_found("Chapter", id));
    }
    Ok(())
}
