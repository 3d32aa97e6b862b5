use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::{Exam, ExamDetail, ExamQuestion, NewExam};

const COLUMNS: &str = "id, title, description, course_id, created_by, time_limit, total_points, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Exam> {
    Ok(Exam {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        course_id: row.get(3)?,
        created_by: row.get(4)?,
        time_limit: row.get(5)?,
        total_points: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<ExamQuestion> {
    Ok(ExamQuestion {
        id: row.get(0)?,
        exam_id: row.get(1)?,
        question_id: row.get(2)?,
        order: row.get(3)?,
        points: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// 写入试卷及其题目，题目顺序为 `questions` 中的位置（从 1 开始）
///
/// 需要在事务中调用，保证试卷和题目同时写入。
pub fn insert(conn: &Connection, exam: &NewExam, questions: &[(i64, i64)]) -> AppResult<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO exams (title, description, course_id, created_by, time_limit, total_points, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            exam.title,
            exam.description,
            exam.course_id,
            exam.created_by,
            exam.time_limit,
            exam.total_points,
            now
        ],
    )?;
    let exam_id = conn.last_insert_rowid();

    let mut stmt = conn.prepare(
        r#"INSERT INTO exam_questions (exam_id, question_id, "order", points, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )?;
    for (i, (question_id, points)) in questions.iter().enumerate() {
        stmt.execute(params![exam_id, question_id, i as i64 + 1, points, now])?;
    }

    Ok(exam_id)
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Exam> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM exams WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Exam", id))
}

/// 试卷及按顺序排列的题目
pub fn detail(conn: &Connection, id: i64) -> AppResult<ExamDetail> {
    let exam = get(conn, id)?;
    let mut stmt = conn.prepare(
        r#"SELECT id, exam_id, question_id, "order", points, created_at
           FROM exam_questions WHERE exam_id = ?1 ORDER BY "order", id"#,
    )?;
    let questions = stmt
        .query_map(params![id], question_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExamDetail { exam, questions })
}

pub fn list(conn: &Connection, course_id: Option<i64>) -> AppResult<Vec<Exam>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM exams WHERE ?1 IS NULL OR course_id = ?1 ORDER BY id"
    ))?;
    let exams = stmt
        .query_map(params![course_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(exams)
}

pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let changed = conn.execute("DELETE FROM exams WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::not_found("Exam", id));
    }
    Ok(())
}
