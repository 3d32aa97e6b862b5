use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::AppResult;
use crate::models::StudentProgress;

const COLUMNS: &str = "id, user_id, question_id, attempts, correct, last_attempt_date";

fn from_row(row: &Row<'_>) -> rusqlite::Result<StudentProgress> {
    Ok(StudentProgress {
        id: row.get(0)?,
        user_id: row.get(1)?,
        question_id: row.get(2)?,
        attempts: row.get(3)?,
        correct: row.get(4)?,
        last_attempt_date: row.get(5)?,
    })
}

/// 获取进度，不存在则以 0 次尝试创建
pub fn get_or_create(conn: &Connection, user_id: i64, question_id: i64) -> AppResult<StudentProgress> {
    conn.execute(
        "INSERT OR IGNORE INTO student_progress (user_id, question_id, attempts, correct, last_attempt_date)
         VALUES (?1, ?2, 0, 0, ?3)",
        params![user_id, question_id, Utc::now()],
    )?;
    Ok(conn.query_row(
        &format!("SELECT {COLUMNS} FROM student_progress WHERE user_id = ?1 AND question_id = ?2"),
        params![user_id, question_id],
        from_row,
    )?)
}

/// 记录一次作答：尝试次数加一；答对时标记为正确，答错不会清除已有的正确状态
pub fn record_attempt(conn: &Connection, id: i64, correct: bool, at: DateTime<Utc>) -> AppResult<StudentProgress> {
    conn.execute(
        "UPDATE student_progress
         SET attempts = attempts + 1, correct = (correct OR ?2), last_attempt_date = ?3
         WHERE id = ?1",
        params![id, correct, at],
    )?;
    get(conn, id)
}

/// 直接设置正确状态（论述题自评）
pub fn set_correct(conn: &Connection, id: i64, correct: bool) -> AppResult<StudentProgress> {
    conn.execute(
        "UPDATE student_progress SET correct = ?2 WHERE id = ?1",
        params![id, correct],
    )?;
    get(conn, id)
}

pub fn get(conn: &Connection, id: i64) -> AppResult<StudentProgress> {
    Ok(conn.query_row(
        &format!("SELECT {COLUMNS} FROM student_progress WHERE id = ?1"),
        params![id],
        from_row,
    )?)
}

/// 带题目难度和课程名的进度记录
#[derive(Debug, Clone)]
pub struct ProgressRecord {
    pub progress: StudentProgress,
    pub difficulty: Option<f64>,
    pub course_title: String,
}

/// 用户的全部进度，最近作答的在前
pub fn for_user(conn: &Connection, user_id: i64) -> AppResult<Vec<ProgressRecord>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.user_id, p.question_id, p.attempts, p.correct, p.last_attempt_date,
                q.difficulty, co.title
         FROM student_progress p
         JOIN questions q ON q.id = p.question_id
         JOIN chapters c ON c.id = q.chapter_id
         JOIN courses co ON co.id = c.course_id
         WHERE p.user_id = ?1
         ORDER BY p.last_attempt_date DESC, p.id DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok(ProgressRecord {
                progress: from_row(row)?,
                difficulty: row.get(6)?,
                course_title: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// 正确/未正确的进度条数，可按课程过滤
pub fn correctness_counts(conn: &Connection, course_id: Option<i64>) -> AppResult<(i64, i64)> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN p.correct THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN p.correct THEN 0 ELSE 1 END), 0)
         FROM student_progress p
         JOIN questions q ON q.id = p.question_id
         JOIN chapters c ON c.id = q.chapter_id
         WHERE ?1 IS NULL OR c.course_id = ?1",
        params![course_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}
