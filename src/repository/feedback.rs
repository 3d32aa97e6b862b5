use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::StudentFeedback;

const COLUMNS: &str = "id, question_id, user_id, difficulty_rating, student_gpa, attendance_rate, created_at";

/// 分析用的反馈数据点
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackPoint {
    pub question_id: i64,
    pub difficulty_rating: f64,
    pub student_gpa: f64,
    pub attendance_rate: f64,
    /// 教师设定的难度
    pub question_difficulty: Option<f64>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<StudentFeedback> {
    Ok(StudentFeedback {
        id: row.get(0)?,
        question_id: row.get(1)?,
        user_id: row.get(2)?,
        difficulty_rating: row.get(3)?,
        student_gpa: row.get(4)?,
        attendance_rate: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn find(conn: &Connection, question_id: i64, user_id: i64) -> AppResult<Option<StudentFeedback>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM student_feedback WHERE question_id = ?1 AND user_id = ?2"),
            params![question_id, user_id],
            from_row,
        )
        .optional()?)
}

pub fn insert(
    conn: &Connection,
    question_id: i64,
    user_id: i64,
    difficulty_rating: f64,
    student_gpa: f64,
    attendance_rate: f64,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO student_feedback (question_id, user_id, difficulty_rating, student_gpa, attendance_rate, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![question_id, user_id, difficulty_rating, student_gpa, attendance_rate, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(
    conn: &Connection,
    id: i64,
    difficulty_rating: f64,
    student_gpa: f64,
    attendance_rate: f64,
) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE student_feedback SET difficulty_rating = ?2, student_gpa = ?3, attendance_rate = ?4 WHERE id = ?1",
        params![id, difficulty_rating, student_gpa, attendance_rate],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Feedback", id));
    }
    Ok(())
}

pub fn for_question(conn: &Connection, question_id: i64) -> AppResult<Vec<StudentFeedback>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM student_feedback WHERE question_id = ?1 ORDER BY created_at"
    ))?;
    let rows = stmt
        .query_map(params![question_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// 反馈数据点，可按课程过滤
pub fn points(conn: &Connection, course_id: Option<i64>) -> AppResult<Vec<FeedbackPoint>> {
    let mut stmt = conn.prepare(
        "SELECT f.question_id, f.difficulty_rating, f.student_gpa, f.attendance_rate, q.difficulty
         FROM student_feedback f
         JOIN questions q ON q.id = f.question_id
         JOIN chapters c ON c.id = q.chapter_id
         WHERE ?1 IS NULL OR c.course_id = ?1
         ORDER BY f.id",
    )?;
    let rows = stmt
        .query_map(params![course_id], |row| {
            Ok(FeedbackPoint {
                question_id: row.get(0)?,
                difficulty_rating: row.get(1)?,
                student_gpa: row.get(2)?,
                attendance_rate: row.get(3)?,
                question_difficulty: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
