//! 统计查询（可按课程过滤）

use rusqlite::{params, Connection};

use crate::error::AppResult;

/// 某门课程的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct CourseStats {
    pub course_id: i64,
    pub title: String,
    pub chapters: i64,
    pub questions: i64,
    pub average_difficulty: Option<f64>,
}

/// 课程、章节、题目数量
pub fn entity_counts(conn: &Connection, course_id: Option<i64>) -> AppResult<(i64, i64, i64)> {
    Ok(conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM courses WHERE ?1 IS NULL OR id = ?1),
            (SELECT COUNT(*) FROM chapters WHERE ?1 IS NULL OR course_id = ?1),
            (SELECT COUNT(*) FROM questions q JOIN chapters c ON c.id = q.chapter_id
             WHERE ?1 IS NULL OR c.course_id = ?1)",
        params![course_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?)
}

/// 按难度分组的题目数量（未设置难度的题目不计）
pub fn difficulty_histogram(conn: &Connection, course_id: Option<i64>) -> AppResult<Vec<(f64, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT q.difficulty, COUNT(q.id)
         FROM questions q JOIN chapters c ON c.id = q.chapter_id
         WHERE q.difficulty IS NOT NULL AND (?1 IS NULL OR c.course_id = ?1)
         GROUP BY q.difficulty
         ORDER BY q.difficulty",
    )?;
    let rows = stmt
        .query_map(params![course_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// 每门课程的章节数、题目数和平均难度
pub fn course_stats(conn: &Connection, course_id: Option<i64>) -> AppResult<Vec<CourseStats>> {
    let mut stmt = conn.prepare(
        "SELECT co.id, co.title,
                (SELECT COUNT(*) FROM chapters c WHERE c.course_id = co.id),
                (SELECT COUNT(*) FROM questions q JOIN chapters c ON c.id = q.chapter_id
                 WHERE c.course_id = co.id),
                (SELECT AVG(q.difficulty) FROM questions q JOIN chapters c ON c.id = q.chapter_id
                 WHERE c.course_id = co.id)
         FROM courses co
         WHERE ?1 IS NULL OR co.id = ?1
         ORDER BY co.id",
    )?;
    let rows = stmt
        .query_map(params![course_id], |row| {
            Ok(CourseStats {
                course_id: row.get(0)?,
                title: row.get(1)?,
                chapters: row.get(2)?,
                questions: row.get(3)?,
                average_difficulty: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
