//! 题目

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::{CandidateQuestion, Question, QuestionInput, QuestionMetadataUpdate, QuestionType};

const COLUMNS: &str = "q.id, q.chapter_id, q.content, q.difficulty, q.estimated_time, q.student_level, \
                       q.tags, q.question_type, q.correct_answer, q.explanation, q.created_at, q.updated_at";

/// 题目列表查询条件
#[derive(Debug, Clone, Default)]
pub struct QuestionQuery {
    pub course_id: Option<i64>,
    pub chapter_id: Option<i64>,
    /// 难度区间（闭区间），未设置难度的题目不匹配
    pub difficulty: Option<(f64, f64)>,
    /// 题干子串（不区分大小写）
    pub search: Option<String>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    let question_type: String = row.get(7)?;
    Ok(Question {
        id: row.get(0)?,
        chapter_id: row.get(1)?,
        content: row.get(2)?,
        difficulty: row.get(3)?,
        estimated_time: row.get(4)?,
        student_level: row.get(5)?,
        tags: row.get(6)?,
        question_type: QuestionType::from(question_type),
        correct_answer: row.get(8)?,
        explanation: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn insert(conn: &Connection, input: &QuestionInput) -> AppResult<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO questions (chapter_id, content, difficulty, estimated_time, student_level, tags,
                                question_type, correct_answer, explanation, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            input.chapter_id,
            input.content,
            input.difficulty,
            input.estimated_time,
            input.student_level,
            input.tags,
            input.question_type.as_str(),
            input.correct_answer,
            input.explanation,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Question> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM questions q WHERE q.id = ?1"),
        params![id],
        from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Question", id))
}

/// 按条件查询题目
pub fn list(conn: &Connection, query: &QuestionQuery) -> AppResult<Vec<Question>> {
    let mut sql = format!(
        "SELECT {COLUMNS} FROM questions q JOIN chapters c ON c.id = q.chapter_id WHERE 1 = 1"
    );
    let mut values: Vec<Value> = Vec::new();

    if let Some(course_id) = query.course_id {
        values.push(Value::Integer(course_id));
        sql.push_str(&format!(" AND c.course_id = ?{}", values.len()));
    }
    if let Some(chapter_id) = query.chapter_id {
        values.push(Value::Integer(chapter_id));
        sql.push_str(&format!(" AND q.chapter_id = ?{}", values.len()));
    }
    if let Some((min, max)) = query.difficulty {
        values.push(Value::Real(min));
        values.push(Value::Real(max));
        sql.push_str(&format!(
            " AND q.difficulty BETWEEN ?{} AND ?{}",
            values.len() - 1,
            values.len()
        ));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        values.push(Value::Text(search.to_string()));
        sql.push_str(&format!(" AND instr(lower(q.content), lower(?{})) > 0", values.len()));
    }
    sql.push_str(" ORDER BY q.id");

    let mut stmt = conn.prepare(&sql)?;
    let questions = stmt
        .query_map(params_from_iter(values), from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(questions)
}

pub fn for_chapter(conn: &Connection, chapter_id: i64) -> AppResult<Vec<Question>> {
    list(
        conn,
        &QuestionQuery {
            chapter_id: Some(chapter_id),
            ..QuestionQuery::default()
        },
    )
}

pub fn update(conn: &Connection, id: i64, input: &QuestionInput) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE questions
         SET chapter_id = ?2, content = ?3, difficulty = ?4, estimated_time = ?5, student_level = ?6,
             tags = ?7, question_type = ?8, correct_answer = ?9, explanation = ?10, updated_at = ?11
         WHERE id = ?1",
        params![
            id,
            input.chapter_id,
            input.content,
            input.difficulty,
            input.estimated_time,
            input.student_level,
            input.tags,
            input.question_type.as_str(),
            input.correct_answer,
            input.explanation,
            Utc::now()
        ],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Question", id));
    }
    Ok(())
}

/// 只更新提供了值的 AI 字段
pub fn update_metadata(conn: &Connection, id: i64, update: &QuestionMetadataUpdate) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE questions
         SET difficulty = COALESCE(?2, difficulty),
             estimated_time = COALESCE(?3, estimated_time),
             student_level = COALESCE(?4, student_level),
             tags = COALESCE(?5, tags),
             updated_at = ?6
         WHERE id = ?1",
        params![
            id,
            update.difficulty,
            update.estimated_time,
            update.student_level,
            update.tags,
            Utc::now()
        ],
    )?;
    if changed == 0 {
        return Err(AppError::not_found("Question", id));
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> AppResult<()> {
    let changed = conn.execute("DELETE FROM questions WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::not_found("Question", id));
    }
    Ok(())
}

/// 组卷候选题目
///
/// 没有章节时直接返回空列表；`types` 为空表示不按题型过滤；
/// 未设置难度的题目不会入选。
pub fn candidates_for_exam(
    conn: &Connection,
    chapter_ids: &[i64],
    difficulty_min: f64,
    difficulty_max: f64,
    types: &[QuestionType],
    points: i64,
) -> AppResult<Vec<CandidateQuestion>> {
    if chapter_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut values: Vec<Value> = vec![Value::Real(difficulty_min), Value::Real(difficulty_max)];
    let chapter_slots: Vec<String> = chapter_ids
        .iter()
        .map(|id| {
            values.push(Value::Integer(*id));
            format!("?{}", values.len())
        })
        .collect();

    let mut sql = format!(
        "SELECT q.id, q.content, q.difficulty, q.question_type, c.title
         FROM questions q JOIN chapters c ON c.id = q.chapter_id
         WHERE q.difficulty IS NOT NULL
           AND q.difficulty BETWEEN ?1 AND ?2
           AND q.chapter_id IN ({})",
        chapter_slots.join(", ")
    );

    if !types.is_empty() {
        let type_slots: Vec<String> = types
            .iter()
            .map(|t| {
                values.push(Value::Text(t.as_str().to_string()));
                format!("?{}", values.len())
            })
            .collect();
        sql.push_str(&format!(" AND q.question_type IN ({})", type_slots.join(", ")));
    }
    sql.push_str(" ORDER BY q.id");

    let mut stmt = conn.prepare(&sql)?;
    let candidates = stmt
        .query_map(params_from_iter(values), |row| {
            let question_type: String = row.get(3)?;
            Ok(CandidateQuestion {
                id: row.get(0)?,
                content: row.get(1)?,
                difficulty: row.get(2)?,
                question_type: QuestionType::from(question_type),
                chapter: row.get(4)?,
                points,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::Database;
    use crate::models::{ChapterInput, CourseInput};
    use crate::repository::courses;

    fn seed(conn: &Connection) -> AppResult<(i64, i64)> {
        let course = courses::insert_course(conn, &CourseInput { title: "Biology".into(), description: None }, None)?;
        let chapter = courses::insert_chapter(
            conn,
            &ChapterInput {
                course_id: course,
                title: "Cells".into(),
                ..ChapterInput::default()
            },
        )?;
        for (content, difficulty, qt) in [
            ("What is a ribosome?", Some(2.0), QuestionType::ShortAnswer),
            ("Cells have walls", Some(1.0), QuestionType::TrueFalse),
            ("Describe mitosis", Some(4.5), QuestionType::Essay),
            ("Unrated question", None, QuestionType::ShortAnswer),
        ] {
            insert(
                conn,
                &QuestionInput {
                    chapter_id: chapter,
                    content: content.into(),
                    question_type: qt,
                    difficulty,
                    estimated_time: None,
                    student_level: None,
                    tags: None,
                    correct_answer: None,
                    explanation: None,
                },
            )?;
        }
        Ok((course, chapter))
    }

    #[test]
    fn test_list_filters() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (course, _) = seed(conn)?;
            let all = list(conn, &QuestionQuery { course_id: Some(course), ..Default::default() })?;
            assert_eq!(all.len(), 4);

            let easy = list(conn, &QuestionQuery { difficulty: Some((1.0, 2.0)), ..Default::default() })?;
            assert_eq!(easy.len(), 2);

            let found = list(conn, &QuestionQuery { search: Some("MITOSIS".into()), ..Default::default() })?;
            assert_eq!(found[0].question_type, QuestionType::Essay);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_candidates_for_exam() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let (_, chapter) = seed(conn)?;

            assert!(candidates_for_exam(conn, &[], 1.0, 5.0, &[], 1)?.is_empty());

            let all = candidates_for_exam(conn, &[chapter], 1.0, 5.0, &[], 2)?;
            assert_eq!(all.len(), 3);
            assert!(all.iter().all(|c| c.points == 2 && c.chapter == "Cells"));

            let tf = candidates_for_exam(conn, &[chapter], 1.0, 5.0, &[QuestionType::TrueFalse], 1)?;
            assert_eq!(tf.len(), 1);

            let hard = candidates_for_exam(conn, &[chapter], 4.0, 5.0, &[], 1)?;
            assert_eq!(hard[0].content, "Describe mitosis");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_update_metadata_keeps_missing_fields() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            seed(conn)?;
            update_metadata(
                conn,
                1,
                &QuestionMetadataUpdate {
                    estimated_time: Some(7),
                    tags: Some("cells, organelles".into()),
                    ..Default::default()
                },
            )?;
            let q = get(conn, 1)?;
            assert_eq!(q.difficulty, Some(2.0));
            assert_eq!(q.estimated_time, Some(7));
            assert_eq!(q.tag_list(), vec!["cells", "organelles"]);
            Ok(())
        })
        .unwrap();
    }
}
