//! 题目评审上下文
//!
//! 封装"这道题属于哪门课、哪一章、要覆盖哪些 ILO"这一信息

use rusqlite::Connection;
use std::fmt::Display;

use crate::error::AppResult;
use crate::models::question::QuestionType;
use crate::repository::courses;

/// 题目评审上下文
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    /// 题干
    pub question: String,

    pub question_type: QuestionType,

    /// 课程名
    pub course_title: String,

    /// 章节名
    pub chapter_title: String,

    /// 章节 ILO 原文（一行一条）
    pub ilos: String,
}

impl QuestionCtx {
    /// 根据章节补全课程、章节和 ILO 信息
    pub fn load(
        conn: &Connection,
        chapter_id: i64,
        question: impl Into<String>,
        question_type: QuestionType,
    ) -> AppResult<Self> {
        let chapter = courses::get_chapter(conn, chapter_id)?;
        let course = courses::get_course(conn, chapter.course_id)?;
        Ok(Self {
            question: question.into(),
            question_type,
            course_title: course.title,
            chapter_title: chapter.title,
            ilos: chapter.ilos.unwrap_or_default(),
        })
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[课程 {} 章节 {} 题型 {}]",
            self.course_title, self.chapter_title, self.question_type
        )
    }
}
