use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::question::QuestionType;

/// 试卷
#[derive(Debug, Clone, Serialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub course_id: i64,
    pub created_by: Option<i64>,
    /// 时间限制（分钟）
    pub time_limit: i64,
    pub total_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 试卷中的题目（按 `order` 排列，从 1 开始）
#[derive(Debug, Clone, Serialize)]
pub struct ExamQuestion {
    pub id: i64,
    pub exam_id: i64,
    pub question_id: i64,
    pub order: i64,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// 组卷候选题目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateQuestion {
    pub id: i64,
    pub content: String,
    pub difficulty: f64,
    pub question_type: QuestionType,
    /// 所属章节标题
    pub chapter: String,
    pub points: i64,
}

/// 试卷详情
#[derive(Debug, Clone, Serialize)]
pub struct ExamDetail {
    pub exam: Exam,
    pub questions: Vec<ExamQuestion>,
}

/// 新建试卷所需字段
#[derive(Debug, Clone)]
pub struct NewExam {
    pub title: String,
    pub description: Option<String>,
    pub course_id: i64,
    pub created_by: Option<i64>,
    pub time_limit: i64,
    pub total_points: i64,
}
