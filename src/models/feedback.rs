use chrono::{DateTime, Utc};
use serde::Serialize;

/// 学生对题目的难度反馈
#[derive(Debug, Clone, Serialize)]
pub struct StudentFeedback {
    pub id: i64,
    pub question_id: i64,
    pub user_id: Option<i64>,
    /// 1.0-5.0
    pub difficulty_rating: f64,
    /// 0.0-4.0
    pub student_gpa: f64,
    /// 0.0-1.0
    pub attendance_rate: f64,
    pub created_at: DateTime<Utc>,
}

/// 学生作答进度（每个用户每道题一条）
#[derive(Debug, Clone, Serialize)]
pub struct StudentProgress {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub attempts: i64,
    pub correct: bool,
    pub last_attempt_date: DateTime<Utc>,
}
