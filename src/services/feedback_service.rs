//! 学生难度反馈
//!
//! 每个学生对每道题只保留一条反馈，已提交的只能修改。

use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult, DatabaseError, ValidationError};
use crate::infrastructure::Database;
use crate::models::question::{MAX_DIFFICULTY, MIN_DIFFICULTY};
use crate::models::{Permission, StudentFeedback};
use crate::repository::{feedback, questions};
use crate::services::access::Session;

/// 反馈表单
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackInput {
    /// 1.0-5.0
    pub difficulty_rating: f64,
    /// 0.0-4.0
    pub student_gpa: f64,
    /// 出勤率百分比 0-100，保存时转换为 0.0-1.0
    pub attendance_percent: f64,
}

impl FeedbackInput {
    fn validate(&self) -> AppResult<()> {
        check_range("difficulty rating", self.difficulty_rating, MIN_DIFFICULTY, MAX_DIFFICULTY)?;
        check_range("GPA", self.student_gpa, 0.0, 4.0)?;
        check_range("attendance rate", self.attendance_percent, 0.0, 100.0)?;
        Ok(())
    }

    fn attendance_rate(&self) -> f64 {
        self.attendance_percent / 100.0
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> AppResult<()> {
    if !(min..=max).contains(&value) {
        return Err(ValidationError::OutOfRange { field, min, max, value }.into());
    }
    Ok(())
}

pub struct FeedbackService {
    db: Arc<Database>,
}

impl FeedbackService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// 当前用户对某题的反馈
    pub fn my_feedback(&self, session: &Session, question_id: i64) -> AppResult<Option<StudentFeedback>> {
        self.db
            .with_conn(|conn| feedback::find(conn, question_id, session.user_id))
    }

    /// 提交反馈，已提交过时返回 `Conflict`
    pub fn submit(&self, session: &Session, question_id: i64, input: FeedbackInput) -> AppResult<StudentFeedback> {
        session.require(Permission::SubmitFeedback)?;
        input.validate()?;

        let saved = self.db.transaction(|tx| {
            questions::get(tx, question_id)?;
            if feedback::find(tx, question_id, session.user_id)?.is_some() {
                return Err(DatabaseError::Conflict {
                    entity: "Feedback",
                    detail: "You have already provided feedback for this question".to_string(),
                }
                .into());
            }
            feedback::insert(
                tx,
                question_id,
                session.user_id,
                input.difficulty_rating,
                input.student_gpa,
                input.attendance_rate(),
            )?;
            feedback::find(tx, question_id, session.user_id)
        })?;

        info!("{} 提交了题目 {} 的反馈", session.username, question_id);
        saved.ok_or_else(|| AppError::not_found("Feedback", question_id))
    }

    /// 修改已有反馈
    pub fn update(&self, session: &Session, question_id: i64, input: FeedbackInput) -> AppResult<StudentFeedback> {
        session.require(Permission::SubmitFeedback)?;
        input.validate()?;

        self.db.transaction(|tx| {
            let existing = feedback::find(tx, question_id, session.user_id)?
                .ok_or_else(|| AppError::not_found("Feedback", question_id))?;
            feedback::update(
                tx,
                existing.id,
                input.difficulty_rating,
                input.student_gpa,
                input.attendance_rate(),
            )?;
            Ok(StudentFeedback {
                difficulty_rating: input.difficulty_rating,
                student_gpa: input.student_gpa,
                attendance_rate: input.attendance_rate(),
                ..existing
            })
        })
    }

    /// 某题的全部反馈（教师查看）
    pub fn for_question(&self, session: &Session, question_id: i64) -> AppResult<Vec<StudentFeedback>> {
        session.require(Permission::ViewFeedback)?;
        self.db.with_conn(|conn| feedback::for_question(conn, question_id))
    }
}
