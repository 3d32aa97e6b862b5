//! 学生作答与判分
//!
//! - 选择题：与正确选项完全一致
//! - 判断题：忽略大小写
//! - 论述题：不自动判分，返回参考答案供学生自评
//! - 其他题型：文本相似度不低于 [`SIMILARITY_THRESHOLD`] 即判为正确

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult, ValidationError};
use crate::infrastructure::Database;
use crate::models::{Permission, Question, QuestionType, StudentProgress};
use crate::repository::{progress, questions};
use crate::services::access::Session;
use crate::utils::string_similarity;

/// 简答题判为正确的最低相似度
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// 判分结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Grade {
    Correct,
    Incorrect { correct_answer: Option<String> },
    /// 论述题，需要学生对照参考答案自评
    SelfEvaluate { model_answer: Option<String> },
}

/// 一次作答的结果
#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub grade: Grade,
    pub explanation: Option<String>,
    pub progress: StudentProgress,
}

pub struct AttemptService {
    db: Arc<Database>,
}

impl AttemptService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// 提交答案并更新进度
    pub fn submit_answer(&self, session: &Session, question_id: i64, answer: &str) -> AppResult<AttemptResult> {
        session.require(Permission::AttemptQuestion)?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ValidationError::MissingField("answer").into());
        }

        let (question, grade, progress) = self.db.transaction(|tx| {
            let question = questions::get(tx, question_id)?;
            let grade = grade_answer(&question, answer);
            let record = progress::get_or_create(tx, session.user_id, question_id)?;
            let updated = progress::record_attempt(tx, record.id, grade == Grade::Correct, Utc::now())?;
            Ok((question, grade, updated))
        })?;

        info!(
            "{} 作答题目 {} (第 {} 次): {:?}",
            session.username, question_id, progress.attempts, grade
        );

        Ok(AttemptResult {
            grade,
            explanation: question.explanation,
            progress,
        })
    }

    /// 论述题自评
    pub fn record_self_evaluation(&self, session: &Session, question_id: i64, correct: bool) -> AppResult<StudentProgress> {
        session.require(Permission::AttemptQuestion)?;
        self.db.transaction(|tx| {
            let question = questions::get(tx, question_id)?;
            if question.question_type != QuestionType::Essay {
                return Err(AppError::invalid("Only essay questions can be self-evaluated"));
            }
            let record = progress::get_or_create(tx, session.user_id, question_id)?;
            progress::set_correct(tx, record.id, correct)
        })
    }
}

/// 按题型判分
pub fn grade_answer(question: &Question, answer: &str) -> Grade {
    let answer = answer.trim();
    match question.question_type {
        QuestionType::MultipleChoice => {
            let correct = question.choice_options().map(|(correct, _)| correct);
            if correct.as_deref() == Some(answer) {
                Grade::Correct
            } else {
                Grade::Incorrect { correct_answer: correct }
            }
        }
        QuestionType::TrueFalse => {
            let correct = question.correct_answer.as_deref().map(str::trim);
            if correct.is_some_and(|c| c.eq_ignore_ascii_case(answer)) {
                Grade::Correct
            } else {
                Grade::Incorrect {
                    correct_answer: correct.map(str::to_string),
                }
            }
        }
        QuestionType::Essay => Grade::SelfEvaluate {
            model_answer: question.correct_answer.clone(),
        },
        _ => {
            let correct = question.correct_answer.as_deref();
            if string_similarity(Some(answer), correct) >= SIMILARITY_THRESHOLD {
                Grade::Correct
            } else {
                Grade::Incorrect {
                    correct_answer: correct.map(str::to_string),
                }
            }
        }
    }
}
