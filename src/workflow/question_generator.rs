//! 借助 LLM 新建题目
//!
//! 1. 教师填写题目 → 难度评审 → 保存（难度、时间、水平来自评审）
//! 2. 按章节 ILO 批量生成题目草稿 → 教师挑选 → 保存

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, LlmError};
use crate::models::question::{clamp_difficulty, QuestionInput, QuestionType, StudentLevel};
use crate::models::{Permission, Question};
use crate::repository::{courses, questions};
use crate::services::access::Session;
use crate::services::content_service::{ContentService, QuestionDraft};
use crate::services::llm_service::generation_prompt;
use crate::services::response_parser::{
    extract_estimated_time, extract_student_level, parse_generated_questions, DifficultyReview,
    GeneratedQuestion,
};
use crate::utils::truncate_text;
use crate::workflow::question_analysis::QuestionAnalyzer;
use crate::workflow::question_ctx::QuestionCtx;

/// 一次最多生成的题目数
pub const MAX_GENERATED_QUESTIONS: usize = 10;

/// AI 辅助新建的题目及评审意见
#[derive(Debug, Clone, Serialize)]
pub struct ReviewedQuestion {
    pub question: Question,
    pub review: DifficultyReview,
}

pub struct QuestionGenerator {
    analyzer: Arc<QuestionAnalyzer>,
    content: ContentService,
}

impl QuestionGenerator {
    pub fn new(analyzer: Arc<QuestionAnalyzer>) -> Self {
        let content = ContentService::new(analyzer.database().clone());
        Self { analyzer, content }
    }

    /// 教师新建题目，由 LLM 评定难度
    ///
    /// 评审拿不到评分时不保存，返回 `AnalysisFailed`。
    pub async fn add_question_with_ai(&self, session: &Session, draft: QuestionDraft) -> AppResult<ReviewedQuestion> {
        session.require(Permission::CreateQuestion)?;
        let input = draft.into_input(true)?;

        let ctx = self.analyzer.database().with_conn(|conn| {
            QuestionCtx::load(conn, input.chapter_id, input.content.as_str(), input.question_type.clone())
        })?;

        let review = self.analyzer.review_difficulty(&ctx).await;
        let rating = review.difficulty_rating.ok_or(LlmError::AnalysisFailed)?;

        let input = QuestionInput {
            difficulty: Some(rating),
            estimated_time: Some(extract_estimated_time(&review.suggestions)),
            student_level: Some(extract_student_level(&review.suggestions).as_str().to_string()),
            ..input
        };
        let question = self.content.insert_question(&input)?;

        Ok(ReviewedQuestion { question, review })
    }

    /// 按章节生成题目草稿（不保存）
    pub async fn generate_questions(
        &self,
        session: &Session,
        chapter_id: i64,
        count: usize,
        question_type: QuestionType,
        level: StudentLevel,
    ) -> Result<Vec<QuestionDraft>> {
        session.require(Permission::CreateQuestion)?;
        if !(1..=MAX_GENERATED_QUESTIONS).contains(&count) {
            return Err(AppError::invalid(format!(
                "Number of questions must be between 1 and {}",
                MAX_GENERATED_QUESTIONS
            ))
            .into());
        }

        let ctx = self
            .analyzer
            .database()
            .with_conn(|conn| QuestionCtx::load(conn, chapter_id, "", question_type.clone()))?;

        info!("{} 🤖 生成 {} 道题目 ({})...", ctx, count, level);
        let request = generation_prompt(
            &ctx.course_title,
            &ctx.chapter_title,
            &ctx.ilos,
            &question_type,
            count,
            level,
        );
        let response = self
            .analyzer
            .model()
            .complete(&request)
            .await
            .with_context(|| format!("{} 题目生成失败", ctx))?;

        let generated = parse_generated_questions(&response);
        if generated.is_empty() {
            return Err(LlmError::NoQuestionsParsed {
                response: truncate_text(&response, 200),
            }
            .into());
        }
        if generated.len() != count {
            warn!("{} 请求 {} 道题，实际解析出 {} 道", ctx, count, generated.len());
        }

        Ok(generated
            .into_iter()
            .map(|g| draft_from_generated(g, chapter_id, &question_type, level))
            .collect())
    }

    /// 保存挑选后的草稿（同一事务，任一条不合法则全部不保存）
    pub fn save_generated(&self, session: &Session, drafts: Vec<QuestionDraft>) -> AppResult<Vec<Question>> {
        session.require(Permission::CreateQuestion)?;
        let inputs = drafts
            .into_iter()
            .map(|d| d.into_input(false))
            .collect::<AppResult<Vec<_>>>()?;

        let saved = self.analyzer.database().transaction(|tx| {
            inputs
                .iter()
                .map(|input| -> AppResult<Question> {
                    courses::get_chapter(tx, input.chapter_id)?;
                    let id = questions::insert(tx, input)?;
                    questions::get(tx, id)
                })
                .collect::<AppResult<Vec<_>>>()
        })?;
        info!("✓ 保存了 {} 道生成的题目", saved.len());
        Ok(saved)
    }
}

fn draft_from_generated(
    generated: GeneratedQuestion,
    chapter_id: i64,
    requested_type: &QuestionType,
    level: StudentLevel,
) -> QuestionDraft {
    QuestionDraft {
        chapter_id,
        content: generated.content,
        question_type: Some(generated.question_type.unwrap_or_else(|| requested_type.clone())),
        options: generated.options,
        correct_answer: generated.correct_answer,
        explanation: generated.explanation,
        difficulty: generated.difficulty.map(clamp_difficulty),
        estimated_time: generated.estimated_time.filter(|m| *m >= 1),
        student_level: Some(generated.student_level.unwrap_or(level).as_str().to_string()),
        tags: (!generated.tags.is_empty()).then(|| generated.tags.join(", ")),
    }
}
