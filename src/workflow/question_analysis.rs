//! 题目分析流程 - 流程层
//!
//! 核心职责：把"拼 prompt → 调模型 → 恢复结构化结果 → 回写题目"串起来
//!
//! - 难度评审：结合课程、章节和 ILO 给出评分与改进建议
//! - 题目分析：难度、作答时间、学生水平、标签

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::infrastructure::Database;
use crate::models::question::{Question, QuestionType};
use crate::repository::questions;
use crate::services::llm_service::{analysis_prompt, difficulty_review_prompt, ChatModel};
use crate::services::response_parser::{
    parse_difficulty_review, parse_question_analysis, DifficultyReview, QuestionAnalysis,
};
use crate::utils::truncate_text;
use crate::workflow::question_ctx::QuestionCtx;

/// 题目分析流程
///
/// - 只依赖 [`ChatModel`]，不关心背后是真实接口还是测试桩
/// - 解析全部交给 response_parser
pub struct QuestionAnalyzer {
    model: Arc<dyn ChatModel>,
    db: Arc<Database>,
}

impl QuestionAnalyzer {
    pub fn new(model: Arc<dyn ChatModel>, db: Arc<Database>) -> Self {
        Self { model, db }
    }

    pub fn model(&self) -> &Arc<dyn ChatModel> {
        &self.model
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// 难度评审
    ///
    /// 调用失败不会返回错误，而是把错误信息放进建议里，评分为空。
    pub async fn review_difficulty(&self, ctx: &QuestionCtx) -> DifficultyReview {
        info!("{} 🔍 请求难度评审...", ctx);

        let request = difficulty_review_prompt(
            &ctx.question,
            &ctx.question_type,
            &ctx.course_title,
            &ctx.chapter_title,
            &ctx.ilos,
        );

        match self.model.complete(&request).await {
            Ok(response) => {
                let review = parse_difficulty_review(&response);
                match review.difficulty_rating {
                    Some(rating) => info!("{} ✓ 难度评分: {:.1}", ctx, rating),
                    None => warn!("{} 未能解析出难度评分: {}", ctx, truncate_text(&response, 100)),
                }
                review
            }
            Err(e) => {
                warn!("{} ⚠️ LLM 调用失败: {:#}", ctx, e);
                DifficultyReview {
                    difficulty_rating: None,
                    suggestions: format!("Error calling LLM API: {:#}", e),
                }
            }
        }
    }

    /// 分析题目内容
    pub async fn analyze(&self, content: &str, question_type: &QuestionType) -> Result<QuestionAnalysis> {
        let request = analysis_prompt(content, question_type);
        let response = self
            .model
            .complete(&request)
            .await
            .with_context(|| format!("题目分析失败 (模型: {})", self.model.model_name()))?;

        let analysis = parse_question_analysis(&response);
        info!(
            "✓ 分析完成 (来源: {:?}, 难度: {:?}, 时间: {:?})",
            analysis.source, analysis.difficulty, analysis.estimated_time
        );
        Ok(analysis)
    }

    /// 分析库中已有的题目
    pub async fn analyze_existing(&self, question_id: i64) -> Result<(Question, QuestionAnalysis)> {
        let question = self.db.with_conn(|conn| questions::get(conn, question_id))?;
        let analysis = self
            .analyze(&question.content, &question.question_type)
            .await
            .with_context(|| format!("题目 {} 分析失败", question_id))?;
        Ok((question, analysis))
    }

    /// 把分析结果回写到题目上（只覆盖分析给出的字段）
    pub fn apply_analysis(&self, question_id: i64, analysis: &QuestionAnalysis) -> AppResult<Question> {
        let update = analysis.metadata_update();
        self.db.with_conn(|conn| {
            questions::update_metadata(conn, question_id, &update)?;
            questions::get(conn, question_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChapterInput, CourseInput, QuestionInput};
    use crate::repository::courses;
    use crate::services::llm_service::ChatRequest;
    use async_trait::async_trait;

    struct FixedModel(&'static str);

    #[async_trait]
    impl ChatModel for FixedModel {
        async fn complete(&self, _request: &ChatRequest) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn db_with_question() -> (Arc<Database>, i64) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let id = db
            .with_conn(|conn| {
                let course = courses::insert_course(
                    conn,
                    &CourseInput {
                        title: "Chemistry".into(),
                        description: None,
                    },
                    None,
                )?;
                let chapter = courses::insert_chapter(
                    conn,
                    &ChapterInput {
                        course_id: course,
                        title: "Acids".into(),
                        ..ChapterInput::default()
                    },
                )?;
                questions::insert(
                    conn,
                    &QuestionInput {
                        chapter_id: chapter,
                        content: "What is the pH of pure water?".into(),
                        question_type: QuestionType::ShortAnswer,
                        difficulty: Some(1.5),
                        estimated_time: Some(2),
                        student_level: None,
                        tags: Some("ph".into()),
                        correct_answer: Some("7".into()),
                        explanation: None,
                    },
                )
            })
            .unwrap();
        (db, id)
    }

    #[test]
    fn test_apply_keeps_fields_missing_from_analysis() {
        let (db, id) = db_with_question();
        // 只有 difficulty 和 student_level
        let analyzer = QuestionAnalyzer::new(
            Arc::new(FixedModel(r#"{"difficulty": 2.5, "student_level": "beginner"}"#)),
            db,
        );

        let (question, analysis) = tokio_test::block_on(analyzer.analyze_existing(id)).unwrap();
        assert_eq!(question.id, id);
        assert_eq!(analysis.difficulty, Some(2.5));

        let updated = analyzer.apply_analysis(id, &analysis).unwrap();
        assert_eq!(updated.difficulty, Some(2.5));
        assert_eq!(updated.student_level.as_deref(), Some("Beginner"));
        assert_eq!(updated.estimated_time, Some(2));
        assert_eq!(updated.tags.as_deref(), Some("ph"));
    }

    #[test]
    fn test_analyze_missing_question() {
        let (db, _) = db_with_question();
        let analyzer = QuestionAnalyzer::new(Arc::new(FixedModel("{}")), db);
        assert!(tokio_test::block_on(analyzer.analyze_existing(999)).is_err());
    }
}
