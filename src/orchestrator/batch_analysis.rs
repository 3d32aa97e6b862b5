//! 批量题目分析 - 编排层
//!
//! ## 职责
//!
//! 对一个章节的全部题目并发调用 LLM 分析，可选择把结果回写到题目上。
//!
//! ## 设计特点
//!
//! - **并发控制**：Semaphore 限制同时进行的 LLM 请求数
//! - **失败隔离**：单题失败只记录日志和计数，不影响其他题目
//! - **向下委托**：具体分析交给 workflow::QuestionAnalyzer

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::models::Question;
use crate::repository::{courses, questions};
use crate::services::response_parser::QuestionAnalysis;
use crate::utils::logging::{log_batch_start, print_final_stats};
use crate::workflow::QuestionAnalyzer;

/// 单题分析结果
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub question_id: i64,
    pub result: Result<QuestionAnalysis>,
    /// 是否已回写
    pub applied: bool,
}

/// 整个章节的分析汇总
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub outcomes: Vec<AnalysisOutcome>,
}

/// 批量分析器
pub struct BatchAnalyzer {
    analyzer: Arc<QuestionAnalyzer>,
    max_concurrent: usize,
}

impl BatchAnalyzer {
    pub fn new(analyzer: Arc<QuestionAnalyzer>, max_concurrent: usize) -> Self {
        Self {
            analyzer,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// 分析章节内全部题目，`apply` 为 true 时回写分析结果
    pub async fn analyze_chapter(&self, chapter_id: i64, apply: bool) -> Result<BatchReport> {
        let all_questions: Vec<Question> = self.analyzer.database().with_conn(|conn| {
            courses::get_chapter(conn, chapter_id)?;
            questions::for_chapter(conn, chapter_id)
        })?;

        let total = all_questions.len();
        if total == 0 {
            info!("章节 {} 没有题目，跳过", chapter_id);
            return Ok(BatchReport::default());
        }
        log_batch_start(total, self.max_concurrent);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(total);

        for (idx, question) in all_questions.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;
            let analyzer = self.analyzer.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = analyzer
                    .analyze(&question.content, &question.question_type)
                    .await;

                let mut applied = false;
                match &result {
                    Ok(analysis) if apply => match analyzer.apply_analysis(question.id, analysis) {
                        Ok(_) => applied = true,
                        Err(e) => error!("[题目 {}] ❌ 回写失败: {}", question.id, e),
                    },
                    Ok(_) => {}
                    Err(e) => error!("[题目 {}/{}] ❌ 分析失败: {:#}", idx + 1, total, e),
                }

                AnalysisOutcome {
                    question_id: question.id,
                    result,
                    applied,
                }
            });
            handles.push(handle);
        }

        let mut report = BatchReport {
            total,
            ..Default::default()
        };
        for handle in handles {
            match handle.await {
                Ok(outcome) => {
                    if outcome.result.is_ok() && (outcome.applied || !apply) {
                        report.success += 1;
                    } else {
                        report.failed += 1;
                    }
                    report.outcomes.push(outcome);
                }
                Err(e) => {
                    error!("分析任务执行失败: {}", e);
                    report.failed += 1;
                }
            }
        }

        print_final_stats(report.success, report.failed, report.total);
        Ok(report)
    }
}
