//! 组卷
//!
//! 先按条件筛出候选题，再自动抽题或手动挑选，调整顺序和分值后保存。
//! [`ExamDraft`] 只在内存中保存选择，`save` 时才一次性写库。

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, ExamError, ValidationError};
use crate::infrastructure::Database;
use crate::models::question::{MAX_DIFFICULTY, MIN_DIFFICULTY};
use crate::models::{CandidateQuestion, ExamDetail, NewExam, Permission, QuestionType};
use crate::repository::{courses, exams, questions};
use crate::services::access::Session;

/// 自动抽题的题目数范围
pub const MIN_AUTO_QUESTIONS: usize = 5;
pub const MAX_AUTO_QUESTIONS: usize = 50;
/// 最短考试时间（分钟）
pub const MIN_TIME_LIMIT: i64 = 10;

/// 候选题筛选条件
#[derive(Debug, Clone, PartialEq)]
pub struct ExamFilter {
    pub course_id: i64,
    /// 为空时没有候选题
    pub chapter_ids: Vec<i64>,
    pub difficulty_min: f64,
    pub difficulty_max: f64,
    /// 为空时不按题型过滤
    pub question_types: Vec<QuestionType>,
}

impl ExamFilter {
    /// 某门课程的全部难度、全部题型
    pub fn new(course_id: i64, chapter_ids: Vec<i64>) -> Self {
        Self {
            course_id,
            chapter_ids,
            difficulty_min: MIN_DIFFICULTY,
            difficulty_max: MAX_DIFFICULTY,
            question_types: Vec::new(),
        }
    }

    fn validate(&self) -> AppResult<()> {
        for (field, value) in [("minimum difficulty", self.difficulty_min), ("maximum difficulty", self.difficulty_max)] {
            if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field,
                    min: MIN_DIFFICULTY,
                    max: MAX_DIFFICULTY,
                    value,
                }
                .into());
            }
        }
        if self.difficulty_min > self.difficulty_max {
            return Err(AppError::invalid(
                "Minimum difficulty cannot be greater than maximum difficulty",
            ));
        }
        Ok(())
    }
}

/// 已选题目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedQuestion {
    pub question: CandidateQuestion,
    /// 从 1 开始
    pub order: i64,
    pub points: i64,
}

/// 对已选题目的一行修改
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExamEdit {
    pub question_id: i64,
    pub order: i64,
    pub points: i64,
}

/// 试卷基本信息
#[derive(Debug, Clone, Default)]
pub struct ExamInfo {
    pub title: String,
    pub description: Option<String>,
    /// 分钟
    pub time_limit: i64,
}

/// 组卷草稿
#[derive(Debug, Clone)]
pub struct ExamDraft {
    course_id: i64,
    candidates: Vec<CandidateQuestion>,
    selected: Vec<SelectedQuestion>,
    auto_generated: bool,
}

impl ExamDraft {
    /// 按条件加载候选题，每题默认分值为 `points_per_question`
    pub fn load_candidates(db: &Database, filter: &ExamFilter, points_per_question: i64) -> AppResult<Self> {
        filter.validate()?;
        check_points(points_per_question)?;

        let candidates = db.with_conn(|conn| {
            courses::get_course(conn, filter.course_id)?;
            for chapter_id in &filter.chapter_ids {
                let chapter = courses::get_chapter(conn, *chapter_id)?;
                if chapter.course_id != filter.course_id {
                    return Err(AppError::invalid(format!(
                        "Chapter {} does not belong to course {}",
                        chapter_id, filter.course_id
                    )));
                }
            }
            questions::candidates_for_exam(
                conn,
                &filter.chapter_ids,
                filter.difficulty_min,
                filter.difficulty_max,
                &filter.question_types,
                points_per_question,
            )
        })?;
        debug!("课程 {} 候选题目 {} 道", filter.course_id, candidates.len());

        Ok(Self {
            course_id: filter.course_id,
            candidates,
            selected: Vec::new(),
            auto_generated: false,
        })
    }

    pub fn candidates(&self) -> &[CandidateQuestion] {
        &self.candidates
    }

    pub fn selected(&self) -> &[SelectedQuestion] {
        &self.selected
    }

    pub fn is_auto_generated(&self) -> bool {
        self.auto_generated
    }

    pub fn total_points(&self) -> i64 {
        self.selected.iter().map(|s| s.points).sum()
    }

    /// 从候选题中不重复地随机抽取 `total` 道，保持抽取顺序
    pub fn auto_generate<R: Rng + ?Sized>(
        &mut self,
        total: usize,
        points_per_question: i64,
        rng: &mut R,
    ) -> Result<(), ExamError> {
        self.clear();
        if !(MIN_AUTO_QUESTIONS..=MAX_AUTO_QUESTIONS).contains(&total) {
            return Err(ExamError::InvalidQuestionCount {
                requested: total,
                min: MIN_AUTO_QUESTIONS,
                max: MAX_AUTO_QUESTIONS,
            });
        }
        if points_per_question < 1 {
            return Err(ExamError::InvalidPoints(points_per_question));
        }
        if self.candidates.len() < total {
            return Err(ExamError::NotEnoughQuestions {
                available: self.candidates.len(),
            });
        }

        let picked = rand::seq::index::sample(rng, self.candidates.len(), total);
        self.selected = picked
            .iter()
            .enumerate()
            .map(|(i, index)| SelectedQuestion {
                question: self.candidates[index].clone(),
                order: i as i64 + 1,
                points: points_per_question,
            })
            .collect();
        self.auto_generated = true;

        info!(
            "🎲 随机抽取 {} 道题，总分 {}",
            self.selected.len(),
            self.total_points()
        );
        Ok(())
    }

    /// 手动添加一道候选题
    pub fn add(&mut self, question_id: i64, points: i64) -> Result<(), ExamError> {
        if points < 1 {
            return Err(ExamError::InvalidPoints(points));
        }
        let candidate = self
            .candidates
            .iter()
            .find(|c| c.id == question_id)
            .ok_or(ExamError::NotACandidate(question_id))?;
        if self.position(question_id).is_some() {
            return Err(ExamError::AlreadySelected(question_id));
        }

        self.selected.push(SelectedQuestion {
            question: candidate.clone(),
            order: self.selected.len() as i64 + 1,
            points,
        });
        Ok(())
    }

    pub fn remove(&mut self, question_id: i64) -> Result<(), ExamError> {
        let index = self
            .position(question_id)
            .ok_or(ExamError::NotSelected(question_id))?;
        self.selected.remove(index);
        self.renumber();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.auto_generated = false;
    }

    /// 批量修改顺序和分值，按新顺序稳定排序
    pub fn apply_edits(&mut self, edits: &[ExamEdit]) -> Result<(), ExamError> {
        for edit in edits {
            if edit.points < 1 {
                return Err(ExamError::InvalidPoints(edit.points));
            }
            if self.position(edit.question_id).is_none() {
                return Err(ExamError::NotSelected(edit.question_id));
            }
        }
        for edit in edits {
            if let Some(index) = self.position(edit.question_id) {
                self.selected[index].order = edit.order;
                self.selected[index].points = edit.points;
            }
        }
        self.selected.sort_by_key(|s| s.order);
        self.renumber();
        Ok(())
    }

    /// 把题目移动到第 `new_position` 位（从 1 开始，超出范围时放到最后）
    pub fn move_question(&mut self, question_id: i64, new_position: usize) -> Result<(), ExamError> {
        let index = self
            .position(question_id)
            .ok_or(ExamError::NotSelected(question_id))?;
        let item = self.selected.remove(index);
        let target = new_position.saturating_sub(1).min(self.selected.len());
        self.selected.insert(target, item);
        self.renumber();
        Ok(())
    }

    /// 保存试卷并清空选择
    pub fn save(&mut self, db: &Database, session: &Session, info: ExamInfo) -> AppResult<ExamDetail> {
        session.require(Permission::CreateQuestion)?;

        let title = info.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::MissingField("exam title").into());
        }
        if info.time_limit < MIN_TIME_LIMIT {
            return Err(AppError::invalid(format!(
                "Time limit must be at least {} minutes",
                MIN_TIME_LIMIT
            )));
        }
        if self.selected.is_empty() {
            return Err(ExamError::EmptySelection.into());
        }

        let exam = NewExam {
            title,
            description: info.description.filter(|d| !d.trim().is_empty()),
            course_id: self.course_id,
            created_by: Some(session.user_id),
            time_limit: info.time_limit,
            total_points: self.total_points(),
        };
        let rows: Vec<(i64, i64)> = self
            .selected
            .iter()
            .map(|s| (s.question.id, s.points))
            .collect();

        let detail = db.transaction(|tx| {
            let id = exams::insert(tx, &exam, &rows)?;
            exams::detail(tx, id)
        })?;

        info!(
            "✓ 试卷已保存: {} ({} 道题, 总分 {})",
            detail.exam.title,
            detail.questions.len(),
            detail.exam.total_points
        );
        self.clear();
        Ok(detail)
    }

    fn position(&self, question_id: i64) -> Option<usize> {
        self.selected.iter().position(|s| s.question.id == question_id)
    }

    fn renumber(&mut self) {
        for (i, item) in self.selected.iter_mut().enumerate() {
            item.order = i as i64 + 1;
        }
    }
}

fn check_points(points: i64) -> Result<(), ExamError> {
    if points < 1 {
        return Err(ExamError::InvalidPoints(points));
    }
    Ok(())
}
