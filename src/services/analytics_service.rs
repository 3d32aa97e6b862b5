//! 统计分析

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::AppResult;
use crate::infrastructure::Database;
use crate::models::Permission;
use crate::repository::feedback::FeedbackPoint;
use crate::repository::stats::CourseStats;
use crate::repository::{feedback, progress, stats};
use crate::services::access::Session;

/// 课程概览（`course_id` 为空时统计全部课程）
#[derive(Debug, Clone, Serialize)]
pub struct CourseOverview {
    pub course_id: Option<i64>,
    pub courses: i64,
    pub chapters: i64,
    pub questions: i64,
    /// (难度, 题目数)
    pub difficulty_histogram: Vec<(f64, i64)>,
    #[serde(skip)]
    pub course_stats: Vec<CourseStats>,
    pub correct_attempts: i64,
    pub incorrect_attempts: i64,
    #[serde(skip)]
    pub feedback: Vec<FeedbackPoint>,
}

/// 某个难度（或课程）下的作答情况
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessGroup {
    pub label: String,
    pub questions: usize,
    /// 百分比
    pub success_rate: f64,
}

/// 学生个人进度
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentProgressReport {
    pub attempted: usize,
    /// 百分比
    pub success_rate: f64,
    pub average_attempts: f64,
    pub by_difficulty: Vec<SuccessGroup>,
    pub by_course: Vec<SuccessGroup>,
}

pub struct AnalyticsService {
    db: Arc<Database>,
}

impl AnalyticsService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn course_overview(&self, session: &Session, course_id: Option<i64>) -> AppResult<CourseOverview> {
        session.require(Permission::ViewAnalytics)?;
        self.db.with_conn(|conn| {
            if let Some(id) = course_id {
                crate::repository::courses::get_course(conn, id)?;
            }
            let (courses, chapters, questions) = stats::entity_counts(conn, course_id)?;
            let (correct_attempts, incorrect_attempts) = progress::correctness_counts(conn, course_id)?;
            Ok(CourseOverview {
                course_id,
                courses,
                chapters,
                questions,
                difficulty_histogram: stats::difficulty_histogram(conn, course_id)?,
                course_stats: stats::course_stats(conn, course_id)?,
                correct_attempts,
                incorrect_attempts,
                feedback: feedback::points(conn, course_id)?,
            })
        })
    }

    /// 当前用户的学习进度
    pub fn my_progress(&self, session: &Session) -> AppResult<StudentProgressReport> {
        session.require(Permission::ViewProgress)?;
        self.student_progress(session.user_id)
    }

    pub fn student_progress(&self, user_id: i64) -> AppResult<StudentProgressReport> {
        let records = self.db.with_conn(|conn| progress::for_user(conn, user_id))?;

        let attempted = records.len();
        if attempted == 0 {
            return Ok(StudentProgressReport {
                attempted: 0,
                success_rate: 0.0,
                average_attempts: 0.0,
                by_difficulty: Vec::new(),
                by_course: Vec::new(),
            });
        }

        let correct = records.iter().filter(|r| r.progress.correct).count();
        let total_attempts: i64 = records.iter().map(|r| r.progress.attempts).sum();

        let by_difficulty = group_success(records.iter().map(|r| {
            let label = r
                .difficulty
                .map(|d| format!("{:.1}", d))
                .unwrap_or_else(|| "Unrated".to_string());
            (label, r.progress.correct)
        }));
        let by_course = group_success(records.iter().map(|r| (r.course_title.clone(), r.progress.correct)));

        Ok(StudentProgressReport {
            attempted,
            success_rate: correct as f64 / attempted as f64 * 100.0,
            average_attempts: total_attempts as f64 / attempted as f64,
            by_difficulty,
            by_course,
        })
    }
}

fn group_success(items: impl Iterator<Item = (String, bool)>) -> Vec<SuccessGroup> {
    let mut groups: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for (label, correct) in items {
        let entry = groups.entry(label).or_default();
        entry.0 += 1;
        if correct {
            entry.1 += 1;
        }
    }
    groups
        .into_iter()
        .map(|(label, (questions, correct))| SuccessGroup {
            label,
            questions,
            success_rate: correct as f64 / questions as f64 * 100.0,
        })
        .collect()
}
