use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_ilos;

/// 课程
#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 章节
#[derive(Debug, Clone, Serialize)]
pub struct Chapter {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub summary: Option<String>,
    /// 预期学习成果（每行一条）
    pub ilos: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    /// ILO 列表
    pub fn ilo_list(&self) -> Vec<String> {
        self.ilos.as_deref().map(format_ilos).unwrap_or_default()
    }
}

/// 新建/编辑课程的输入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// 新建/编辑章节的输入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChapterInput {
    pub course_id: i64,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub ilos: Option<String>,
}
