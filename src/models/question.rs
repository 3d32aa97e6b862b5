use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 难度下限
pub const MIN_DIFFICULTY: f64 = 1.0;
/// 难度上限
pub const MAX_DIFFICULTY: f64 = 5.0;

/// 将难度限制在 1.0-5.0 之间
pub fn clamp_difficulty(value: f64) -> f64 {
    value.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// 题型
///
/// 数据库中保存展示名（如 `Multiple Choice`），未知题型原样保留
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
    Other(String),
}

impl QuestionType {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::MultipleChoice => "Multiple Choice",
            QuestionType::TrueFalse => "True/False",
            QuestionType::ShortAnswer => "Short Answer",
            QuestionType::Essay => "Essay",
            QuestionType::Other(name) => name,
        }
    }
}

impl From<String> for QuestionType {
    fn from(value: String) -> Self {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "multiplechoice" | "mcq" => QuestionType::MultipleChoice,
            "truefalse" => QuestionType::TrueFalse,
            "shortanswer" => QuestionType::ShortAnswer,
            "essay" => QuestionType::Essay,
            _ => QuestionType::Other(value),
        }
    }
}

impl From<&str> for QuestionType {
    fn from(value: &str) -> Self {
        QuestionType::from(value.to_string())
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 适用学生水平
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudentLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl StudentLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            StudentLevel::Beginner => "Beginner",
            StudentLevel::Intermediate => "Intermediate",
            StudentLevel::Advanced => "Advanced",
        }
    }

    /// 从任意文本中识别水平（不区分大小写，取第一个出现的关键字）
    pub fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        [
            StudentLevel::Beginner,
            StudentLevel::Intermediate,
            StudentLevel::Advanced,
        ]
        .into_iter()
        .filter_map(|level| {
            lower
                .find(&level.as_str().to_lowercase())
                .map(|pos| (pos, level))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, level)| level)
    }
}

impl Default for StudentLevel {
    fn default() -> Self {
        StudentLevel::Intermediate
    }
}

impl fmt::Display for StudentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 题目
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub chapter_id: i64,
    pub content: String,
    /// 1.0-5.0
    pub difficulty: Option<f64>,
    /// 预计作答时间（分钟）
    pub estimated_time: Option<i64>,
    pub student_level: Option<String>,
    /// 逗号分隔的标签
    pub tags: Option<String>,
    pub question_type: QuestionType,
    /// 选择题格式: `正确选项|A. ...|B. ...|C. ...|D. ...`
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    /// 标签列表
    pub fn tag_list(&self) -> Vec<String> {
        split_tags(self.tags.as_deref().unwrap_or_default())
    }

    /// 选择题的正确选项和全部选项
    pub fn choice_options(&self) -> Option<(String, Vec<String>)> {
        if self.question_type != QuestionType::MultipleChoice {
            return None;
        }
        let raw = self.correct_answer.as_deref()?;
        let mut parts = raw.split('|').map(str::to_string);
        let correct = parts.next()?;
        Some((correct, parts.collect()))
    }
}

/// 拆分逗号分隔的标签，去掉空项
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 将正确答案和四个选项编码为 `correct|A. ...|B. ...` 格式
pub fn encode_choice_answer(correct: &str, options: &[String]) -> String {
    let labelled: Vec<String> = options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {}", (b'A' + i as u8) as char, option))
        .collect();
    std::iter::once(correct.to_string())
        .chain(labelled)
        .collect::<Vec<_>>()
        .join("|")
}

/// 新建/编辑题目的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionInput {
    pub chapter_id: i64,
    pub content: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub estimated_time: Option<i64>,
    #[serde(default)]
    pub student_level: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// AI 分析得出、可回写到题目上的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionMetadataUpdate {
    pub difficulty: Option<f64>,
    pub estimated_time: Option<i64>,
    pub student_level: Option<String>,
    pub tags: Option<String>,
}
