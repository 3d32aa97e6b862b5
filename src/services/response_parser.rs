//! LLM 响应解析
//!
//! 模型返回的文本并不总是合法 JSON，这里按顺序逐级尝试：
//!
//! 1. 去掉首尾空白后直接解析 JSON
//! 2. 去掉 markdown 代码块标记（```json ... ```）后解析
//! 3. 用正则截取最外层的 `{...}` 或 `[...]`（取先出现的括号）后解析
//! 4. 对解析出的对象逐字段取值、补默认值并限制范围
//! 5. 非 JSON 文本按字段名切分，尽量抢救出各字段
//! 6. 全部失败时把原文当作改进建议返回
//!
//! 每一级都是独立的公开函数，可以单独测试。

use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::models::question::{clamp_difficulty, split_tags, QuestionMetadataUpdate, QuestionType, StudentLevel};
use crate::utils::truncate_text;

static RE_CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").unwrap());
static RE_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static RE_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static RE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.?\d*").unwrap());
static RE_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static RE_MINUTES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*minutes?").unwrap());

/// 抢救时难度的默认值
pub const DEFAULT_DIFFICULTY: f64 = 3.0;
/// 预计时间的默认值（分钟）
pub const DEFAULT_ESTIMATED_TIME: i64 = 5;
pub const DEFAULT_IMPROVEMENTS: &str = "No specific improvements suggested.";
pub const DEFAULT_TAGS: &str = "education, assessment";

/// 结果来自哪一级解析
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseSource {
    StrictJson,
    CodeFence,
    Extracted,
    Sections,
    RawText,
}

/// 难度评审结果：评分 + 改进建议
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifficultyReview {
    /// 1.0-5.0，无法得到评分时为 `None`
    pub difficulty_rating: Option<f64>,
    pub suggestions: String,
}

/// 题目分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionAnalysis {
    pub difficulty: Option<f64>,
    pub estimated_time: Option<i64>,
    pub student_level: Option<StudentLevel>,
    pub improvements: Vec<String>,
    pub tags: Vec<String>,
    pub source: ParseSource,
}

impl QuestionAnalysis {
    /// 只包含文本、没有任何结构化字段的结果
    pub fn free_form(text: &str) -> Self {
        Self {
            difficulty: None,
            estimated_time: None,
            student_level: None,
            improvements: non_empty(text).into_iter().collect(),
            tags: Vec::new(),
            source: ParseSource::RawText,
        }
    }

    /// 可回写到题目上的字段
    pub fn metadata_update(&self) -> QuestionMetadataUpdate {
        QuestionMetadataUpdate {
            difficulty: self.difficulty,
            estimated_time: self.estimated_time,
            student_level: self.student_level.map(|l| l.as_str().to_string()),
            tags: (!self.tags.is_empty()).then(|| self.tags.join(", ")),
        }
    }

    pub fn improvements_text(&self) -> String {
        self.improvements.join("\n")
    }
}

/// LLM 生成的题目草稿
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedQuestion {
    pub content: String,
    pub question_type: Option<QuestionType>,
    /// 选择题选项（不带字母前缀）
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
    pub difficulty: Option<f64>,
    pub estimated_time: Option<i64>,
    pub student_level: Option<StudentLevel>,
    pub tags: Vec<String>,
}

// ========== 第 1-3 级：恢复 JSON ==========

/// 第 1 级：直接解析
pub fn parse_strict_json(text: &str) -> Option<JsonValue> {
    serde_json::from_str(text.trim()).ok()
}

/// 第 2 级：取出代码块内容后解析
pub fn parse_fenced_json(text: &str) -> Option<JsonValue> {
    let inner = RE_CODE_FENCE.captures(text)?.get(1)?.as_str();
    serde_json::from_str(inner).ok()
}

/// 截取最外层的对象或数组文本（贪婪匹配，取先出现的括号类型）
pub fn extract_bracketed(text: &str) -> Option<&str> {
    let object = RE_OBJECT.find(text);
    let array = RE_ARRAY.find(text);
    let found = match (object, array) {
        (Some(o), Some(a)) => {
            if a.start() < o.start() {
                a
            } else {
                o
            }
        }
        (Some(o), None) => o,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    Some(found.as_str())
}

/// 第 3 级：截取括号内容后解析
pub fn parse_extracted_json(text: &str) -> Option<JsonValue> {
    serde_json::from_str(extract_bracketed(text)?).ok()
}

/// 依次尝试第 1-3 级
pub fn recover_json(text: &str) -> Option<(JsonValue, ParseSource)> {
    if let Some(value) = parse_strict_json(text) {
        return Some((value, ParseSource::StrictJson));
    }
    if let Some(value) = parse_fenced_json(text) {
        debug!("从代码块中解析出 JSON");
        return Some((value, ParseSource::CodeFence));
    }
    if let Some(value) = parse_extracted_json(text) {
        debug!("从文本中截取出 JSON");
        return Some((value, ParseSource::Extracted));
    }
    None
}

// ========== 第 4 级：字段取值 ==========

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn first_field<'a>(object: &'a JsonValue, keys: &[&str]) -> Option<&'a JsonValue> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| !v.is_null())
}

/// 数字或含数字的字符串
pub fn number_field(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => RE_NUMBER.find(s).and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }
}

/// 难度，限制在 1.0-5.0
pub fn difficulty_field(value: &JsonValue) -> Option<f64> {
    number_field(value)
        .filter(|v| v.is_finite())
        .map(clamp_difficulty)
}

/// 预计时间（分钟），至少为 1
pub fn estimated_time_field(value: &JsonValue) -> Option<i64> {
    let minutes = match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        JsonValue::String(s) => RE_INTEGER.find(s).and_then(|m| m.as_str().parse().ok()),
        _ => None,
    }?;
    Some(minutes.max(1))
}

pub fn student_level_field(value: &JsonValue) -> Option<StudentLevel> {
    value.as_str().and_then(StudentLevel::detect)
}

/// 列表或单个字符串，去掉空项
pub fn text_list_field(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                JsonValue::String(s) => non_empty(s),
                JsonValue::Null => None,
                other => non_empty(&other.to_string()),
            })
            .collect(),
        JsonValue::String(s) => non_empty(s).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// 标签：列表或逗号分隔的字符串
pub fn tags_field(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::String(s) => split_tags(s),
        other => text_list_field(other)
            .iter()
            .flat_map(|t| split_tags(t))
            .collect(),
    }
}

/// 从 JSON 对象构造分析结果，非对象返回 `None`
pub fn analysis_from_json(value: &JsonValue, source: ParseSource) -> Option<QuestionAnalysis> {
    if !value.is_object() {
        return None;
    }
    Some(QuestionAnalysis {
        difficulty: first_field(value, &["difficulty", "difficulty_rating"]).and_then(difficulty_field),
        estimated_time: first_field(value, &["estimated_time"]).and_then(estimated_time_field),
        student_level: first_field(value, &["student_level"]).and_then(student_level_field),
        improvements: first_field(value, &["improvements", "improvement_suggestions"])
            .map(text_list_field)
            .unwrap_or_default(),
        tags: first_field(value, &["tags"]).map(tags_field).unwrap_or_default(),
        source,
    })
}

// ========== 第 5 级：按字段名切分 ==========

/// `start` 第一次出现之后、到 `start` 再次出现或 `end` 出现为止的文本
fn section<'a>(text: &'a str, start: &str, end: Option<&str>) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let mut rest = &text[from..];
    if let Some(next) = rest.find(start) {
        rest = &rest[..next];
    }
    if let Some(end) = end {
        if let Some(stop) = rest.find(end) {
            rest = &rest[..stop];
        }
    }
    Some(rest)
}

fn clean_section(text: &str) -> &str {
    text.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | ':' | ',' | '{' | '}' | '[' | ']') || c.is_whitespace())
}

/// 从非 JSON 文本中按字段名抢救分析结果；一个字段名都没有时返回 `None`
pub fn salvage_sections(text: &str) -> Option<QuestionAnalysis> {
    let keys = ["difficulty", "estimated_time", "student_level", "improvements", "tags"];
    if !keys.iter().any(|k| text.contains(k)) {
        return None;
    }

    let difficulty = section(text, "difficulty", Some("estimated_time")).map(|s| {
        RE_NUMBER
            .find(s)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(clamp_difficulty)
            .unwrap_or(DEFAULT_DIFFICULTY)
    });

    let estimated_time = section(text, "estimated_time", Some("student_level")).map(|s| {
        RE_INTEGER
            .find(s)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .map(|m| m.max(1))
            .unwrap_or(DEFAULT_ESTIMATED_TIME)
    });

    let student_level = section(text, "student_level", Some("improvements"))
        .map(|s| StudentLevel::detect(s).unwrap_or_default());

    let improvements = section(text, "improvements", Some("tags")).map(|s| {
        non_empty(clean_section(s)).unwrap_or_else(|| DEFAULT_IMPROVEMENTS.to_string())
    });

    let tags = section(text, "tags", None).map(|s| {
        let cleaned = clean_section(s);
        split_tags(&cleaned.replace('"', ""))
    });
    let tags = tags.map(|t| if t.is_empty() { split_tags(DEFAULT_TAGS) } else { t });

    Some(QuestionAnalysis {
        difficulty,
        estimated_time,
        student_level,
        improvements: improvements.into_iter().collect(),
        tags: tags.unwrap_or_default(),
        source: ParseSource::Sections,
    })
}

// ========== 对外入口 ==========

/// 解析难度评审响应（`{"difficulty_rating": .., "improvement_suggestions": ..}`）
///
/// 找不到 JSON 时返回原文作为建议，评分为 `None`。
pub fn parse_difficulty_review(text: &str) -> DifficultyReview {
    match recover_json(text) {
        Some((value, source)) if value.is_object() => {
            debug!("难度评审解析成功 ({:?})", source);
            let difficulty_rating =
                first_field(&value, &["difficulty_rating", "difficulty"]).and_then(difficulty_field);
            let suggestions = first_field(&value, &["improvement_suggestions", "improvements", "suggestions"])
                .map(text_list_field)
                .map(|items| items.join("\n"))
                .unwrap_or_default();
            DifficultyReview {
                difficulty_rating,
                suggestions,
            }
        }
        _ => {
            warn!(
                "无法从 LLM 响应中找到 JSON，原文作为建议返回: {}",
                truncate_text(text, 100)
            );
            DifficultyReview {
                difficulty_rating: None,
                suggestions: text.trim().to_string(),
            }
        }
    }
}

/// 解析题目分析响应（difficulty, estimated_time, student_level, improvements, tags）
pub fn parse_question_analysis(text: &str) -> QuestionAnalysis {
    if let Some(analysis) = recover_json(text).and_then(|(value, source)| analysis_from_json(&value, source)) {
        return analysis;
    }

    if let Some(analysis) = salvage_sections(text) {
        warn!("分析结果不是 JSON，已按字段名切分");
        return analysis;
    }

    warn!("分析结果无法解析，原文作为建议: {}", truncate_text(text, 100));
    QuestionAnalysis::free_form(text)
}

fn generated_from_json(value: &JsonValue) -> Option<GeneratedQuestion> {
    let content = first_field(value, &["content", "question"])
        .and_then(JsonValue::as_str)
        .and_then(non_empty)?;

    Some(GeneratedQuestion {
        content,
        question_type: first_field(value, &["question_type", "type"])
            .and_then(JsonValue::as_str)
            .map(QuestionType::from),
        options: first_field(value, &["options", "choices"])
            .map(text_list_field)
            .unwrap_or_default(),
        correct_answer: first_field(value, &["correct_answer", "answer"]).and_then(|v| match v {
            JsonValue::String(s) => non_empty(s),
            other => non_empty(&other.to_string()),
        }),
        explanation: first_field(value, &["explanation"])
            .and_then(JsonValue::as_str)
            .and_then(non_empty),
        difficulty: first_field(value, &["difficulty", "difficulty_rating"]).and_then(difficulty_field),
        estimated_time: first_field(value, &["estimated_time"]).and_then(estimated_time_field),
        student_level: first_field(value, &["student_level"]).and_then(student_level_field),
        tags: first_field(value, &["tags"]).map(tags_field).unwrap_or_default(),
    })
}

/// 解析生成题目的响应：数组、单个对象或 `{"questions": [...]}`，没有题干的条目丢弃
pub fn parse_generated_questions(text: &str) -> Vec<GeneratedQuestion> {
    let Some((value, source)) = recover_json(text) else {
        warn!("生成结果中找不到 JSON: {}", truncate_text(text, 100));
        return Vec::new();
    };
    debug!("生成结果解析成功 ({:?})", source);

    let items: Vec<JsonValue> = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut map) => match map.remove("questions") {
            Some(JsonValue::Array(items)) => items,
            Some(other) => {
                map.insert("questions".to_string(), other);
                vec![JsonValue::Object(map)]
            }
            None => vec![JsonValue::Object(map)],
        },
        _ => Vec::new(),
    };

    let total = items.len();
    let questions: Vec<GeneratedQuestion> = items.iter().filter_map(generated_from_json).collect();
    if questions.len() < total {
        warn!("丢弃了 {} 个缺少题干的生成条目", total - questions.len());
    }
    questions
}

/// 从文本中提取预计时间（`N minute(s)`），默认 5 分钟
pub fn extract_estimated_time(text: &str) -> i64 {
    RE_MINUTES
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_ESTIMATED_TIME)
}

/// 从文本中提取学生水平，默认 Intermediate
pub fn extract_student_level(text: &str) -> StudentLevel {
    StudentLevel::detect(text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_one_strict_json() {
        let review = parse_difficulty_review(
            r#"  {"difficulty_rating": 3.5, "improvement_suggestions": "Clarify the units."}  "#,
        );
        assert_eq!(review.difficulty_rating, Some(3.5));
        assert_eq!(review.suggestions, "Clarify the units.");
    }

    #[test]
    fn test_level_two_code_fence() {
        let text = "Here you go:\n```json\n{\"difficulty\": 2, \"tags\": [\"algebra\"]}\n```\nThanks";
        assert!(parse_strict_json(text).is_none());
        let (value, source) = recover_json(text).unwrap();
        assert_eq!(source, ParseSource::CodeFence);
        assert_eq!(value["difficulty"], 2);
    }

    #[test]
    fn test_level_three_extraction_picks_first_bracket() {
        assert_eq!(
            extract_bracketed(r#"Result: {"a": [1, 2]} done"#),
            Some(r#"{"a": [1, 2]}"#)
        );
        assert_eq!(
            extract_bracketed(r#"List: [{"content": "x"}] end"#),
            Some(r#"[{"content": "x"}]"#)
        );
        assert_eq!(extract_bracketed("no brackets"), None);

        let (_, source) = recover_json("Sure! {\"difficulty_rating\": 9} hope it helps").unwrap();
        assert_eq!(source, ParseSource::Extracted);
    }

    #[test]
    fn test_review_clamps_and_accepts_numeric_strings() {
        let high = parse_difficulty_review(r#"{"difficulty_rating": 9, "improvement_suggestions": "ok"}"#);
        assert_eq!(high.difficulty_rating, Some(5.0));

        let low = parse_difficulty_review(r#"{"difficulty_rating": "0.2", "improvement_suggestions": "ok"}"#);
        assert_eq!(low.difficulty_rating, Some(1.0));

        let missing = parse_difficulty_review(r#"{"improvement_suggestions": "Add context."}"#);
        assert_eq!(missing.difficulty_rating, None);
        assert_eq!(missing.suggestions, "Add context.");
    }

    #[test]
    fn test_review_without_json_returns_raw_text() {
        let review = parse_difficulty_review("The question is fine but too long.");
        assert_eq!(review.difficulty_rating, None);
        assert_eq!(review.suggestions, "The question is fine but too long.");

        let broken = parse_difficulty_review("{difficulty_rating: 3");
        assert_eq!(broken.difficulty_rating, None);
    }

    #[test]
    fn test_analysis_field_defaults() {
        let analysis = parse_question_analysis(
            r#"{"difficulty": "4 out of 5", "estimated_time": "about 10 minutes", "student_level": "advanced",
                "improvements": ["Add a diagram", "  "], "tags": "physics, , forces"}"#,
        );
        assert_eq!(analysis.difficulty, Some(4.0));
        assert_eq!(analysis.estimated_time, Some(10));
        assert_eq!(analysis.student_level, Some(StudentLevel::Advanced));
        assert_eq!(analysis.improvements, vec!["Add a diagram"]);
        assert_eq!(analysis.tags, vec!["physics", "forces"]);
        assert_eq!(analysis.source, ParseSource::StrictJson);

        let zero = parse_question_analysis(r#"{"estimated_time": 0, "tags": ["a, b", "c"]}"#);
        assert_eq!(zero.estimated_time, Some(1));
        assert_eq!(zero.tags, vec!["a", "b", "c"]);
        assert_eq!(zero.difficulty, None);
    }

    #[test]
    fn test_level_five_section_salvage() {
        let text = "difficulty: 3.5\nestimated_time: 8 minutes\nstudent_level: Beginner\n\
                    improvements: Use simpler wording\ntags: biology, cells";
        let analysis = parse_question_analysis(text);
        assert_eq!(analysis.source, ParseSource::Sections);
        assert_eq!(analysis.difficulty, Some(3.5));
        assert_eq!(analysis.estimated_time, Some(8));
        assert_eq!(analysis.student_level, Some(StudentLevel::Beginner));
        assert_eq!(analysis.improvements, vec!["Use simpler wording"]);
        assert_eq!(analysis.tags, vec!["biology", "cells"]);
    }

    #[test]
    fn test_section_salvage_defaults() {
        let analysis = salvage_sections("difficulty: hard\nestimated_time: a while\ntags:").unwrap();
        assert_eq!(analysis.difficulty, Some(DEFAULT_DIFFICULTY));
        assert_eq!(analysis.estimated_time, Some(DEFAULT_ESTIMATED_TIME));
        assert_eq!(analysis.student_level, None);
        assert_eq!(analysis.tags, vec!["education", "assessment"]);

        assert!(salvage_sections("nothing useful here").is_none());
    }

    #[test]
    fn test_level_six_free_form() {
        let analysis = parse_question_analysis("Looks good to me.");
        assert_eq!(analysis.source, ParseSource::RawText);
        assert_eq!(analysis.improvements, vec!["Looks good to me."]);
        assert_eq!(analysis.metadata_update(), QuestionMetadataUpdate::default());
    }

    #[test]
    fn test_metadata_update_from_analysis() {
        let analysis = parse_question_analysis(r#"{"difficulty": 2.5, "tags": ["sets", "logic"]}"#);
        let update = analysis.metadata_update();
        assert_eq!(update.difficulty, Some(2.5));
        assert_eq!(update.tags.as_deref(), Some("sets, logic"));
        assert_eq!(update.estimated_time, None);
    }

    #[test]
    fn test_generated_questions_shapes() {
        let array = parse_generated_questions(
            r#"```json
[{"content": "2+2?", "question_type": "Multiple Choice", "options": ["3", "4", "5", "6"],
  "correct_answer": "B. 4", "difficulty": 7},
 {"content": "   ", "correct_answer": "x"}]
```"#,
        );
        assert_eq!(array.len(), 1);
        assert_eq!(array[0].question_type, Some(QuestionType::MultipleChoice));
        assert_eq!(array[0].options.len(), 4);
        assert_eq!(array[0].difficulty, Some(5.0));

        let wrapped = parse_generated_questions(r#"{"questions": [{"question": "Define entropy", "answer": 42}]}"#);
        assert_eq!(wrapped[0].content, "Define entropy");
        assert_eq!(wrapped[0].correct_answer.as_deref(), Some("42"));

        let single = parse_generated_questions(r#"{"content": "Name a noble gas"}"#);
        assert_eq!(single.len(), 1);

        assert!(parse_generated_questions("I cannot help with that").is_empty());
    }

    #[test]
    fn test_extract_time_and_level() {
        assert_eq!(extract_estimated_time("Students need 12 Minutes to answer"), 12);
        assert_eq!(extract_estimated_time("roughly 1 minute"), 1);
        assert_eq!(extract_estimated_time("no estimate"), 5);

        assert_eq!(extract_student_level("best for INTERMEDIATE or advanced"), StudentLevel::Intermediate);
        assert_eq!(extract_student_level("nothing"), StudentLevel::Intermediate);
        assert_eq!(extract_student_level("a beginner question"), StudentLevel::Beginner);
    }
}
