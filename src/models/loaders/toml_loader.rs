//! 题库 TOML 文件的读写
//!
//! 一个文件对应一门课程：
//!
//! ```toml
//! [course]
//! title = "Algorithms"
//!
//! [[chapters]]
//! title = "Sorting"
//! ilos = "Explain merge sort"
//!
//! [[chapters.questions]]
//! content = "What is the worst case of quicksort?"
//! question_type = "Short Answer"
//! difficulty = 3.0
//! correct_answer = "O(n^2)"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::models::question::QuestionType;

/// 题库文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub course: BankCourse,
    #[serde(default)]
    pub chapters: Vec<BankChapter>,
    #[serde(skip)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankCourse {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankChapter {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ilos: Option<String>,
    #[serde(default)]
    pub questions: Vec<BankQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankQuestion {
    pub content: String,
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// 选择题的四个选项（不带 `A.` 前缀）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl QuestionBank {
    /// 题目总数
    pub fn question_count(&self) -> usize {
        self.chapters.iter().map(|c| c.questions.len()).sum()
    }
}

/// 从 TOML 文件加载题库
pub async fn load_question_bank(toml_file_path: &Path) -> Result<QuestionBank> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut bank: QuestionBank = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    bank.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(bank)
}

/// 从文件夹中加载所有题库文件，单个文件失败只记录警告
pub async fn load_all_question_banks(folder_path: &str) -> Result<Vec<QuestionBank>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut banks = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::info!(
                "正在加载: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_question_bank(&path).await {
                Ok(bank) => {
                    tracing::info!("成功加载 {} 个题目", bank.question_count());
                    banks.push(bank);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// 将题库写入 TOML 文件
pub async fn save_question_bank(bank: &QuestionBank, toml_file_path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(bank).context("无法序列化题库")?;
    fs::write(toml_file_path, content)
        .await
        .with_context(|| format!("无法写入TOML文件: {}", toml_file_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[course]
title = "Algorithms"

[[chapters]]
title = "Sorting"
ilos = """
Explain merge sort
Analyse quicksort
"""

[[chapters.questions]]
content = "Which sort is stable?"
question_type = "Multiple Choice"
difficulty = 2.0
correct_answer = "A. Merge sort"
options = ["Merge sort", "Heap sort", "Quicksort", "Selection sort"]

[[chapters.questions]]
content = "Worst case of quicksort?"
question_type = "Short Answer"
correct_answer = "O(n^2)"
"#;

    #[tokio::test]
    async fn test_load_and_save_bank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("algorithms.toml");
        tokio::fs::write(&path, SAMPLE).await.unwrap();

        let bank = load_question_bank(&path).await.unwrap();
        assert_eq!(bank.course.title, "Algorithms");
        assert_eq!(bank.question_count(), 2);
        assert_eq!(
            bank.chapters[0].questions[0].question_type,
            QuestionType::MultipleChoice
        );
        assert_eq!(bank.chapters[0].questions[1].difficulty, None);

        let out = dir.path().join("export.toml");
        save_question_bank(&bank, &out).await.unwrap();
        let reloaded = load_question_bank(&out).await.unwrap();
        assert_eq!(reloaded.chapters, bank.chapters);
    }

    #[tokio::test]
    async fn test_folder_loading_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("good.toml"), SAMPLE).await.unwrap();
        tokio::fs::write(dir.path().join("broken.toml"), "[course\n").await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), "ignored").await.unwrap();

        let banks = load_all_question_banks(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(banks.len(), 1);

        assert!(load_all_question_banks("/definitely/missing/folder").await.is_err());
    }
}
