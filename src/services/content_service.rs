//! 课程、章节、题目的增删改查，以及题库 TOML 导入导出

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, ValidationError};
use crate::infrastructure::Database;
use crate::models::loaders::{BankChapter, BankCourse, BankQuestion};
use crate::models::question::{encode_choice_answer, MAX_DIFFICULTY, MIN_DIFFICULTY};
use crate::models::{
    Chapter, ChapterInput, Course, CourseInput, Permission, Question, QuestionBank, QuestionInput,
    QuestionType,
};
use crate::repository::{courses, questions, QuestionQuery};
use crate::services::access::Session;
use crate::utils::{paginate, Page};

/// 选择题的选项数
pub const CHOICE_OPTION_COUNT: usize = 4;

/// 题目草稿（选择题的选项单独给出，保存时编码进 `correct_answer`）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionDraft {
    pub chapter_id: i64,
    pub content: String,
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<f64>,
    #[serde(default)]
    pub estimated_time: Option<i64>,
    #[serde(default)]
    pub student_level: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

impl QuestionDraft {
    /// 校验并转换为可保存的输入
    ///
    /// `require_solution` 为 true 时正确答案和解析都必须填写。
    pub fn into_input(self, require_solution: bool) -> AppResult<QuestionInput> {
        let content = self.content.trim().to_string();
        if content.is_empty() {
            return Err(ValidationError::MissingField("question content").into());
        }
        let correct_answer = self.correct_answer.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let explanation = self.explanation.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if require_solution && (correct_answer.is_none() || explanation.is_none()) {
            return Err(ValidationError::MissingField("correct answer and explanation").into());
        }

        if let Some(difficulty) = self.difficulty {
            if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
                return Err(ValidationError::OutOfRange {
                    field: "difficulty",
                    min: MIN_DIFFICULTY,
                    max: MAX_DIFFICULTY,
                    value: difficulty,
                }
                .into());
            }
        }
        if let Some(minutes) = self.estimated_time {
            if minutes < 1 {
                return Err(AppError::invalid("Estimated time must be at least 1 minute"));
            }
        }

        let question_type = self.question_type.unwrap_or(QuestionType::ShortAnswer);
        let correct_answer = if question_type == QuestionType::MultipleChoice {
            Some(encode_choice(&self.options, correct_answer)?)
        } else {
            correct_answer.map(str::to_string)
        };

        Ok(QuestionInput {
            chapter_id: self.chapter_id,
            content,
            question_type,
            difficulty: self.difficulty,
            estimated_time: self.estimated_time,
            student_level: self.student_level,
            tags: self.tags.filter(|t| !t.trim().is_empty()),
            correct_answer,
            explanation: explanation.map(str::to_string),
        })
    }
}

/// 选择题：检查四个选项并把正确答案规范为 `B. 选项` 的形式
fn encode_choice(options: &[String], correct: Option<&str>) -> AppResult<String> {
    let options: Vec<String> = options.iter().map(|o| o.trim().to_string()).collect();
    if options.len() != CHOICE_OPTION_COUNT || options.iter().any(String::is_empty) {
        return Err(AppError::invalid("Multiple Choice questions need four non-empty options"));
    }
    let correct = correct.ok_or(ValidationError::MissingField("correct option"))?;

    let labelled: Vec<String> = options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {}", (b'A' + i as u8) as char, option))
        .collect();

    let index = labelled
        .iter()
        .position(|l| l == correct)
        .or_else(|| options.iter().position(|o| o == correct))
        .or_else(|| {
            let letter = correct.trim_end_matches(&['.', ')'][..]).to_ascii_uppercase();
            match letter.as_bytes() {
                [b @ b'A'..=b'D'] => Some((b - b'A') as usize),
                _ => None,
            }
        })
        .ok_or_else(|| AppError::invalid("Correct answer must be one of the options"))?;

    Ok(encode_choice_answer(&labelled[index], &options))
}

/// 导入结果
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub course_id: i64,
    pub chapters: usize,
    pub imported: usize,
    pub skipped: usize,
}

/// 内容管理服务
pub struct ContentService {
    db: Arc<Database>,
}

impl ContentService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // ========== 课程 ==========

    pub fn create_course(&self, session: &Session, input: &CourseInput) -> AppResult<Course> {
        session.require(Permission::CreateCourse)?;
        require_title(&input.title, "course title")?;
        let course = self.db.with_conn(|conn| {
            let id = courses::insert_course(conn, input, Some(session.user_id))?;
            courses::get_course(conn, id)
        })?;
        info!("✓ 新建课程: {}", course.title);
        Ok(course)
    }

    pub fn edit_course(&self, session: &Session, id: i64, input: &CourseInput) -> AppResult<Course> {
        session.require(Permission::EditCourse)?;
        require_title(&input.title, "course title")?;
        self.db.with_conn(|conn| {
            courses::update_course(conn, id, input)?;
            courses::get_course(conn, id)
        })
    }

    pub fn delete_course(&self, session: &Session, id: i64) -> AppResult<()> {
        session.require(Permission::DeleteCourse)?;
        self.db.with_conn(|conn| courses::delete_course(conn, id))?;
        info!("已删除课程 {}", id);
        Ok(())
    }

    pub fn course(&self, id: i64) -> AppResult<Course> {
        self.db.with_conn(|conn| courses::get_course(conn, id))
    }

    pub fn list_courses(&self, search: Option<&str>) -> AppResult<Vec<Course>> {
        self.db.with_conn(|conn| courses::list_courses(conn, search))
    }

    // ========== 章节 ==========

    pub fn create_chapter(&self, session: &Session, input: &ChapterInput) -> AppResult<Chapter> {
        session.require(Permission::CreateChapter)?;
        require_title(&input.title, "chapter title")?;
        self.db.with_conn(|conn| {
            courses::get_course(conn, input.course_id)?;
            let id = courses::insert_chapter(conn, input)?;
            courses::get_chapter(conn, id)
        })
    }

    pub fn edit_chapter(&self, session: &Session, id: i64, input: &ChapterInput) -> AppResult<Chapter> {
        session.require(Permission::EditChapter)?;
        require_title(&input.title, "chapter title")?;
        self.db.with_conn(|conn| {
            courses::update_chapter(conn, id, input)?;
            courses::get_chapter(conn, id)
        })
    }

    pub fn delete_chapter(&self, session: &Session, id: i64) -> AppResult<()> {
        session.require(Permission::DeleteChapter)?;
        self.db.with_conn(|conn| courses::delete_chapter(conn, id))
    }

    pub fn chapter(&self, id: i64) -> AppResult<Chapter> {
        self.db.with_conn(|conn| courses::get_chapter(conn, id))
    }

    pub fn chapters(&self, course_id: i64, search: Option<&str>) -> AppResult<Vec<Chapter>> {
        self.db
            .with_conn(|conn| courses::chapters_for_course(conn, course_id, search))
    }

    // ========== 题目 ==========

    pub fn create_question(&self, session: &Session, draft: QuestionDraft) -> AppResult<Question> {
        session.require(Permission::CreateQuestion)?;
        let input = draft.into_input(false)?;
        self.insert_question(&input)
    }

    /// 写入已校验的题目（章节必须存在）
    pub(crate) fn insert_question(&self, input: &QuestionInput) -> AppResult<Question> {
        let question = self.db.with_conn(|conn| {
            courses::get_chapter(conn, input.chapter_id)?;
            let id = questions::insert(conn, input)?;
            questions::get(conn, id)
        })?;
        info!("✓ 新建题目 {} ({})", question.id, question.question_type);
        Ok(question)
    }

    pub fn edit_question(&self, session: &Session, id: i64, draft: QuestionDraft) -> AppResult<Question> {
        session.require(Permission::EditQuestion)?;
        let input = draft.into_input(false)?;
        self.db.with_conn(|conn| {
            courses::get_chapter(conn, input.chapter_id)?;
            questions::update(conn, id, &input)?;
            questions::get(conn, id)
        })
    }

    pub fn delete_question(&self, session: &Session, id: i64) -> AppResult<()> {
        session.require(Permission::DeleteQuestion)?;
        self.db.with_conn(|conn| questions::delete(conn, id))
    }

    pub fn question(&self, id: i64) -> AppResult<Question> {
        self.db.with_conn(|conn| questions::get(conn, id))
    }

    /// 分页查询题目
    pub fn list_questions(&self, query: &QuestionQuery, per_page: usize, page: usize) -> AppResult<Page<Question>> {
        let all = self.db.with_conn(|conn| questions::list(conn, query))?;
        Ok(paginate(&all, per_page, page))
    }

    // ========== 导入导出 ==========

    /// 导入题库：同名课程复用，章节新建；不合格的题目跳过并记录警告
    pub fn import_bank(&self, session: &Session, bank: &QuestionBank) -> AppResult<ImportSummary> {
        session.require(Permission::ImportData)?;
        require_title(&bank.course.title, "course title")?;

        let summary = self.db.transaction(|tx| {
            let course_id = match courses::find_course_by_title(tx, &bank.course.title)? {
                Some(course) => course.id,
                None => courses::insert_course(
                    tx,
                    &CourseInput {
                        title: bank.course.title.clone(),
                        description: bank.course.description.clone(),
                    },
                    Some(session.user_id),
                )?,
            };

            let mut summary = ImportSummary {
                course_id,
                chapters: 0,
                imported: 0,
                skipped: 0,
            };

            for chapter in &bank.chapters {
                require_title(&chapter.title, "chapter title")?;
                let chapter_id = courses::insert_chapter(
                    tx,
                    &ChapterInput {
                        course_id,
                        title: chapter.title.clone(),
                        summary: chapter.summary.clone(),
                        ilos: chapter.ilos.clone(),
                    },
                )?;
                summary.chapters += 1;

                for (i, question) in chapter.questions.iter().enumerate() {
                    match bank_question_to_draft(chapter_id, question).into_input(false) {
                        Ok(input) => {
                            questions::insert(tx, &input)?;
                            summary.imported += 1;
                        }
                        Err(e) => {
                            warn!("跳过章节 '{}' 的第 {} 题: {}", chapter.title, i + 1, e);
                            summary.skipped += 1;
                        }
                    }
                }
            }
            Ok(summary)
        })?;

        info!(
            "📥 导入完成: {} 个章节, {} 道题目, 跳过 {} 道",
            summary.chapters, summary.imported, summary.skipped
        );
        Ok(summary)
    }

    /// 导出课程为题库结构
    pub fn export_course(&self, session: &Session, course_id: i64) -> AppResult<QuestionBank> {
        session.require(Permission::ExportData)?;
        self.db.with_conn(|conn| {
            let course = courses::get_course(conn, course_id)?;
            let chapters = courses::chapters_for_course(conn, course_id, None)?
                .into_iter()
                .map(|chapter| -> AppResult<BankChapter> {
                    let items = questions::for_chapter(conn, chapter.id)?
                        .iter()
                        .map(question_to_bank)
                        .collect();
                    Ok(BankChapter {
                        title: chapter.title,
                        summary: chapter.summary,
                        ilos: chapter.ilos,
                        questions: items,
                    })
                })
                .collect::<AppResult<Vec<_>>>()?;

            Ok(QuestionBank {
                course: BankCourse {
                    title: course.title,
                    description: course.description,
                },
                chapters,
                file_path: None,
            })
        })
    }
}

fn require_title(title: &str, field: &'static str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(ValidationError::MissingField(field).into());
    }
    Ok(())
}

fn bank_question_to_draft(chapter_id: i64, question: &BankQuestion) -> QuestionDraft {
    QuestionDraft {
        chapter_id,
        content: question.content.clone(),
        question_type: Some(question.question_type.clone()),
        options: question.options.clone(),
        correct_answer: question.correct_answer.clone(),
        explanation: question.explanation.clone(),
        difficulty: question.difficulty,
        estimated_time: question.estimated_time,
        student_level: question.student_level.clone(),
        tags: question.tags.clone(),
    }
}

fn question_to_bank(question: &Question) -> BankQuestion {
    let (correct_answer, options) = match question.choice_options() {
        Some((correct, labelled)) => {
            let options = labelled
                .iter()
                .map(|o| strip_option_label(o).to_string())
                .collect();
            (Some(correct), options)
        }
        None => (question.correct_answer.clone(), Vec::new()),
    };

    BankQuestion {
        content: question.content.clone(),
        question_type: question.question_type.clone(),
        difficulty: question.difficulty,
        estimated_time: question.estimated_time,
        student_level: question.student_level.clone(),
        tags: question.tags.clone(),
        correct_answer,
        options,
        explanation: question.explanation.clone(),
    }
}

/// 去掉 `A. ` 形式的选项前缀
fn strip_option_label(option: &str) -> &str {
    match option.as_bytes() {
        [b'A'..=b'Z', b'.', b' ', ..] => &option[3..],
        _ => option,
    }
}
