//! 命令执行
//!
//! `App` 持有数据库和配置，按子命令调用各个服务。

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::cli::{
    ChapterCommands, Cli, Commands, CourseCommands, ExamCommands, QuestionCommands, RoleCommands,
    UserCommands,
};
use crate::config::Config;
use crate::infrastructure::Database;
use crate::models::loaders::load_all_question_banks;
use crate::models::{
    load_question_bank, save_question_bank, ChapterInput, CourseInput, Permission, QuestionType,
    StudentLevel,
};
use crate::orchestrator::{bootstrap, BatchAnalyzer, BootstrapReport};
use crate::repository::{exams, questions, users, QuestionQuery};
use crate::services::content_service::QuestionDraft;
use crate::services::{
    AccessService, AnalyticsService, AuthService, ChatModel, ContentService, LlmService, Session,
};
use crate::utils::logging::log_startup;
use crate::workflow::{
    AttemptService, ExamDraft, ExamFilter, ExamInfo, QuestionAnalyzer, QuestionCtx,
    QuestionGenerator,
};

/// 应用主结构
pub struct App {
    config: Config,
    db: Arc<Database>,
    bootstrap: BootstrapReport,
}

impl App {
    /// 打开数据库并完成初始化
    pub fn initialize(config: Config) -> Result<Self> {
        log_startup(config.database_path(), config.llm_enabled());

        let db = Arc::new(
            Database::open(config.database_path())
                .with_context(|| format!("无法打开数据库: {}", config.database_path()))?,
        );
        let bootstrap = bootstrap::initialize(&db, &config)?;

        Ok(Self {
            config,
            db,
            bootstrap,
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// 执行一条命令
    pub async fn run(&self, cli: Cli) -> Result<()> {
        let acting_as = cli.acting_as.as_deref();
        match cli.command {
            Commands::Init => {
                if self.bootstrap.admin_created {
                    println!("Initialized. Admin account '{}' created.", self.config.admin_username);
                } else {
                    println!("Already initialized.");
                }
            }
            Commands::User { action } => self.run_user(self.session(acting_as)?, action)?,
            Commands::Role { action } => self.run_role(self.session(acting_as)?, action)?,
            Commands::Course { action } => self.run_course(self.session(acting_as)?, action).await?,
            Commands::Chapter { action } => self.run_chapter(self.session(acting_as)?, action)?,
            Commands::Question { action } => self.run_question(self.session(acting_as)?, action).await?,
            Commands::Analyze { chapter_id, apply } => {
                let session = self.session(acting_as)?;
                session.require_staff()?;
                let batch = BatchAnalyzer::new(self.analyzer()?, self.config.max_concurrent_analyses);
                let report = batch.analyze_chapter(chapter_id, apply).await?;
                for outcome in &report.outcomes {
                    match &outcome.result {
                        Ok(analysis) => println!(
                            "#{} difficulty={:?} time={:?} level={:?} tags={}",
                            outcome.question_id,
                            analysis.difficulty,
                            analysis.estimated_time,
                            analysis.student_level,
                            analysis.tags.join(", ")
                        ),
                        Err(e) => println!("#{} failed: {:#}", outcome.question_id, e),
                    }
                }
            }
            Commands::Review { question_id } => {
                let session = self.session(acting_as)?;
                session.require_staff()?;
                let ctx = self.db.with_conn(|conn| {
                    let question = questions::get(conn, question_id)?;
                    QuestionCtx::load(conn, question.chapter_id, question.content, question.question_type)
                })?;
                let review = self.analyzer()?.review_difficulty(&ctx).await;
                print_json(&review)?;
            }
            Commands::Generate {
                chapter_id,
                count,
                question_type,
                level,
                save,
            } => {
                let session = self.session(acting_as)?;
                let level = StudentLevel::detect(&level).ok_or_else(|| anyhow!("unknown student level: {}", level))?;
                let generator = QuestionGenerator::new(self.analyzer()?);
                let drafts = generator
                    .generate_questions(&session, chapter_id, count, QuestionType::from(question_type), level)
                    .await?;
                for (i, draft) in drafts.iter().enumerate() {
                    println!("{}. [{:?}] {}", i + 1, draft.difficulty, draft.content);
                }
                if save {
                    let saved = generator.save_generated(&session, drafts)?;
                    println!("Saved {} questions.", saved.len());
                }
            }
            Commands::Exam { action } => self.run_exam(self.session(acting_as)?, action)?,
            Commands::Answer {
                question_id,
                answer,
                self_eval,
            } => {
                let session = self.session(acting_as)?;
                let attempts = AttemptService::new(self.db.clone());
                match (answer, self_eval) {
                    (_, Some(correct)) => {
                        let progress = attempts.record_self_evaluation(&session, question_id, correct)?;
                        print_json(&progress)?;
                    }
                    (Some(answer), None) => {
                        let result = attempts.submit_answer(&session, question_id, &answer)?;
                        print_json(&result)?;
                    }
                    (None, None) => anyhow::bail!("Please provide an answer or --self-eval"),
                }
            }
            Commands::Progress => {
                let session = self.session(acting_as)?;
                let report = AnalyticsService::new(self.db.clone()).my_progress(&session)?;
                print_json(&report)?;
            }
            Commands::Stats { course } => {
                let session = self.session(acting_as)?;
                let overview = AnalyticsService::new(self.db.clone()).course_overview(&session, course)?;
                print_json(&overview)?;
                for stats in &overview.course_stats {
                    println!(
                        "{:<30} chapters={:<3} questions={:<4} avg difficulty={}",
                        stats.title,
                        stats.chapters,
                        stats.questions,
                        stats
                            .average_difficulty
                            .map(|d| format!("{:.2}", d))
                            .unwrap_or_else(|| "-".to_string())
                    );
                }
            }
        }
        Ok(())
    }

    /// 当前操作者（默认为管理员）
    fn session(&self, acting_as: Option<&str>) -> Result<Session> {
        let username = acting_as.unwrap_or(&self.config.admin_username);
        let session = AccessService::new(self.db.clone())
            .session_for(username)
            .with_context(|| format!("无法以用户 {} 的身份执行", username))?;
        info!("操作者: {} ({})", session.username, session.role);
        Ok(session)
    }

    fn analyzer(&self) -> Result<Arc<QuestionAnalyzer>> {
        let model: Arc<dyn ChatModel> = Arc::new(LlmService::new(&self.config)?);
        Ok(Arc::new(QuestionAnalyzer::new(model, self.db.clone())))
    }

    fn user_id(&self, username: &str) -> Result<i64> {
        self.db
            .with_conn(|conn| users::find_by_username(conn, username))?
            .map(|u| u.id)
            .ok_or_else(|| anyhow!("user '{}' not found", username))
    }

    fn run_user(&self, session: Session, action: UserCommands) -> Result<()> {
        let auth = AuthService::new(self.db.clone());
        match action {
            UserCommands::Add {
                username,
                email,
                password,
                role,
            } => {
                let user = auth.create_user(&session, &username, &email, &password, &role)?;
                println!("Created user #{} {}", user.id, user.username);
            }
            UserCommands::List => {
                for entry in auth.list_users(&session)? {
                    println!(
                        "#{:<4} {:<20} {:<30} {}",
                        entry.user.id,
                        entry.user.username,
                        entry.user.email,
                        entry.roles.join(", ")
                    );
                }
            }
            UserCommands::SetRole { username, role } => {
                auth.set_user_role(&session, self.user_id(&username)?, &role)?;
                println!("{} is now {}", username, role);
            }
            UserCommands::AddRole { username, role } => {
                AccessService::new(self.db.clone()).assign_role(&session, self.user_id(&username)?, &role)?;
                println!("{} now also has role {}", username, role);
            }
            UserCommands::Delete { username } => {
                auth.delete_user(&session, self.user_id(&username)?)?;
                println!("Deleted {}", username);
            }
        }
        Ok(())
    }

    fn run_role(&self, session: Session, action: RoleCommands) -> Result<()> {
        let access = AccessService::new(self.db.clone());
        match action {
            RoleCommands::List => {
                for role in access.list_roles(&session)? {
                    println!("{:<20} {}", role.name, role.permission_set().granted().join(", "));
                }
            }
            RoleCommands::Grant { role, permission } => {
                let permission: Permission = permission.parse().map_err(|e: String| anyhow!(e))?;
                access.grant(&session, &role, permission)?;
                println!("Granted {} to {}", permission, role);
            }
            RoleCommands::Revoke { role, permission } => {
                let permission: Permission = permission.parse().map_err(|e: String| anyhow!(e))?;
                access.revoke(&session, &role, permission)?;
                println!("Revoked {} from {}", permission, role);
            }
            RoleCommands::Create { name, permissions } => {
                let permissions = permissions
                    .iter()
                    .map(|p| p.parse::<Permission>().map_err(|e| anyhow!(e)))
                    .collect::<Result<Vec<_>>>()?;
                let role = access.create_role(&session, &name, &permissions)?;
                println!("Created role {}", role.name);
            }
        }
        Ok(())
    }

    async fn run_course(&self, session: Session, action: CourseCommands) -> Result<()> {
        let content = ContentService::new(self.db.clone());
        match action {
            CourseCommands::Add { title, description } => {
                let course = content.create_course(&session, &CourseInput { title, description })?;
                println!("Created course #{} {}", course.id, course.title);
            }
            CourseCommands::List { search } => {
                for course in content.list_courses(search.as_deref())? {
                    println!("#{:<4} {}", course.id, course.title);
                }
            }
            CourseCommands::Delete { id } => {
                content.delete_course(&session, id)?;
                println!("Deleted course #{}", id);
            }
            CourseCommands::Export { id, path } => {
                let bank = content.export_course(&session, id)?;
                save_question_bank(&bank, Path::new(&path)).await?;
                println!("Exported {} questions to {}", bank.question_count(), path);
            }
        }
        Ok(())
    }

    fn run_chapter(&self, session: Session, action: ChapterCommands) -> Result<()> {
        let content = ContentService::new(self.db.clone());
        match action {
            ChapterCommands::Add {
                course_id,
                title,
                summary,
                ilos,
            } => {
                let chapter = content.create_chapter(
                    &session,
                    &ChapterInput {
                        course_id,
                        title,
                        summary,
                        ilos,
                    },
                )?;
                println!("Created chapter #{} {}", chapter.id, chapter.title);
            }
        }
        Ok(())
    }

    async fn run_question(&self, session: Session, action: QuestionCommands) -> Result<()> {
        let content = ContentService::new(self.db.clone());
        match action {
            QuestionCommands::Add {
                chapter,
                content: text,
                question_type,
                options,
                answer,
                explanation,
                difficulty,
                tags,
                ai,
            } => {
                let draft = QuestionDraft {
                    chapter_id: chapter,
                    content: text,
                    question_type: Some(QuestionType::from(question_type)),
                    options,
                    correct_answer: answer,
                    explanation,
                    difficulty,
                    tags,
                    ..QuestionDraft::default()
                };
                if ai {
                    let generator = QuestionGenerator::new(self.analyzer()?);
                    let reviewed = generator.add_question_with_ai(&session, draft).await?;
                    println!(
                        "Created question #{} (difficulty {:?})",
                        reviewed.question.id, reviewed.question.difficulty
                    );
                    println!("{}", reviewed.review.suggestions);
                } else {
                    let question = content.create_question(&session, draft)?;
                    println!("Created question #{}", question.id);
                }
            }
            QuestionCommands::List {
                course,
                chapter,
                search,
                page,
                per_page,
            } => {
                let query = QuestionQuery {
                    course_id: course,
                    chapter_id: chapter,
                    search,
                    ..QuestionQuery::default()
                };
                let page = content.list_questions(&query, per_page, page)?;
                for question in &page.items {
                    println!(
                        "#{:<5} [{}] {:?} {}",
                        question.id, question.question_type, question.difficulty, question.content
                    );
                }
                println!("Page {}/{} ({} questions)", page.page, page.total_pages, page.total_items);
            }
            QuestionCommands::Import { path } => {
                // 目录则导入其中全部 .toml 文件
                let banks = if Path::new(&path).is_dir() {
                    load_all_question_banks(&path).await?
                } else {
                    vec![load_question_bank(Path::new(&path)).await?]
                };
                for bank in &banks {
                    let summary = content.import_bank(&session, bank)?;
                    println!(
                        "Imported {} questions into course #{} ({} chapters, {} skipped)",
                        summary.imported, summary.course_id, summary.chapters, summary.skipped
                    );
                }
            }
        }
        Ok(())
    }

    fn run_exam(&self, session: Session, action: ExamCommands) -> Result<()> {
        match action {
            ExamCommands::Build {
                course,
                chapters,
                min_difficulty,
                max_difficulty,
                types,
                total,
                points,
                title,
                description,
                time_limit,
                seed,
            } => {
                let filter = ExamFilter {
                    difficulty_min: min_difficulty,
                    difficulty_max: max_difficulty,
                    question_types: types.into_iter().map(QuestionType::from).collect(),
                    ..ExamFilter::new(course, chapters)
                };
                let mut draft = ExamDraft::load_candidates(&self.db, &filter, points)?;
                let mut rng = match seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                draft.auto_generate(total, points, &mut rng)?;
                let detail = draft.save(
                    &self.db,
                    &session,
                    ExamInfo {
                        title,
                        description,
                        time_limit,
                    },
                )?;
                println!(
                    "Saved exam #{} with {} questions ({} points)",
                    detail.exam.id,
                    detail.questions.len(),
                    detail.exam.total_points
                );
            }
            ExamCommands::Show { id } => {
                let detail = self.db.with_conn(|conn| exams::detail(conn, id))?;
                println!(
                    "{} ({} min, {} points)",
                    detail.exam.title, detail.exam.time_limit, detail.exam.total_points
                );
                for item in &detail.questions {
                    let question = self.db.with_conn(|conn| questions::get(conn, item.question_id))?;
                    println!("{:>3}. [{} pts] {}", item.order, item.points, question.content);
                }
            }
        }
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
