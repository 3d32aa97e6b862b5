use academic_insight_hub::config::Config;
use academic_insight_hub::error::{AppError, AuthError, LlmError};
use academic_insight_hub::logger;
use academic_insight_hub::models::{
    load_question_bank, save_question_bank, ChapterInput, CourseInput, QuestionType, StudentLevel,
};
use academic_insight_hub::orchestrator::{initialize, BatchAnalyzer};
use academic_insight_hub::repository::questions;
use academic_insight_hub::services::auth_service::RegisterRequest;
use academic_insight_hub::services::content_service::QuestionDraft;
use academic_insight_hub::services::feedback_service::FeedbackInput;
use academic_insight_hub::services::{
    AnalyticsService, AuthService, ChatModel, ChatRequest, ContentService, DiscussionService,
    FeedbackService, LlmService, Session,
};
use academic_insight_hub::workflow::{
    AttemptService, ExamDraft, ExamFilter, ExamInfo, Grade, QuestionAnalyzer, QuestionCtx,
    QuestionGenerator,
};
use academic_insight_hub::Database;
use anyhow::anyhow;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// 按顺序返回预先写好的回复；回复用完后重复最后一条
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        let reply = match next {
            Some(reply) => {
                *self.last.lock().unwrap() = Some(reply.clone());
                reply
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err("no scripted reply".to_string())),
        };
        reply.map_err(|e| anyhow!(e))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct Fixture {
    db: Arc<Database>,
    admin: Session,
    professor: Session,
    student: Session,
    course_id: i64,
    chapter_id: i64,
}

/// 初始化数据库，创建教授、学生以及一门带 ILO 的课程
fn fixture() -> Fixture {
    logger::init(false);
    let db = Arc::new(Database::open_in_memory().unwrap());
    let config = Config::default();
    initialize(&db, &config).unwrap();

    let auth = AuthService::new(db.clone());
    let admin = auth.login(&config.admin_username, &config.admin_password).unwrap();

    auth.create_user(&admin, "prof_smith", "smith@example.com", "Teach#2024", "professor")
        .unwrap();
    let professor = auth.login("prof_smith", "Teach#2024").unwrap();

    auth.register(&RegisterRequest {
        username: "alice".into(),
        email: "alice@example.com".into(),
        password: "Study#2024".into(),
        confirm_password: "Study#2024".into(),
        role: "student".into(),
    })
    .unwrap();
    let student = auth.login("alice@example.com", "Study#2024").unwrap();

    let content = ContentService::new(db.clone());
    let course = content
        .create_course(
            &professor,
            &CourseInput {
                title: "Biology 101".into(),
                description: Some("Introductory biology".into()),
            },
        )
        .unwrap();
    let chapter = content
        .create_chapter(
            &professor,
            &ChapterInput {
                course_id: course.id,
                title: "Cells".into(),
                summary: None,
                ilos: Some("Describe the cell membrane\nExplain osmosis".into()),
            },
        )
        .unwrap();

    Fixture {
        db,
        admin,
        professor,
        student,
        course_id: course.id,
        chapter_id: chapter.id,
    }
}

fn short_answer(chapter_id: i64, content: &str, answer: &str, difficulty: f64) -> QuestionDraft {
    QuestionDraft {
        chapter_id,
        content: content.into(),
        question_type: Some(QuestionType::ShortAnswer),
        correct_answer: Some(answer.into()),
        explanation: Some("See chapter notes".into()),
        difficulty: Some(difficulty),
        ..QuestionDraft::default()
    }
}

fn count(db: &Database, table: &str) -> i64 {
    db.with_conn(|conn| Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?))
        .unwrap()
}

#[test]
fn test_bootstrap_and_login() {
    let f = fixture();
    assert_eq!(f.admin.role, "admin");
    assert_eq!(f.professor.role, "professor");
    assert_eq!(f.student.role, "student");
    assert!(!f.student.is_staff());

    let auth = AuthService::new(f.db.clone());
    assert!(matches!(
        auth.login("alice", "wrong-password"),
        Err(AppError::Auth(AuthError::InvalidCredentials))
    ));

    let admin_attempt = auth.register(&RegisterRequest {
        username: "mallory".into(),
        email: "mallory@example.com".into(),
        password: "Hack#2024x".into(),
        confirm_password: "Hack#2024x".into(),
        role: "admin".into(),
    });
    assert!(matches!(admin_attempt, Err(AppError::Auth(AuthError::NotAllowed(_)))));
}

#[test]
fn test_student_cannot_manage_content() {
    let f = fixture();
    let content = ContentService::new(f.db.clone());
    let err = content
        .create_course(
            &f.student,
            &CourseInput {
                title: "Hacking".into(),
                description: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::Forbidden { .. })));
}

#[test]
fn test_attempts_feedback_and_discussion() {
    let f = fixture();
    let content = ContentService::new(f.db.clone());
    let question = content
        .create_question(&f.professor, short_answer(f.chapter_id, "Name the process", "osmosis", 2.0))
        .unwrap();

    let attempts = AttemptService::new(f.db.clone());
    let first = attempts.submit_answer(&f.student, question.id, "diffusion").unwrap();
    assert!(matches!(first.grade, Grade::Incorrect { .. }));
    let second = attempts.submit_answer(&f.student, question.id, "Osmosis").unwrap();
    assert_eq!(second.grade, Grade::Correct);
    let third = attempts.submit_answer(&f.student, question.id, "no idea").unwrap();
    assert_eq!(third.progress.attempts, 3);
    assert!(third.progress.correct, "wrong answers never reset correctness");

    let report = AnalyticsService::new(f.db.clone()).my_progress(&f.student).unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.success_rate, 100.0);
    assert_eq!(report.average_attempts, 3.0);

    let feedback = FeedbackService::new(f.db.clone());
    let input = FeedbackInput {
        difficulty_rating: 4.0,
        student_gpa: 3.1,
        attendance_percent: 90.0,
    };
    let saved = feedback.submit(&f.student, question.id, input).unwrap();
    assert!((saved.attendance_rate - 0.9).abs() < 1e-9);
    assert!(feedback.submit(&f.student, question.id, input).is_err());
    let updated = feedback
        .update(&f.student, question.id, FeedbackInput { difficulty_rating: 2.5, ..input })
        .unwrap();
    assert_eq!(updated.difficulty_rating, 2.5);
    assert_eq!(feedback.for_question(&f.professor, question.id).unwrap().len(), 1);
    assert!(feedback.for_question(&f.student, question.id).is_err());

    let discussion = DiscussionService::new(f.db.clone());
    let first_comment = discussion.post_comment(&f.student, question.id, "Is diffusion accepted?").unwrap();
    discussion.post_comment(&f.student, question.id, "Second thought").unwrap();
    discussion
        .reply(&f.professor, first_comment.id, "No, the answer is osmosis")
        .unwrap();
    assert!(discussion.post_comment(&f.student, question.id, "   ").is_err());

    let thread = discussion.thread(question.id).unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].comment.discussion.content, "Second thought");
    assert_eq!(thread[1].replies.len(), 1);
    assert_eq!(thread[1].replies[0].author, "prof_smith");

    let overview = AnalyticsService::new(f.db.clone())
        .course_overview(&f.professor, Some(f.course_id))
        .unwrap();
    assert_eq!(overview.questions, 1);
    assert_eq!(overview.correct_attempts, 1);
    assert_eq!(overview.feedback.len(), 1);
}

#[test]
fn test_essay_self_evaluation() {
    let f = fixture();
    let content = ContentService::new(f.db.clone());
    let essay = content
        .create_question(
            &f.professor,
            QuestionDraft {
                chapter_id: f.chapter_id,
                content: "Discuss the role of the cell membrane".into(),
                question_type: Some(QuestionType::Essay),
                correct_answer: Some("It regulates transport and signalling".into()),
                ..QuestionDraft::default()
            },
        )
        .unwrap();

    let attempts = AttemptService::new(f.db.clone());
    let result = attempts.submit_answer(&f.student, essay.id, "It keeps things in").unwrap();
    assert_eq!(
        result.grade,
        Grade::SelfEvaluate {
            model_answer: Some("It regulates transport and signalling".into())
        }
    );
    assert!(!result.progress.correct);

    let progress = attempts.record_self_evaluation(&f.student, essay.id, true).unwrap();
    assert!(progress.correct);
    assert_eq!(progress.attempts, 1);
    let progress = attempts.record_self_evaluation(&f.student, essay.id, false).unwrap();
    assert!(!progress.correct, "self-evaluation can withdraw correctness");

    let short = content
        .create_question(&f.professor, short_answer(f.chapter_id, "Name the process", "osmosis", 2.0))
        .unwrap();
    let err = attempts.record_self_evaluation(&f.student, short.id, true).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = attempts.record_self_evaluation(&f.professor, essay.id, true).unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::Forbidden { .. })));
}

#[tokio::test]
async fn test_export_import_course_bank() {
    let f = fixture();
    let content = ContentService::new(f.db.clone());
    content
        .create_question(
            &f.professor,
            QuestionDraft {
                chapter_id: f.chapter_id,
                content: "Which planet is the largest?".into(),
                question_type: Some(QuestionType::MultipleChoice),
                options: vec!["Mars".into(), "Jupiter".into(), "Venus".into(), "Earth".into()],
                correct_answer: Some("B".into()),
                explanation: Some("Jupiter is a gas giant".into()),
                difficulty: Some(2.0),
                ..QuestionDraft::default()
            },
        )
        .unwrap();

    let bank = content.export_course(&f.professor, f.course_id).unwrap();
    assert_eq!(bank.course.title, "Biology 101");
    let exported = bank.chapters[0].questions[0].clone();
    assert_eq!(exported.correct_answer.as_deref(), Some("B. Jupiter"));
    assert_eq!(exported.options, vec!["Mars", "Jupiter", "Venus", "Earth"]);

    // 写入 TOML 再读回，导入为新课程
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("biology.toml");
    save_question_bank(&bank, &path).await.unwrap();
    let mut reloaded = load_question_bank(&path).await.unwrap();
    assert_eq!(reloaded.chapters, bank.chapters);

    reloaded.course.title = "Biology 102".into();
    let summary = content.import_bank(&f.professor, &reloaded).unwrap();
    assert_ne!(summary.course_id, f.course_id);
    assert_eq!((summary.chapters, summary.imported, summary.skipped), (1, 1, 0));
    let copy = content.export_course(&f.professor, summary.course_id).unwrap();
    assert_eq!(copy.chapters, bank.chapters);

    let answers: Vec<String> = f
        .db
        .with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT correct_answer FROM questions ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(rows)
        })
        .unwrap();
    assert_eq!(answers, vec!["B. Jupiter|A. Mars|B. Jupiter|C. Venus|D. Earth"; 2]);

    // 同名课程复用，不合格的题目跳过
    let mut revised = bank.clone();
    revised.chapters[0].title = "Cells (revised)".into();
    let mut blank = exported.clone();
    blank.content = "   ".into();
    let mut too_hard = exported.clone();
    too_hard.content = "Rate this".into();
    too_hard.difficulty = Some(9.0);
    revised.chapters[0].questions.extend([blank, too_hard]);

    let summary = content.import_bank(&f.professor, &revised).unwrap();
    assert_eq!(summary.course_id, f.course_id);
    assert_eq!((summary.chapters, summary.imported, summary.skipped), (1, 1, 2));
    assert_eq!(content.export_course(&f.professor, f.course_id).unwrap().chapters.len(), 2);
    assert_eq!(count(&f.db, "courses"), 2);
    assert_eq!(count(&f.db, "questions"), 3);

    for err in [
        content.import_bank(&f.student, &reloaded).unwrap_err(),
        content.export_course(&f.student, f.course_id).unwrap_err(),
    ] {
        assert!(matches!(err, AppError::Auth(AuthError::Forbidden { .. })));
    }
}

#[test]
fn test_exam_save_and_course_cascade() {
    let f = fixture();
    let content = ContentService::new(f.db.clone());
    for i in 0..6 {
        content
            .create_question(
                &f.professor,
                short_answer(f.chapter_id, &format!("Question {}", i), "answer", 1.0 + i as f64 * 0.5),
            )
            .unwrap();
    }

    let filter = ExamFilter::new(f.course_id, vec![f.chapter_id]);
    let mut draft = ExamDraft::load_candidates(&f.db, &filter, 2).unwrap();
    let mut rng = StdRng::seed_from_u64(2024);
    draft.auto_generate(5, 2, &mut rng).unwrap();
    let detail = draft
        .save(
            &f.db,
            &f.professor,
            ExamInfo {
                title: "Quiz 1".into(),
                description: Some("Cells".into()),
                time_limit: 30,
            },
        )
        .unwrap();
    assert_eq!(detail.questions.len(), 5);
    assert_eq!(detail.exam.total_points, 10);

    let question_id = detail.questions[0].question_id;
    AttemptService::new(f.db.clone())
        .submit_answer(&f.student, question_id, "answer")
        .unwrap();
    DiscussionService::new(f.db.clone())
        .post_comment(&f.student, question_id, "hello")
        .unwrap();

    content.delete_course(&f.professor, f.course_id).unwrap();
    for table in [
        "chapters",
        "questions",
        "exams",
        "exam_questions",
        "student_progress",
        "discussions",
    ] {
        assert_eq!(count(&f.db, table), 0, "{} should be empty", table);
    }
    assert_eq!(count(&f.db, "users"), 3);
}

#[tokio::test]
async fn test_add_question_with_ai_uses_review() {
    let f = fixture();
    let model = ScriptedModel::new(vec![Ok(r#"Here is my review:
```json
{"difficulty_rating": 3.5, "improvement_suggestions": "Suitable for advanced students, takes about 8 minutes."}
```"#)]);
    let analyzer = Arc::new(QuestionAnalyzer::new(model.clone(), f.db.clone()));
    let generator = QuestionGenerator::new(analyzer);

    let draft = QuestionDraft {
        chapter_id: f.chapter_id,
        content: "Which structure controls what enters the cell?".into(),
        question_type: Some(QuestionType::MultipleChoice),
        options: vec!["Nucleus".into(), "Membrane".into(), "Ribosome".into(), "Wall".into()],
        correct_answer: Some("B".into()),
        explanation: Some("The membrane is selectively permeable".into()),
        ..QuestionDraft::default()
    };
    let reviewed = generator.add_question_with_ai(&f.professor, draft).await.unwrap();
    assert_eq!(reviewed.question.difficulty, Some(3.5));
    assert_eq!(reviewed.question.estimated_time, Some(8));
    assert_eq!(reviewed.question.student_level.as_deref(), Some("Advanced"));

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].user.contains("Biology 101"));
    assert!(requests[0].user.contains("Explain osmosis"));
}

#[tokio::test]
async fn test_add_question_with_ai_requires_rating() {
    let f = fixture();
    let model = ScriptedModel::new(vec![Ok("I am not able to rate this question.")]);
    let generator = QuestionGenerator::new(Arc::new(QuestionAnalyzer::new(model, f.db.clone())));

    let err = generator
        .add_question_with_ai(&f.professor, short_answer(f.chapter_id, "Define osmosis", "water movement", 2.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Llm(LlmError::AnalysisFailed)));
    assert_eq!(count(&f.db, "questions"), 0);
}

#[tokio::test]
async fn test_review_transport_error_becomes_suggestion() {
    let f = fixture();
    let model = ScriptedModel::new(vec![Err("connection reset")]);
    let analyzer = QuestionAnalyzer::new(model, f.db.clone());
    let ctx = f
        .db
        .with_conn(|conn| QuestionCtx::load(conn, f.chapter_id, "What is ATP?", QuestionType::ShortAnswer))
        .unwrap();

    let review = analyzer.review_difficulty(&ctx).await;
    assert_eq!(review.difficulty_rating, None);
    assert!(review.suggestions.starts_with("Error calling LLM API:"));
    assert!(review.suggestions.contains("connection reset"));
}

#[tokio::test]
async fn test_batch_analysis_applies_results() {
    let f = fixture();
    let content = ContentService::new(f.db.clone());
    for i in 0..3 {
        content
            .create_question(
                &f.professor,
                short_answer(f.chapter_id, &format!("Explain step {}", i), "answer", 1.0),
            )
            .unwrap();
    }

    let model = ScriptedModel::new(vec![Ok(
        r#"{"difficulty": 4.2, "estimated_time": "12 minutes", "student_level": "Advanced", "improvements": ["Add a diagram"], "tags": ["cells", "membrane"]}"#,
    )]);
    let analyzer = Arc::new(QuestionAnalyzer::new(model, f.db.clone()));
    let report = BatchAnalyzer::new(analyzer, 2)
        .analyze_chapter(f.chapter_id, true)
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.success, 3);
    assert_eq!(report.failed, 0);
    let stored = f
        .db
        .with_conn(|conn| questions::for_chapter(conn, f.chapter_id))
        .unwrap();
    for question in stored {
        assert_eq!(question.difficulty, Some(4.2));
        assert_eq!(question.estimated_time, Some(12));
        assert_eq!(question.student_level.as_deref(), Some("Advanced"));
        assert_eq!(question.tags.as_deref(), Some("cells, membrane"));
    }
}

#[tokio::test]
async fn test_generate_and_save_questions() {
    let f = fixture();
    let model = ScriptedModel::new(vec![Ok(r#"[
        {"content": "What does the membrane regulate?", "question_type": "Multiple Choice",
         "options": ["Transport", "Heat", "Light", "Sound"], "correct_answer": "A. Transport",
         "explanation": "It controls transport", "difficulty": 2, "estimated_time": 3,
         "student_level": "Beginner", "tags": ["membrane"]},
        {"question_type": "Multiple Choice"}
    ]"#)]);
    let generator = QuestionGenerator::new(Arc::new(QuestionAnalyzer::new(model, f.db.clone())));

    let drafts = generator
        .generate_questions(&f.professor, f.chapter_id, 2, QuestionType::MultipleChoice, StudentLevel::Beginner)
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);

    let saved = generator.save_generated(&f.professor, drafts).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].difficulty, Some(2.0));
    assert_eq!(
        saved[0].choice_options().map(|(correct, _)| correct).as_deref(),
        Some("A. Transport")
    );

    assert!(generator
        .generate_questions(&f.student, f.chapter_id, 2, QuestionType::Essay, StudentLevel::Beginner)
        .await
        .is_err());
}

#[tokio::test]
#[ignore] // 需要 GROQ_API_KEY，手动运行：cargo test -- --ignored
async fn test_real_llm_difficulty_review() {
    logger::init(false);
    let config = Config::from_env();
    let model: Arc<dyn ChatModel> = Arc::new(LlmService::new(&config).expect("未配置 LLM API Key"));
    let f = fixture();
    let analyzer = QuestionAnalyzer::new(model, f.db.clone());
    let ctx = f
        .db
        .with_conn(|conn| {
            QuestionCtx::load(
                conn,
                f.chapter_id,
                "Explain why red blood cells burst in distilled water.",
                QuestionType::ShortAnswer,
            )
        })
        .unwrap();

    let review = analyzer.review_difficulty(&ctx).await;
    assert!(review.difficulty_rating.is_some(), "建议: {}", review.suggestions);
}
