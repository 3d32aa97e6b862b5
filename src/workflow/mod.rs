pub mod attempts;
pub mod exam_builder;
pub mod question_analysis;
pub mod question_ctx;
pub mod question_generator;

pub use attempts::{AttemptResult, AttemptService, Grade};
pub use exam_builder::{ExamDraft, ExamEdit, ExamFilter, ExamInfo};
pub use question_analysis::QuestionAnalyzer;
pub use question_ctx::QuestionCtx;
pub use question_generator::{QuestionGenerator, ReviewedQuestion};
