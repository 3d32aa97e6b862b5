pub mod course;
pub mod discussion;
pub mod exam;
pub mod feedback;
pub mod loaders;
pub mod permission;
pub mod question;
pub mod role;
pub mod user;

pub use course::{Chapter, ChapterInput, Course, CourseInput};
pub use discussion::{CommentThread, Discussion, DiscussionEntry};
pub use exam::{CandidateQuestion, Exam, ExamDetail, ExamQuestion, NewExam};
pub use feedback::{StudentFeedback, StudentProgress};
pub use loaders::{load_question_bank, save_question_bank, QuestionBank};
pub use permission::{Permission, PermissionSet};
pub use question::{
    Question, QuestionInput, QuestionMetadataUpdate, QuestionType, StudentLevel,
};
pub use role::{Role, UserRole};
pub use user::{NewUser, User, UserWithRoles};
