//! 仓储层
//!
//! 每个实体一个文件，函数均接收 `&Connection`，由调用方决定是否放进事务。

pub mod courses;
pub mod discussions;
pub mod exams;
pub mod feedback;
pub mod progress;
pub mod questions;
pub mod roles;
pub mod stats;
pub mod users;

pub use questions::QuestionQuery;

/// 是否为唯一约束冲突
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}
