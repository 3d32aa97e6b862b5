//! 题目讨论区

use std::sync::Arc;
use tracing::info;

use crate::error::{AppResult, AuthError, ValidationError};
use crate::infrastructure::Database;
use crate::models::{CommentThread, Discussion, Permission};
use crate::repository::{discussions, questions};
use crate::services::access::Session;

pub struct DiscussionService {
    db: Arc<Database>,
}

impl DiscussionService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn require_participation(session: &Session) -> AppResult<()> {
        if session.can(Permission::ParticipateDiscussion) || session.is_staff() {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                permission: Permission::ParticipateDiscussion.as_str().to_string(),
            }
            .into())
        }
    }

    fn clean_content(content: &str) -> AppResult<&str> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::MissingField("comment").into());
        }
        Ok(content)
    }

    /// 发表顶层评论
    pub fn post_comment(&self, session: &Session, question_id: i64, content: &str) -> AppResult<Discussion> {
        Self::require_participation(session)?;
        let content = Self::clean_content(content)?;
        let comment = self.db.with_conn(|conn| {
            questions::get(conn, question_id)?;
            let id = discussions::insert(conn, question_id, session.user_id, None, content)?;
            discussions::get(conn, id)
        })?;
        info!("💬 {} 评论了题目 {}", session.username, question_id);
        Ok(comment)
    }

    /// 回复评论，回复归入父评论所在的题目
    pub fn reply(&self, session: &Session, parent_id: i64, content: &str) -> AppResult<Discussion> {
        Self::require_participation(session)?;
        let content = Self::clean_content(content)?;
        self.db.with_conn(|conn| {
            let parent = discussions::get(conn, parent_id)?;
            let id = discussions::insert(conn, parent.question_id, session.user_id, Some(parent.id), content)?;
            discussions::get(conn, id)
        })
    }

    /// 某题的讨论：顶层评论最新在前，回复最早在前
    pub fn thread(&self, question_id: i64) -> AppResult<Vec<CommentThread>> {
        self.db.with_conn(|conn| {
            discussions::top_level(conn, question_id)?
                .into_iter()
                .map(|comment| -> AppResult<CommentThread> {
                    let replies = discussions::replies(conn, comment.discussion.id)?;
                    Ok(CommentThread { comment, replies })
                })
                .collect()
        })
    }
}
