use chrono::{DateTime, Utc};
use serde::Serialize;

/// 讨论（`parent_id` 为空表示顶层评论）
#[derive(Debug, Clone, Serialize)]
pub struct Discussion {
    pub id: i64,
    pub question_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 带作者名的讨论条目
#[derive(Debug, Clone, Serialize)]
pub struct DiscussionEntry {
    pub discussion: Discussion,
    pub author: String,
}

/// 顶层评论及其回复
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    pub comment: DiscussionEntry,
    pub replies: Vec<DiscussionEntry>,
}
