use chrono::{DateTime, Utc};
use serde::Serialize;

/// 用户
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// PBKDF2 哈希（十六进制）
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub salt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// 新建用户所需字段（密码已哈希）
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub salt: String,
}

/// 用户及其角色名（用户管理列表）
#[derive(Debug, Clone, Serialize)]
pub struct UserWithRoles {
    pub user: User,
    pub roles: Vec<String>,
}
