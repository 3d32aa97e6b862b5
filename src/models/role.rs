use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::permission::PermissionSet;

/// 角色
///
/// `permissions` 保存原始 JSON 文本（命名布尔开关）
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub permissions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// 解析权限 JSON，格式错误时返回空集合
    pub fn permission_set(&self) -> PermissionSet {
        PermissionSet::parse_lenient(&self.permissions)
    }
}

/// 用户-角色关联
#[derive(Debug, Clone, Serialize)]
pub struct UserRole {
    pub user_id: i64,
    pub role_id: i64,
    pub created_at: DateTime<Utc>,
}
