//! 权限模型
//!
//! 角色的权限以 JSON 对象保存：`{"create_course": true, ...}`。
//! 只有显式为 `true` 的开关才视为拥有该权限。

use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// 系统内使用的权限开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    CreateCourse,
    EditCourse,
    DeleteCourse,
    CreateChapter,
    EditChapter,
    DeleteChapter,
    CreateQuestion,
    EditQuestion,
    DeleteQuestion,
    ViewCourse,
    ViewChapter,
    ViewQuestion,
    ViewAnalytics,
    ViewFeedback,
    ExportData,
    ImportData,
    ManageUsers,
    ManageRoles,
    SystemSettings,
    SubmitFeedback,
    AttemptQuestion,
    ViewProgress,
    ParticipateDiscussion,
    GradeSubmissions,
}

impl Permission {
    /// 全部权限
    pub const ALL: [Permission; 24] = [
        Permission::CreateCourse,
        Permission::EditCourse,
        Permission::DeleteCourse,
        Permission::CreateChapter,
        Permission::EditChapter,
        Permission::DeleteChapter,
        Permission::CreateQuestion,
        Permission::EditQuestion,
        Permission::DeleteQuestion,
        Permission::ViewCourse,
        Permission::ViewChapter,
        Permission::ViewQuestion,
        Permission::ViewAnalytics,
        Permission::ViewFeedback,
        Permission::ExportData,
        Permission::ImportData,
        Permission::ManageUsers,
        Permission::ManageRoles,
        Permission::SystemSettings,
        Permission::SubmitFeedback,
        Permission::AttemptQuestion,
        Permission::ViewProgress,
        Permission::ParticipateDiscussion,
        Permission::GradeSubmissions,
    ];

    /// JSON 中使用的键名
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::CreateCourse => "create_course",
            Permission::EditCourse => "edit_course",
            Permission::DeleteCourse => "delete_course",
            Permission::CreateChapter => "create_chapter",
            Permission::EditChapter => "edit_chapter",
            Permission::DeleteChapter => "delete_chapter",
            Permission::CreateQuestion => "create_question",
            Permission::EditQuestion => "edit_question",
            Permission::DeleteQuestion => "delete_question",
            Permission::ViewCourse => "view_course",
            Permission::ViewChapter => "view_chapter",
            Permission::ViewQuestion => "view_question",
            Permission::ViewAnalytics => "view_analytics",
            Permission::ViewFeedback => "view_feedback",
            Permission::ExportData => "export_data",
            Permission::ImportData => "import_data",
            Permission::ManageUsers => "manage_users",
            Permission::ManageRoles => "manage_roles",
            Permission::SystemSettings => "system_settings",
            Permission::SubmitFeedback => "submit_feedback",
            Permission::AttemptQuestion => "attempt_question",
            Permission::ViewProgress => "view_progress",
            Permission::ParticipateDiscussion => "participate_discussion",
            Permission::GradeSubmissions => "grade_submissions",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == key)
            .ok_or_else(|| format!("unknown permission: {}", s))
    }
}

/// 权限集合（JSON 对象，保留未知键）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionSet {
    flags: Map<String, JsonValue>,
}

impl PermissionSet {
    /// 由一组权限构造（全部为 true）
    pub fn from_permissions(permissions: &[Permission]) -> Self {
        let flags = permissions
            .iter()
            .map(|p| (p.as_str().to_string(), JsonValue::Bool(true)))
            .collect();
        Self { flags }
    }

    /// 严格解析，必须是 JSON 对象
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let flags: Map<String, JsonValue> = serde_json::from_str(json)?;
        Ok(Self { flags })
    }

    /// 宽松解析：无法解析时记录日志并返回空集合
    pub fn parse_lenient(json: &str) -> Self {
        match Self::parse(json) {
            Ok(set) => set,
            Err(e) => {
                warn!("权限 JSON 解析失败，按无权限处理: {}", e);
                Self::default()
            }
        }
    }

    /// 是否显式授予了某个开关
    pub fn allows_key(&self, key: &str) -> bool {
        matches!(self.flags.get(key), Some(JsonValue::Bool(true)))
    }

    /// 是否拥有某个权限
    pub fn allows(&self, permission: Permission) -> bool {
        self.allows_key(permission.as_str())
    }

    /// 设置开关
    pub fn set(&mut self, key: impl Into<String>, enabled: bool) {
        self.flags.insert(key.into(), JsonValue::Bool(enabled));
    }

    /// 合并另一个集合：任一方为 true 即为 true
    pub fn merge(&mut self, other: &PermissionSet) {
        for (key, value) in &other.flags {
            if self.allows_key(key) {
                continue;
            }
            let granted = matches!(value, JsonValue::Bool(true));
            if granted || !self.flags.contains_key(key) {
                self.flags.insert(key.clone(), value.clone());
            }
        }
    }

    /// 显式授予的开关名（按字母序）
    pub fn granted(&self) -> Vec<String> {
        self.flags
            .iter()
            .filter(|(_, v)| matches!(v, JsonValue::Bool(true)))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// 序列化为 JSON 文本
    pub fn to_json(&self) -> String {
        JsonValue::Object(self.flags.clone()).to_string()
    }
}

/// 默认角色及其权限
pub fn default_roles() -> Vec<(&'static str, PermissionSet)> {
    use Permission::*;

    let content_management = [
        CreateCourse,
        EditCourse,
        DeleteCourse,
        CreateChapter,
        EditChapter,
        DeleteChapter,
        CreateQuestion,
        EditQuestion,
        DeleteQuestion,
        ViewAnalytics,
        ViewFeedback,
        ExportData,
        ImportData,
    ];

    let mut admin = content_management.to_vec();
    admin.extend([ManageUsers, ManageRoles, SystemSettings]);

    vec![
        ("professor", PermissionSet::from_permissions(&content_management)),
        (
            "student",
            PermissionSet::from_permissions(&[
                ViewCourse,
                ViewChapter,
                ViewQuestion,
                SubmitFeedback,
                AttemptQuestion,
                ViewProgress,
                ParticipateDiscussion,
            ]),
        ),
        ("admin", PermissionSet::from_permissions(&admin)),
        (
            "teaching_assistant",
            PermissionSet::from_permissions(&[
                ViewCourse,
                ViewChapter,
                ViewQuestion,
                CreateQuestion,
                EditQuestion,
                ViewAnalytics,
                ViewFeedback,
                GradeSubmissions,
                ParticipateDiscussion,
            ]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_explicit_true_allows() {
        let set = PermissionSet::parse(
            r#"{"create_course": true, "edit_course": false, "view_analytics": "yes", "custom_flag": true}"#,
        )
        .unwrap();
        assert!(set.allows(Permission::CreateCourse));
        assert!(!set.allows(Permission::EditCourse));
        assert!(!set.allows(Permission::ViewAnalytics));
        assert!(!set.allows(Permission::DeleteCourse));
        assert!(set.allows_key("custom_flag"));
    }

    #[test]
    fn test_lenient_parse_of_broken_blob() {
        assert_eq!(PermissionSet::parse_lenient("not json"), PermissionSet::default());
        assert_eq!(PermissionSet::parse_lenient("[true]"), PermissionSet::default());
    }

    #[test]
    fn test_merge_is_union() {
        let mut a = PermissionSet::parse(r#"{"view_course": true, "edit_course": false}"#).unwrap();
        let b = PermissionSet::parse(r#"{"edit_course": true, "export_data": false}"#).unwrap();
        a.merge(&b);
        assert!(a.allows(Permission::ViewCourse));
        assert!(a.allows(Permission::EditCourse));
        assert!(!a.allows(Permission::ExportData));
    }

    #[test]
    fn test_unknown_keys_survive_roundtrip() {
        let set = PermissionSet::parse(r#"{"can_add_course": true}"#).unwrap();
        let again = PermissionSet::parse(&set.to_json()).unwrap();
        assert!(again.allows_key("can_add_course"));
    }

    #[test]
    fn test_default_role_maps() {
        let roles = default_roles();
        let admin = &roles.iter().find(|(n, _)| *n == "admin").unwrap().1;
        assert!(admin.allows(Permission::ManageRoles));
        assert!(!admin.allows(Permission::AttemptQuestion));

        let student = &roles.iter().find(|(n, _)| *n == "student").unwrap().1;
        assert!(student.allows(Permission::AttemptQuestion));
        assert!(!student.allows(Permission::CreateQuestion));

        assert_eq!("Manage_Users".parse::<Permission>(), Ok(Permission::ManageUsers));
    }
}
