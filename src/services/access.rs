//! 基于角色的访问控制
//!
//! 登录后得到 [`Session`]：主角色取最早分配的角色，权限取所有角色的并集。

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppResult, AuthError, ValidationError};
use crate::infrastructure::Database;
use crate::models::permission::default_roles;
use crate::models::{Permission, PermissionSet, Role, User};
use crate::repository::{roles, users};

/// 可以使用 AI 分析等教师功能的角色
pub const STAFF_ROLES: [&str; 3] = ["professor", "admin", "teaching_assistant"];

/// 已登录用户
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    /// 主角色
    pub role: String,
    #[serde(skip)]
    pub permissions: PermissionSet,
}

impl Session {
    /// 根据用户的角色构造会话，没有任何角色时返回 `RoleMissing`
    pub fn for_user(conn: &rusqlite::Connection, user: &User) -> AppResult<Self> {
        let assigned = roles::roles_for_user(conn, user.id)?;
        let primary = assigned.first().ok_or(AuthError::RoleMissing)?;

        let mut permissions = PermissionSet::default();
        for role in &assigned {
            permissions.merge(&role.permission_set());
        }

        Ok(Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: primary.name.clone(),
            permissions,
        })
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.allows(permission)
    }

    /// 要求拥有某个权限
    pub fn require(&self, permission: Permission) -> AppResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                permission: permission.as_str().to_string(),
            }
            .into())
        }
    }

    /// 是否为教职角色（professor / admin / teaching_assistant）
    pub fn is_staff(&self) -> bool {
        STAFF_ROLES.contains(&self.role.as_str())
    }

    /// 要求教职角色
    pub fn require_staff(&self) -> AppResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                permission: "use staff features".to_string(),
            }
            .into())
        }
    }
}

/// 写入默认角色；已存在的角色会被更新为默认权限
pub fn seed_default_roles(conn: &rusqlite::Connection) -> AppResult<()> {
    for (name, permissions) in default_roles() {
        roles::upsert(conn, name, &permissions)?;
        info!("角色已就绪: {}", name);
    }
    Ok(())
}

/// 角色管理
pub struct AccessService {
    db: Arc<Database>,
}

impl AccessService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// 以用户名加载会话
    pub fn session_for(&self, username: &str) -> AppResult<Session> {
        self.db.with_conn(|conn| {
            let user = users::find_by_username(conn, username)?
                .ok_or(AuthError::InvalidCredentials)?;
            Session::for_user(conn, &user)
        })
    }

    pub fn list_roles(&self, session: &Session) -> AppResult<Vec<Role>> {
        session.require(Permission::ManageRoles)?;
        self.db.with_conn(roles::list)
    }

    /// 新建角色（名称转为小写，不能重复）
    pub fn create_role(&self, session: &Session, name: &str, permissions: &[Permission]) -> AppResult<Role> {
        session.require(Permission::ManageRoles)?;
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Err(ValidationError::MissingField("role name").into());
        }

        let role = self.db.with_conn(|conn| {
            let id = roles::insert(conn, &name, &PermissionSet::from_permissions(permissions))?;
            roles::get(conn, id)
        })?;
        info!("✓ 已创建角色 {} ({} 项权限)", role.name, permissions.len());
        Ok(role)
    }

    /// 打开或关闭角色的某个权限
    pub fn set_permission(
        &self,
        session: &Session,
        role_name: &str,
        permission: Permission,
        enabled: bool,
    ) -> AppResult<Role> {
        session.require(Permission::ManageRoles)?;
        self.db.transaction(|tx| {
            let role = find_role(tx, role_name)?;
            let mut permissions = role.permission_set();
            permissions.set(permission.as_str(), enabled);
            roles::update_permissions(tx, role.id, &permissions)?;
            roles::get(tx, role.id)
        })
    }

    pub fn grant(&self, session: &Session, role_name: &str, permission: Permission) -> AppResult<Role> {
        self.set_permission(session, role_name, permission, true)
    }

    pub fn revoke(&self, session: &Session, role_name: &str, permission: Permission) -> AppResult<Role> {
        self.set_permission(session, role_name, permission, false)
    }

    /// 删除角色（用户关联随之删除）
    pub fn delete_role(&self, session: &Session, role_name: &str) -> AppResult<()> {
        session.require(Permission::ManageRoles)?;
        self.db.with_conn(|conn| {
            let role = find_role(conn, role_name)?;
            roles::delete(conn, role.id)
        })?;
        info!("已删除角色 {}", role_name);
        Ok(())
    }

    /// 给用户追加角色
    pub fn assign_role(&self, session: &Session, user_id: i64, role_name: &str) -> AppResult<()> {
        session.require(Permission::ManageUsers)?;
        self.db.with_conn(|conn| {
            users::get(conn, user_id)?;
            let role = find_role(conn, role_name)?;
            roles::assign(conn, user_id, role.id)
        })
    }
}

pub(crate) fn find_role(conn: &rusqlite::Connection, name: &str) -> AppResult<Role> {
    roles::find_by_name(conn, name)?
        .ok_or_else(|| ValidationError::Invalid(format!("Role '{}' does not exist", name)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::NewUser;

    fn setup() -> (Arc<Database>, i64) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let user_id = db
            .with_conn(|conn| {
                seed_default_roles(conn)?;
                let id = users::insert(
                    conn,
                    &NewUser {
                        username: "root".into(),
                        email: "root@example.com".into(),
                        password_hash: "h".into(),
                        salt: "s".into(),
                    },
                )?;
                let admin = find_role(conn, "admin")?;
                roles::assign(conn, id, admin.id)?;
                Ok(id)
            })
            .unwrap();
        (db, user_id)
    }

    #[test]
    fn test_session_union_of_roles() {
        let (db, user_id) = setup();
        let service = AccessService::new(db);
        let admin = service.session_for("root").unwrap();
        service.assign_role(&admin, user_id, "student").unwrap();
        // 重复分配不会报错
        service.assign_role(&admin, user_id, "student").unwrap();

        let session = service.session_for("root").unwrap();
        assert_eq!(session.role, "admin");
        assert!(session.is_staff());
        assert!(session.can(Permission::ManageRoles));
        assert!(session.can(Permission::AttemptQuestion));
    }

    #[test]
    fn test_assign_role_checks() {
        let (db, user_id) = setup();
        let service = AccessService::new(db);
        let admin = service.session_for("root").unwrap();

        let err = service.assign_role(&admin, user_id, "dean").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(service.assign_role(&admin, 999, "student").unwrap_err().is_not_found());

        let student = Session {
            role: "student".into(),
            permissions: PermissionSet::from_permissions(&[Permission::AttemptQuestion]),
            ..admin
        };
        let err = service.assign_role(&student, user_id, "professor").unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::Forbidden { .. })));
    }

    #[test]
    fn test_session_without_role() {
        let (db, user_id) = setup();
        db.with_conn(|conn| roles::clear_user_roles(conn, user_id)).unwrap();
        let err = AccessService::new(db).session_for("root").unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::RoleMissing)));
    }

    #[test]
    fn test_role_management() {
        let (db, _) = setup();
        let service = AccessService::new(db);
        let admin = service.session_for("root").unwrap();

        let role = service
            .create_role(&admin, "  Grader ", &[Permission::GradeSubmissions])
            .unwrap();
        assert_eq!(role.name, "grader");

        let role = service.grant(&admin, "grader", Permission::ViewFeedback).unwrap();
        assert!(role.permission_set().allows(Permission::ViewFeedback));
        let role = service.revoke(&admin, "grader", Permission::GradeSubmissions).unwrap();
        assert!(!role.permission_set().allows(Permission::GradeSubmissions));

        assert!(service.create_role(&admin, "grader", &[]).is_err());
        service.delete_role(&admin, "grader").unwrap();
        assert!(service.delete_role(&admin, "grader").is_err());
    }

    #[test]
    fn test_require_reports_permission_name() {
        let session = Session {
            user_id: 1,
            username: "s".into(),
            email: "s@example.com".into(),
            role: "student".into(),
            permissions: PermissionSet::from_permissions(&[Permission::AttemptQuestion]),
        };
        assert!(session.require(Permission::AttemptQuestion).is_ok());
        let err = session.require(Permission::ManageUsers).unwrap_err();
        assert_eq!(err.to_string(), "认证错误: You don't have permission to manage_users");
        assert!(!session.is_staff());
    }
}
