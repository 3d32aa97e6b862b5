//! 注册、登录与账号管理

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, AuthError, ValidationError};
use crate::infrastructure::Database;
use crate::models::{NewUser, Permission, User, UserWithRoles};
use crate::repository::{roles, users};
use crate::services::access::{find_role, Session};
use crate::utils::{
    hash_password, validate_email, validate_password_strength, validate_username, verify_password,
};

/// 自助注册时不允许选择的角色
const RESTRICTED_ROLE: &str = "admin";

/// 注册请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: String,
}

/// 认证服务
pub struct AuthService {
    db: Arc<Database>,
}

impl AuthService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// 自助注册
    ///
    /// 校验顺序：必填项、用户名格式、邮箱格式、密码强度、两次密码一致、角色存在且不是 admin、
    /// 用户名/邮箱未被占用
    pub fn register(&self, request: &RegisterRequest) -> AppResult<User> {
        let fields = [
            ("username", &request.username),
            ("email", &request.email),
            ("password", &request.password),
            ("confirm password", &request.confirm_password),
            ("role", &request.role),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ValidationError::MissingField(*name).into());
        }

        check_credentials_format(&request.username, &request.email, &request.password)?;
        if request.password != request.confirm_password {
            return Err(AppError::invalid("Passwords do not match"));
        }
        if request.role == RESTRICTED_ROLE {
            return Err(AuthError::NotAllowed("Cannot register as admin".to_string()).into());
        }

        let user = self.insert_user_with_role(
            &request.username,
            &request.email,
            &request.password,
            &request.role,
        )?;
        info!("✓ 新用户注册: {} ({})", user.username, request.role);
        Ok(user)
    }

    /// 用户名或邮箱登录
    pub fn login(&self, username_or_email: &str, password: &str) -> AppResult<Session> {
        if username_or_email.trim().is_empty() || password.is_empty() {
            return Err(ValidationError::MissingField("username and password").into());
        }

        self.db.with_conn(|conn| {
            let user = users::find_by_login(conn, username_or_email.trim())?
                .ok_or(AuthError::InvalidCredentials)?;

            if !verify_password(&user.password, password, &user.salt) {
                warn!("登录失败: {}", username_or_email);
                return Err(AuthError::InvalidCredentials.into());
            }

            let session = Session::for_user(conn, &user)?;
            users::set_last_login(conn, user.id, Utc::now())?;
            info!("用户登录: {} ({})", session.username, session.role);
            Ok(session)
        })
    }

    /// 修改密码，需要提供当前密码
    pub fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> AppResult<()> {
        if current_password.is_empty() || new_password.is_empty() || confirm_password.is_empty() {
            return Err(ValidationError::MissingField("password").into());
        }
        if new_password != confirm_password {
            return Err(AppError::invalid("New passwords do not match"));
        }
        validate_password_strength(new_password).map_err(AppError::invalid)?;

        self.db.with_conn(|conn| {
            let user = users::get(conn, user_id)?;
            if !verify_password(&user.password, current_password, &user.salt) {
                return Err(AppError::invalid("Current password is incorrect"));
            }
            let (hash, salt) = hash_password(new_password, None);
            users::set_password(conn, user_id, &hash, &salt)
        })?;
        info!("用户 {} 已修改密码", user_id);
        Ok(())
    }

    /// 修改邮箱
    pub fn update_email(&self, user_id: i64, new_email: &str) -> AppResult<()> {
        let new_email = new_email.trim();
        if !validate_email(new_email) {
            return Err(AppError::invalid("Invalid email format"));
        }
        self.db.with_conn(|conn| users::set_email(conn, user_id, new_email))
    }

    /// 管理员创建用户（可以指定任意角色）
    pub fn create_user(
        &self,
        session: &Session,
        username: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> AppResult<User> {
        session.require(Permission::ManageUsers)?;
        if [username, email, password, role].iter().any(|v| v.trim().is_empty()) {
            return Err(ValidationError::MissingField("username, email, password and role").into());
        }
        check_credentials_format(username, email, password)?;

        let user = self.insert_user_with_role(username, email, password, role)?;
        info!("✓ {} 创建了用户 {} ({})", session.username, user.username, role);
        Ok(user)
    }

    pub fn list_users(&self, session: &Session) -> AppResult<Vec<UserWithRoles>> {
        session.require(Permission::ManageUsers)?;
        self.db.with_conn(users::list_with_roles)
    }

    /// 删除用户，不能删除自己
    pub fn delete_user(&self, session: &Session, user_id: i64) -> AppResult<()> {
        session.require(Permission::ManageUsers)?;
        if session.user_id == user_id {
            return Err(AuthError::NotAllowed("You cannot delete your own account".to_string()).into());
        }
        self.db.with_conn(|conn| users::delete(conn, user_id))?;
        info!("{} 删除了用户 {}", session.username, user_id);
        Ok(())
    }

    /// 将用户的角色替换为指定角色
    pub fn set_user_role(&self, session: &Session, user_id: i64, role: &str) -> AppResult<()> {
        session.require(Permission::ManageUsers)?;
        self.db.transaction(|tx| {
            users::get(tx, user_id)?;
            let role = find_role(tx, role)?;
            roles::clear_user_roles(tx, user_id)?;
            roles::assign(tx, user_id, role.id)
        })?;
        info!("用户 {} 的角色已设置为 {}", user_id, role);
        Ok(())
    }

    /// 校验唯一性后写入用户并分配角色（同一事务）
    fn insert_user_with_role(&self, username: &str, email: &str, password: &str, role: &str) -> AppResult<User> {
        let (password_hash, salt) = hash_password(password, None);
        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            salt,
        };

        self.db.transaction(|tx| {
            let role = find_role(tx, role)?;
            if users::username_or_email_taken(tx, username, email)? {
                return Err(AuthError::AlreadyExists("Username or email already exists".to_string()).into());
            }
            let user_id = users::insert(tx, &new_user)?;
            roles::assign(tx, user_id, role.id)?;
            users::get(tx, user_id)
        })
    }
}

fn check_credentials_format(username: &str, email: &str, password: &str) -> AppResult<()> {
    if !validate_username(username) {
        return Err(AppError::invalid(
            "Username must be 3-50 characters long and contain only letters, numbers, and underscores",
        ));
    }
    if !validate_email(email) {
        return Err(AppError::invalid("Invalid email format"));
    }
    validate_password_strength(password).map_err(AppError::invalid)?;
    Ok(())
}
