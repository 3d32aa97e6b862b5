//! 启动初始化
//!
//! 建表 → 写入默认角色 → 创建初始管理员（已存在时跳过）

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::Database;
use crate::models::NewUser;
use crate::repository::{roles, users};
use crate::services::access::seed_default_roles;
use crate::utils::hash_password;

/// 初始化结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// 本次是否新建了管理员
    pub admin_created: bool,
    pub admin_id: i64,
}

/// 初始化数据库，可重复调用
pub fn initialize(db: &Database, config: &Config) -> AppResult<BootstrapReport> {
    db.create_schema()?;

    let report = db.transaction(|tx| {
        seed_default_roles(tx)?;

        if let Some(admin) = users::find_by_username(tx, &config.admin_username)? {
            info!("管理员已存在: {}", admin.username);
            return Ok(BootstrapReport {
                admin_created: false,
                admin_id: admin.id,
            });
        }

        let (password_hash, salt) = hash_password(&config.admin_password, None);
        let admin_id = users::insert(
            tx,
            &NewUser {
                username: config.admin_username.clone(),
                email: config.admin_email.clone(),
                password_hash,
                salt,
            },
        )?;
        let role = roles::find_by_name(tx, "admin")?
            .ok_or_else(|| AppError::invalid("Role 'admin' does not exist"))?;
        roles::assign(tx, admin_id, role.id)?;

        Ok(BootstrapReport {
            admin_created: true,
            admin_id,
        })
    })?;

    if report.admin_created {
        info!("✓ 已创建管理员: {} / {}", config.admin_username, config.admin_email);
        warn!("⚠️ 请尽快修改管理员的默认密码");
    }
    Ok(report)
}
