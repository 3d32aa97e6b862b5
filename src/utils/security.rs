//! 密码哈希工具模块
//!
//! PBKDF2-HMAC-SHA256，每个用户独立随机盐。
//! 盐以十六进制文本保存，计算时按其 UTF-8 字节参与运算（与已有数据保持兼容）。

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// 迭代次数
pub const PBKDF2_ITERATIONS: u32 = 100_000;
/// 派生密钥长度（字节）
pub const DERIVED_KEY_LEN: usize = 128;
/// 随机盐长度（字节，编码后为两倍长度的十六进制字符串）
pub const SALT_LEN: usize = 32;

/// 生成随机盐（十六进制字符串）
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 对密码进行哈希
///
/// 未提供盐时自动生成，返回 `(十六进制哈希, 盐)`
pub fn hash_password(password: &str, salt: Option<&str>) -> (String, String) {
    let salt = match salt {
        Some(s) => s.to_string(),
        None => generate_salt(),
    };

    let mut key = [0u8; DERIVED_KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut key,
    );

    (hex::encode(key), salt)
}

/// 校验密码是否与保存的哈希一致（常数时间比较）
pub fn verify_password(stored_password: &str, provided_password: &str, salt: &str) -> bool {
    let (new_hash, _) = hash_password(provided_password, Some(salt));
    new_hash.as_bytes().ct_eq(stored_password.as_bytes()).into()
}
