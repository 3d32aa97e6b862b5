//! 输入校验工具
//!
//! 用户名、邮箱、密码强度以及 ILO 文本的格式化

use regex::Regex;
use std::sync::LazyLock;

static RE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\.-]+@[\w\.-]+\.\w+$").unwrap());
static RE_USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]{3,50}$").unwrap());
const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// 密码强度满足要求时的提示
pub const PASSWORD_STRONG: &str = "Password is strong";

/// 校验邮箱格式
pub fn validate_email(email: &str) -> bool {
    RE_EMAIL.is_match(email)
}

/// 校验用户名格式（字母、数字、下划线，3-50 个字符）
pub fn validate_username(username: &str) -> bool {
    RE_USERNAME.is_match(username)
}

/// 校验密码强度
///
/// 按顺序检查，返回第一条不满足的规则对应的提示
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err("Password must contain at least one special character");
    }
    Ok(())
}

/// 将 ILO 文本拆分为列表（按行，去掉空行）
pub fn format_ilos(ilos_text: &str) -> Vec<String> {
    ilos_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert!(RE_EMAIL.is_match("x@y.z"));
        assert!(RE_USERNAME.is_match("___"));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("student.one@uni-x.edu"));
        assert!(validate_email("a_b@c.io"));
        assert!(!validate_email("no-at-sign.com"));
        assert!(!validate_email("user@nodot"));
        assert!(!validate_email("user name@mail.com"));
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("abc"));
        assert!(validate_username("prof_smith_2024"));
        assert!(!validate_username("ab"));
        assert!(!validate_username("has space"));
        assert!(!validate_username("dash-name"));
        assert!(!validate_username(&"x".repeat(51)));
    }

    #[test]
    fn test_password_rules_in_order() {
        assert_eq!(
            validate_password_strength("Ab1!"),
            Err("Password must be at least 8 characters long")
        );
        assert_eq!(
            validate_password_strength("abcdefg1!"),
            Err("Password must contain at least one uppercase letter")
        );
        assert_eq!(
            validate_password_strength("ABCDEFG1!"),
            Err("Password must contain at least one lowercase letter")
        );
        assert_eq!(
            validate_password_strength("Abcdefgh!"),
            Err("Password must contain at least one digit")
        );
        assert_eq!(
            validate_password_strength("Abcdefg12"),
            Err("Password must contain at least one special character")
        );
        assert_eq!(validate_password_strength("Admin@123"), Ok(()));
    }

    #[test]
    fn test_format_ilos() {
        let ilos = "  Explain recursion \n\n Apply memoization\n   ";
        assert_eq!(
            format_ilos(ilos),
            vec!["Explain recursion".to_string(), "Apply memoization".to_string()]
        );
        assert!(format_ilos("").is_empty());
    }
}
