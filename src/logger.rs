//! 日志初始化
//!
//! 基于 `tracing-subscriber`，`RUST_LOG` 优先；未设置时默认 `info`，
//! `verbose` 为真时默认 `debug`。

use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 重复调用是安全的（测试中多次初始化时只有第一次生效）
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::new(format!("{level},rusqlite=warn"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_verbose_lowers_default_level() {
        assert_eq!(default_filter(false).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(default_filter(true).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
    }
}
