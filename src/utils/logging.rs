//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use tracing::info;

/// 记录程序启动信息
pub fn log_startup(database: &str, llm_enabled: bool) {
    info!("{}", "=".repeat(60));
    info!("🚀 Academic Insight Hub 启动");
    info!("📁 数据库: {}", database);
    info!(
        "🤖 LLM: {}",
        if llm_enabled { "已启用" } else { "未配置 API Key" }
    );
    info!("{}", "=".repeat(60));
}

/// 记录批量分析开始信息
///
/// # 参数
/// - `total`: 题目总数
/// - `max_concurrent`: 最大并发数
pub fn log_batch_start(total: usize, max_concurrent: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始批量分析: 共 {} 道题目", total);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 打印批量分析统计信息
pub fn print_final_stats(success: usize, failed: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 批量分析完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
