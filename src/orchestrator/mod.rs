//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 负责启动初始化和批量调度，不包含具体业务判断。
//!
//! ## 模块划分
//!
//! ### `bootstrap` - 启动初始化
//! - 创建表结构
//! - 写入/更新默认角色
//! - 创建初始管理员
//!
//! ### `batch_analysis` - 批量题目分析
//! - 加载章节下的全部题目
//! - 控制并发数量（Semaphore）
//! - 汇总成功/失败统计
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator (启动 / 批量)
//!     ↓
//! workflow (单道题的分析、生成、组卷、作答)
//!     ↓
//! services (能力层：权限 / 内容 / LLM / 解析)
//!     ↓
//! repository (按实体划分的 SQL)
//!     ↓
//! infrastructure (基础设施：Database)
//! ```

pub mod batch_analysis;
pub mod bootstrap;

pub use batch_analysis::{AnalysisOutcome, BatchAnalyzer, BatchReport};
pub use bootstrap::{initialize, BootstrapReport};
