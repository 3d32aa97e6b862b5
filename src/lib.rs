//! # Academic Insight Hub
//!
//! 课程内容、题库与组卷管理，借助 LLM 评估题目难度
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有 SQLite 连接，只暴露 `with_conn` / `transaction`
//! - `repository/` - 按实体划分的 SQL，函数只接收 `&Connection`
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `AccessService` / `Session` - 角色与权限
//! - `AuthService` - 注册、登录、用户管理
//! - `ContentService` - 课程、章节、题目、题库导入导出
//! - `LlmService` - 调用模型；`response_parser` - 逐级恢复模型输出
//! - `FeedbackService` / `DiscussionService` / `AnalyticsService`
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"或"一张卷"的完整流程
//! - `QuestionAnalyzer` - 难度评审与题目分析
//! - `QuestionGenerator` - AI 辅助出题
//! - `ExamDraft` - 筛选、抽题、调整、保存试卷
//! - `AttemptService` - 作答判分与进度
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/bootstrap` - 建表、默认角色、初始管理员
//! - `orchestrator/batch_analysis` - 章节题目的并发分析
//!
//! ## 模块结构

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod repository;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::Database;
pub use models::question::Question;
pub use orchestrator::{initialize, BatchAnalyzer};
pub use services::{ChatModel, ChatRequest, Session};
pub use workflow::{ExamDraft, QuestionAnalyzer, QuestionGenerator};
