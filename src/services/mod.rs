pub mod access;
pub mod analytics_service;
pub mod auth_service;
pub mod content_service;
pub mod discussion_service;
pub mod feedback_service;
pub mod llm_service;
pub mod response_parser;

pub use access::{AccessService, Session};
pub use analytics_service::AnalyticsService;
pub use auth_service::AuthService;
pub use content_service::ContentService;
pub use discussion_service::DiscussionService;
pub use feedback_service::FeedbackService;
pub use llm_service::{ChatModel, ChatRequest, LlmService};
