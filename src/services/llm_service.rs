//! LLM 服务 - 业务能力层
//!
//! 只负责"调用模型、拿回文本"，解析交给 [`response_parser`](crate::services::response_parser)，
//! 流程交给 workflow。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 默认走 Groq 的 OpenAI 兼容端点，可通过配置切换到其他兼容服务

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::models::question::{QuestionType, StudentLevel};
use crate::utils::truncate_text;

/// 难度评审的系统提示词
pub const REVIEW_SYSTEM_PROMPT: &str =
    "You are an educational expert that analyzes academic questions and provides feedback.";
/// 题目分析的系统提示词
pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert in educational assessment.";
/// 题目生成的系统提示词
pub const GENERATION_SYSTEM_PROMPT: &str =
    "You are an experienced instructor who writes clear, well-aligned assessment questions.";

/// 一次对话请求
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// 对话模型
///
/// workflow 只依赖这个 trait，测试里可以换成脚本化的实现。
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 发送请求，返回第一条回复的文本（已去掉首尾空白）
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// 模型名（用于日志）
    fn model_name(&self) -> &str;
}

/// 基于 OpenAI 兼容接口的 LLM 服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务，未配置 API Key 时返回 `NotConfigured`
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        if !config.llm_enabled() {
            warn!("未配置 LLM API Key，AI 功能不可用");
            return Err(LlmError::NotConfigured);
        }

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Ok(Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for LlmService {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", request.user.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system.as_str())
            .build()?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.user.as_str())
            .build()?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::ApiCallFailed {
                model: self.model_name.clone(),
                source: Box::new(e),
            }
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        debug!("LLM 响应: {}", truncate_text(&content, 100));
        Ok(content.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// ========== Prompt 构建 ==========

/// 难度评审：评分 1.0-5.0 + 结合 ILO 的改进建议
pub fn difficulty_review_prompt(
    question: &str,
    question_type: &QuestionType,
    course_title: &str,
    chapter_title: &str,
    ilos: &str,
) -> ChatRequest {
    let user = format!(
        r#"Analyze this academic question and provide feedback:

COURSE: {course_title}
CHAPTER: {chapter_title}
QUESTION TYPE: {question_type}
INTENDED LEARNING OUTCOMES (ILOs): {ilos}

QUESTION: {question}

Please analyze this question and provide:

1. DIFFICULTY RATING: Rate the question's difficulty on a scale of 1.0 to 5.0 (where 1 is easiest and 5 is hardest). Consider the complexity, cognitive load, and alignment with the ILOs.

2. IMPROVEMENT SUGGESTIONS: Provide specific suggestions to improve the question's quality, clarity, and alignment with the ILOs. Consider aspects like:
   - Clarity and precision of language
   - Alignment with stated learning outcomes
   - Cognitive level (knowledge, comprehension, application, analysis, etc.)
   - Potential ambiguities or issues
   - Suggestions for better wording or structure

Format your response as a JSON object with the following structure:
{{"difficulty_rating": float, "improvement_suggestions": string}}"#
    );

    ChatRequest {
        system: REVIEW_SYSTEM_PROMPT.to_string(),
        user,
        temperature: 0.3,
        max_tokens: 1024,
    }
}

/// 题目分析：难度、预计时间、适用水平、改进建议、标签
pub fn analysis_prompt(question: &str, question_type: &QuestionType) -> ChatRequest {
    let user = format!(
        r#"You are an expert in educational assessment. Please analyze the following question:

Question: {question}
Question Type: {question_type}

Provide the following analysis:
1. Difficulty rating (1-5 scale, where 1 is easiest and 5 is hardest)
2. Estimated time to answer (in minutes)
3. Appropriate student level (Beginner, Intermediate, Advanced)
4. Suggested improvements to the question
5. Relevant tags for categorizing this question

Format your response as a JSON object with the following keys:
difficulty, estimated_time, student_level, improvements, tags"#
    );

    ChatRequest {
        system: ANALYSIS_SYSTEM_PROMPT.to_string(),
        user,
        temperature: 0.2,
        max_tokens: 1000,
    }
}

/// 题目生成：要求返回 JSON 数组
pub fn generation_prompt(
    course_title: &str,
    chapter_title: &str,
    ilos: &str,
    question_type: &QuestionType,
    count: usize,
    level: StudentLevel,
) -> ChatRequest {
    let options_hint = if *question_type == QuestionType::MultipleChoice {
        "Each question must have exactly four options in \"options\" (without letter prefixes) and \
         \"correct_answer\" must be written as the letter and text of the right option, e.g. \"B. 42\"."
    } else {
        "Leave \"options\" empty."
    };

    let user = format!(
        r#"Write {count} new {question_type} questions for {level} students.

COURSE: {course_title}
CHAPTER: {chapter_title}
INTENDED LEARNING OUTCOMES (ILOs): {ilos}

Every question must assess at least one of the ILOs. {options_hint}

Return only a JSON array where every element has the keys:
content, question_type, options, correct_answer, explanation, difficulty (1.0-5.0), estimated_time (minutes), student_level, tags"#
    );

    ChatRequest {
        system: GENERATION_SYSTEM_PROMPT.to_string(),
        user,
        temperature: 0.7,
        max_tokens: 2048,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_prompt_settings() {
        let request = difficulty_review_prompt(
            "What is 2+2?",
            &QuestionType::ShortAnswer,
            "Arithmetic",
            "Addition",
            "Add small numbers",
        );
        assert_eq!(request.system, REVIEW_SYSTEM_PROMPT);
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 1024);
        assert!(request.user.contains("QUESTION TYPE: Short Answer"));
        assert!(request.user.contains(r#"{"difficulty_rating": float, "improvement_suggestions": string}"#));
    }

    #[test]
    fn test_analysis_prompt_settings() {
        let request = analysis_prompt("Explain osmosis", &QuestionType::Essay);
        assert_eq!(request.system, ANALYSIS_SYSTEM_PROMPT);
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, 1000);
        assert!(request.user.contains("difficulty, estimated_time, student_level, improvements, tags"));
    }

    #[test]
    fn test_generation_prompt_mentions_options_for_choice() {
        let mc = generation_prompt("C", "Ch", "ILO", &QuestionType::MultipleChoice, 3, StudentLevel::Beginner);
        assert!(mc.user.contains("Write 3 new Multiple Choice questions for Beginner students"));
        assert!(mc.user.contains("exactly four options"));

        let essay = generation_prompt("C", "Ch", "ILO", &QuestionType::Essay, 1, StudentLevel::Advanced);
        assert!(essay.user.contains("Leave \"options\" empty."));
    }

    #[test]
    fn test_service_requires_api_key() {
        let config = Config::default();
        assert!(matches!(LlmService::new(&config), Err(LlmError::NotConfigured)));
    }

    /// 需要真实的 GROQ_API_KEY
    ///
    /// 运行方式：
    /// ```bash
    /// cargo test test_real_difficulty_review -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_real_difficulty_review() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env();
        let service = LlmService::new(&config).expect("需要配置 GROQ_API_KEY");
        let request = difficulty_review_prompt(
            "What is the derivative of x^2?",
            &QuestionType::ShortAnswer,
            "Calculus",
            "Derivatives",
            "Differentiate polynomials",
        );

        match service.complete(&request).await {
            Ok(response) => {
                println!("\n========== LLM 响应 ==========");
                println!("{}", response);
                println!("==============================\n");
                assert!(!response.is_empty());
            }
            Err(e) => panic!("LLM 调用失败: {}", e),
        }
    }
}
