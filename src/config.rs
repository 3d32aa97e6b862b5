/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 数据库地址（SQLite 文件路径，支持 `sqlite:///` 前缀和 `:memory:`）
    pub database_url: String,
    /// 同时进行的 LLM 分析数量
    pub max_concurrent_analyses: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 初始管理员 ---
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "academic_insight_hub.db".to_string(),
            max_concurrent_analyses: 4,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.groq.com/openai/v1".to_string(),
            llm_model_name: "llama-3.1-8b-instant".to_string(),
            admin_username: "admin".to_string(),
            admin_email: "admin@example.com".to_string(),
            admin_password: "Admin@123".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置（先读取 `.env`），缺失的项使用默认值
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 使用自定义查找函数加载配置，便于测试
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(default.database_url),
            max_concurrent_analyses: lookup("MAX_CONCURRENT_ANALYSES")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(default.max_concurrent_analyses),
            verbose_logging: lookup("VERBOSE_LOGGING")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.verbose_logging),
            llm_api_key: lookup("GROQ_API_KEY")
                .or_else(|| lookup("LLM_API_KEY"))
                .unwrap_or(default.llm_api_key),
            llm_api_base_url: lookup("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: lookup("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            admin_username: lookup("ADMIN_USERNAME").unwrap_or(default.admin_username),
            admin_email: lookup("ADMIN_EMAIL").unwrap_or(default.admin_email),
            admin_password: lookup("ADMIN_PASSWORD").unwrap_or(default.admin_password),
        }
    }

    /// 是否配置了 LLM API Key
    pub fn llm_enabled(&self) -> bool {
        !self.llm_api_key.trim().is_empty()
    }

    /// 去掉 `sqlite://` 前缀后的数据库路径
    pub fn database_path(&self) -> &str {
        let url = self.database_url.as_str();
        url.strip_prefix("sqlite:///")
            .or_else(|| url.strip_prefix("sqlite://"))
            .unwrap_or(url)
    }
}
