use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 认证与权限错误
    #[error("认证错误: {0}")]
    Auth(#[from] AuthError),
    /// 数据库错误
    #[error("数据库错误: {0}")]
    Database(#[from] DatabaseError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 组卷错误
    #[error("组卷错误: {0}")]
    Exam(#[from] ExamError),
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 输入校验错误
///
/// `Invalid` 携带的文本直接展示给用户，保持与表单提示一致。
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// 必填字段缺失
    #[error("Please fill in all required fields: {0}")]
    MissingField(&'static str),
    /// 字段格式或取值不合法
    #[error("{0}")]
    Invalid(String),
    /// 数值超出范围
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}

/// 认证与权限错误
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    /// 用户名/邮箱或密码错误
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// 用户没有分配任何角色
    #[error("User role not found. Please contact an administrator.")]
    RoleMissing,
    /// 缺少权限
    #[error("You don't have permission to {permission}")]
    Forbidden { permission: String },
    /// 用户名或邮箱已被占用
    #[error("{0}")]
    AlreadyExists(String),
    /// 不允许的操作（例如注册为 admin、删除自己）
    #[error("{0}")]
    NotAllowed(String),
}

/// 数据库错误
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// 记录不存在
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    /// 唯一约束冲突
    #[error("{entity} already exists: {detail}")]
    Conflict { entity: &'static str, detail: String },
    /// 底层 SQLite 错误
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 未配置 API Key
    #[error("LLM client not initialized. Please check your API key.")]
    NotConfigured,
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 分析结果缺少难度评分
    #[error("Failed to analyze question. Please try again.")]
    AnalysisFailed,
    /// 生成题目结果无法解析
    #[error("无法从LLM响应中解析出题目: {response}")]
    NoQuestionsParsed { response: String },
}

/// 组卷错误
#[derive(Debug, Error, PartialEq)]
pub enum ExamError {
    /// 候选题目数量不足
    #[error("Not enough questions available. Only {available} questions match your criteria.")]
    NotEnoughQuestions { available: usize },
    /// 题目数量超出允许范围
    #[error("Total questions must be between {min} and {max}, got {requested}")]
    InvalidQuestionCount {
        requested: usize,
        min: usize,
        max: usize,
    },
    /// 题目不在候选列表中
    #[error("Question {0} is not among the filtered questions")]
    NotACandidate(i64),
    /// 题目已被选中
    #[error("Question {0} is already part of the exam")]
    AlreadySelected(i64),
    /// 题目未被选中
    #[error("Question {0} is not part of the exam")]
    NotSelected(i64),
    /// 没有选中任何题目
    #[error("Please select at least one question.")]
    EmptySelection,
    /// 分值不合法
    #[error("Points must be at least 1, got {0}")]
    InvalidPoints(i64),
}

// ========== 从常见错误类型转换 ==========

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(DatabaseError::Sqlite(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::File {
            path: String::new(),
            source: Box::new(err),
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File {
            path: String::new(),
            source: Box::new(err),
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建记录不存在错误
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        AppError::Database(DatabaseError::NotFound { entity, id })
    }

    /// 创建权限不足错误
    pub fn forbidden(permission: impl Into<String>) -> Self {
        AppError::Auth(AuthError::Forbidden {
            permission: permission.into(),
        })
    }

    /// 创建校验错误
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::Validation(ValidationError::Invalid(message.into()))
    }

    /// 创建文件读取错误
    pub fn file_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 是否为"记录不存在"
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Database(DatabaseError::NotFound { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
