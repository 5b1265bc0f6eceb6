use thiserror::Error;

#[derive(Error, Debug)]
pub enum CineStubError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("未设置API密钥。请使用 `cinestub config --set-api-key YOUR_KEY` 设置，或设置环境变量 GEMINI_API_KEY")]
    MissingApiKey,

    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("图片读取失败: {0}")]
    ImageLoad(String),

    #[error("API调用失败: {0}")]
    ApiCall(String),

    #[error("API响应解析失败: {0}")]
    ApiParse(String),

    #[error("未知字段: {0}")]
    UnknownField(String),

    #[error("图片生成失败: {0}")]
    Export(String),

    #[error("交互输入失败: {0}")]
    Prompt(String),

    #[error("JSON解析错误: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] cinestub_common::Error),
}

pub type Result<T> = std::result::Result<T, CineStubError>;
