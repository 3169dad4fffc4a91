#[doc = "Warden 的统一错误类型。"]
#[derive(thiserror::Error, Debug)]
pub enum WardenError {
    #[doc = "配置错误。"]
    #[error("配置错误: {message}")]
    ConfigError { message: String },

    #[doc = "IO 错误。"]
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),
}
