//! 客户端错误定义

use std::time::Duration;

use thiserror::Error;

/// 客户端错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("认证错误: {0}")]
    Auth(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    /// TCP/TLS/套接字层失败，backoff 模式下可重试
    #[error("传输错误: {0}")]
    Transport(String),

    #[error("HTTP 错误 [{status} {status_text}]: {body}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    /// 响应体无法解析为期望的类型
    #[error("解析 {type_name} 失败: {message} (响应体: {body})")]
    Decode {
        type_name: &'static str,
        message: String,
        body: String,
    },

    /// JSON-RPC 应答携带 error 对象
    #[error("JSON-RPC 方法 {method} 失败 [{code}]: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    /// 任务进入 failure 终态
    #[error("任务 {id} 执行失败: {message}")]
    TaskFailed { id: String, message: String },

    /// 轮询超出调用方给定的时间上限
    #[error("等待任务 {task_id} 超时 (上限 {elapsed:?})")]
    Deadline { task_id: String, elapsed: Duration },

    #[error("操作已取消")]
    Cancelled,

    #[error("操作失败: {0}")]
    OperationFailed(String),

    #[error("资源不存在: {0}")]
    NotFound(String),
}

impl Error {
    /// 是否为瞬时错误（轮询容忍、backoff 模式可重试）
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// 客户端结果类型
pub type Result<T> = std::result::Result<T, Error>;
