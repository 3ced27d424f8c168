//! 客户端配置
//!
//! 连接、认证与重试选项。优先使用显式构造的 [`Config`]，
//! [`Config::from_env`] 作为可选的环境变量加载入口。

use std::env;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// 重试模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryMode {
    /// 不重试（默认）
    None,

    /// 指数退避重试，封顶时长由 `retry_max_time` 控制
    Backoff,
}

impl FromStr for RetryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "none" => Ok(RetryMode::None),
            "backoff" => Ok(RetryMode::Backoff),
            other => Err(Error::Config(format!("未知的重试模式: {}", other))),
        }
    }
}

/// 客户端配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 服务端地址，接受 http/https/ws/wss
    pub url: String,

    /// 密码登录用户名
    pub username: String,

    /// 密码登录口令
    pub password: String,

    /// 会话令牌，非空时跳过密码登录
    pub token: String,

    /// 跳过 TLS 证书校验（自签名部署）
    pub insecure: bool,

    /// 开发模式，放宽日志详细程度
    pub development: bool,

    /// 重试模式
    pub retry_mode: RetryMode,

    /// backoff 模式的总时长上限（秒）
    pub retry_max_time: u64,

    /// 单次请求超时（秒）
    pub request_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: default_username(),
            password: default_password(),
            token: String::new(),
            insecure: false,
            development: false,
            retry_mode: RetryMode::None,
            retry_max_time: default_retry_max_time(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 读取 `XOA_URL` / `XOA_USER` / `XOA_PASSWORD` / `XOA_TOKEN` /
    /// `XOA_INSECURE` / `XOA_DEVELOPMENT` / `XOA_RETRY_MODE` /
    /// `XOA_RETRY_MAX_TIME`，缺省值与 [`Config::default`] 一致。
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(url) = env::var("XOA_URL") {
            config.url = url;
        }
        if let Ok(user) = env::var("XOA_USER") {
            config.username = user;
        }
        if let Ok(password) = env::var("XOA_PASSWORD") {
            config.password = password;
        }
        if let Ok(token) = env::var("XOA_TOKEN") {
            config.token = token;
        }
        if let Ok(insecure) = env::var("XOA_INSECURE") {
            config.insecure = parse_bool(&insecure);
        }
        if let Ok(development) = env::var("XOA_DEVELOPMENT") {
            config.development = parse_bool(&development);
        }
        if let Ok(mode) = env::var("XOA_RETRY_MODE") {
            config.retry_mode = mode.parse()?;
        }
        if let Ok(max_time) = env::var("XOA_RETRY_MAX_TIME") {
            config.retry_max_time = max_time
                .parse()
                .map_err(|_| Error::Config(format!("无效的重试时长上限: {}", max_time)))?;
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn retry_max_time(&self) -> Duration {
        Duration::from_secs(self.retry_max_time)
    }

    /// REST 基础地址: `<origin>/rest/v0`
    ///
    /// ws/wss 按对应的 http 方案改写，原始方案保留给 JSON-RPC 通道。
    pub(crate) fn rest_base(&self) -> Result<String> {
        let mut parsed =
            Url::parse(&self.url).map_err(|e| Error::Config(format!("无效的地址 {}: {}", self.url, e)))?;

        let scheme = match parsed.scheme() {
            "http" | "https" => None,
            "ws" => Some("http"),
            "wss" => Some("https"),
            other => {
                return Err(Error::Config(format!("不支持的方案: {}", other)));
            }
        };
        if let Some(scheme) = scheme {
            // set_scheme 对 ws->http 的改写是允许的
            let _ = parsed.set_scheme(scheme);
        }

        let origin = parsed.as_str().trim_end_matches('/').to_string();
        Ok(format!("{}/rest/v0", origin))
    }

    /// JSON-RPC WebSocket 地址: `<ws-origin>/api/`
    pub(crate) fn rpc_endpoint(&self) -> Result<String> {
        let mut parsed =
            Url::parse(&self.url).map_err(|e| Error::Config(format!("无效的地址 {}: {}", self.url, e)))?;

        let scheme = match parsed.scheme() {
            "ws" | "wss" => None,
            "http" => Some("ws"),
            "https" => Some("wss"),
            other => {
                return Err(Error::Config(format!("不支持的方案: {}", other)));
            }
        };
        if let Some(scheme) = scheme {
            let _ = parsed.set_scheme(scheme);
        }

        let origin = parsed.as_str().trim_end_matches('/').to_string();
        Ok(format!("{}/api/", origin))
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

// 默认值函数
fn default_url() -> String {
    "http://localhost:80".to_string()
}

fn default_username() -> String {
    "admin@admin.net".to_string()
}

fn default_password() -> String {
    "admin".to_string()
}

fn default_retry_max_time() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.url, "http://localhost:80");
        assert_eq!(config.username, "admin@admin.net");
        assert_eq!(config.password, "admin");
        assert!(config.token.is_empty());
        assert!(!config.insecure);
        assert_eq!(config.retry_mode, RetryMode::None);
        assert_eq!(config.retry_max_time(), Duration::from_secs(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_mode_parse() {
        assert_eq!("none".parse::<RetryMode>().unwrap(), RetryMode::None);
        assert_eq!("backoff".parse::<RetryMode>().unwrap(), RetryMode::Backoff);
        assert!("aggressive".parse::<RetryMode>().is_err());
    }

    #[test]
    fn test_rest_base_rewrites_ws_scheme() {
        let config = Config {
            url: "ws://xoa.example.com:8080".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.rest_base().unwrap(),
            "http://xoa.example.com:8080/rest/v0"
        );

        let config = Config {
            url: "wss://xoa.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(config.rest_base().unwrap(), "https://xoa.example.com/rest/v0");
    }

    #[test]
    fn test_rpc_endpoint_rewrites_http_scheme() {
        let config = Config {
            url: "http://xoa.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(config.rpc_endpoint().unwrap(), "ws://xoa.example.com/api/");

        let config = Config {
            url: "wss://xoa.example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(config.rpc_endpoint().unwrap(), "wss://xoa.example.com/api/");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = Config {
            url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.rest_base().is_err());
    }
}
