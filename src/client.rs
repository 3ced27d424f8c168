//! 客户端核心实现
//!
//! 门面持有 REST 传输、惰性 JSON-RPC 会话与会话令牌，各实体 API
//! 以非占有引用的方式借用门面。REST 与 JSON-RPC 共享同一凭据。

use std::sync::Arc;

use reqwest::{header, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::api::{
    BackupApi, HostApi, NetworkApi, PoolApi, RestoreApi, SnapshotApi, StorageApi, TaskApi, VdiApi,
    VmApi,
};
use crate::config::{Config, RetryMode};
use crate::error::{Error, Result};
use crate::retry::BackoffPolicy;
use crate::rpc::RpcSession;

/// 会话令牌 Cookie 名，REST 登录返回，双通道复用
const SESSION_COOKIE: &str = "authenticationToken";

/// 管理平台客户端
pub struct Client {
    config: Config,

    /// REST 基础地址: `<origin>/rest/v0`
    base_url: String,

    /// JSON-RPC WebSocket 地址
    rpc_endpoint: String,

    /// HTTP 客户端
    http: reqwest::Client,

    /// 会话令牌，构造完成后不再变化
    token: String,

    /// 惰性建立的 JSON-RPC 会话，初始化失败同样被缓存
    rpc: OnceCell<std::result::Result<Arc<RpcSession>, String>>,

    /// backoff 模式的退避参数
    backoff: BackoffPolicy,
}

impl Client {
    /// 按配置构造客户端
    ///
    /// 只提供用户名/口令时，构造期间会向 `auth/login` 换取会话
    /// 令牌；已提供令牌则不发起任何请求。
    pub async fn new(config: Config) -> Result<Self> {
        let base_url = config.rest_base()?;
        let rpc_endpoint = config.rpc_endpoint()?;

        if config.development {
            debug!("开发模式: REST {} / JSON-RPC {}", base_url, rpc_endpoint);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| Error::Config(format!("构建 HTTP 客户端失败: {}", e)))?;

        let token = if !config.token.is_empty() {
            config.token.clone()
        } else {
            Self::login(&http, &base_url, &config.username, &config.password).await?
        };

        let backoff = BackoffPolicy::with_max_elapsed(config.retry_max_time());

        Ok(Self {
            config,
            base_url,
            rpc_endpoint,
            http,
            token,
            rpc: OnceCell::new(),
            backoff,
        })
    }

    /// 从环境变量构造客户端
    pub async fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?).await
    }

    /// 密码换取会话令牌
    async fn login(
        http: &reqwest::Client,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<String> {
        let url = format!("{}/auth/login", base_url);
        info!("密码登录: {}", username);

        let response = http
            .post(&url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("登录请求失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("登录失败 [{}]: {}", status.as_u16(), body)));
        }

        let prefix = format!("{}=", SESSION_COOKIE);
        for cookie in response.headers().get_all(header::SET_COOKIE) {
            let Ok(cookie) = cookie.to_str() else {
                continue;
            };
            let Some(first_pair) = cookie.split(';').next() else {
                continue;
            };
            if let Some(token) = first_pair.trim().strip_prefix(prefix.as_str()) {
                if !token.is_empty() {
                    info!("登录成功，已获取会话令牌");
                    return Ok(token.to_string());
                }
            }
        }

        Err(Error::Auth(format!("登录响应未携带 {} Cookie", SESSION_COOKIE)))
    }

    // ============================================
    // 实体 API 访问器
    // ============================================

    /// 虚拟机管理 API
    pub fn vm(&self) -> VmApi<'_> {
        VmApi::new(self)
    }

    /// 快照管理 API
    pub fn snapshot(&self) -> SnapshotApi<'_> {
        SnapshotApi::new(self)
    }

    /// 资源池管理 API
    pub fn pool(&self) -> PoolApi<'_> {
        PoolApi::new(self)
    }

    /// 宿主机管理 API
    pub fn host(&self) -> HostApi<'_> {
        HostApi::new(self)
    }

    /// 网络管理 API
    pub fn network(&self) -> NetworkApi<'_> {
        NetworkApi::new(self)
    }

    /// 虚拟磁盘管理 API
    pub fn vdi(&self) -> VdiApi<'_> {
        VdiApi::new(self)
    }

    /// 存储库管理 API
    pub fn storage(&self) -> StorageApi<'_> {
        StorageApi::new(self)
    }

    /// 备份作业管理 API
    pub fn backup(&self) -> BackupApi<'_> {
        BackupApi::new(self)
    }

    /// 恢复管理 API
    pub fn restore(&self) -> RestoreApi<'_> {
        RestoreApi::new(self)
    }

    /// 任务查询与跟踪 API
    pub fn task(&self) -> TaskApi<'_> {
        TaskApi::new(self)
    }

    // ============================================
    // REST 传输
    // ============================================

    /// 发送 REST 请求并解码为目标类型
    ///
    /// GET/DELETE 把参数平铺为查询串（零值字段不产生参数，切片
    /// 重复键名），其余方法以 JSON 体发送。
    pub(crate) async fn request<P, R>(
        &self,
        method: Method,
        path: &str,
        params: Option<P>,
    ) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let body = self.dispatch(method, path, params).await?;

        // 空响应体按 null 解码，覆盖 Option/() 等无产物容器
        let text = if body.is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(text).map_err(|e| Error::Decode {
            type_name: std::any::type_name::<R>(),
            message: e.to_string(),
            body,
        })
    }

    /// 发送 REST 请求，响应体按原文返回
    ///
    /// 变更类端点的响应体可能是任务句柄路径或裸 "OK"，由调用方
    /// 自行判别。
    pub(crate) async fn request_text<P: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: Option<P>,
    ) -> Result<String> {
        self.dispatch(method, path, params).await
    }

    async fn dispatch<P: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: Option<P>,
    ) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("REST 请求: {} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(header::ACCEPT, "application/json")
            .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, self.token));

        if let Some(params) = params {
            if method == Method::GET || method == Method::DELETE {
                let pairs = flatten_query(&params)?;
                if !pairs.is_empty() {
                    request = request.query(&pairs);
                }
            } else {
                request = request.json(&params);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("请求 {} 失败: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("读取 {} 响应失败: {}", url, e)))?;

        if !status.is_success() {
            warn!("REST 请求失败: {} {} -> {}", method, url, status.as_u16());
            return Err(Error::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                body,
            });
        }

        Ok(body)
    }

    // ============================================
    // JSON-RPC 通道
    // ============================================

    /// 取得惰性初始化的 JSON-RPC 会话
    ///
    /// 首个调用方执行建连与认证，并发调用方等待同一结果；
    /// 初始化失败会被记住并返回给后续所有调用方。
    pub(crate) async fn rpc(&self) -> Result<Arc<RpcSession>> {
        let outcome = self
            .rpc
            .get_or_init(|| async {
                RpcSession::connect(
                    &self.rpc_endpoint,
                    &self.token,
                    &self.config.username,
                    &self.config.password,
                )
                .await
                .map_err(|e| e.to_string())
            })
            .await;

        match outcome {
            Ok(session) => Ok(Arc::clone(session)),
            Err(message) => Err(Error::Transport(format!(
                "JSON-RPC 会话初始化失败: {}",
                message
            ))),
        }
    }

    /// 经 JSON-RPC 会话调用远端方法并解码
    pub(crate) async fn rpc_call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R> {
        let session = self.rpc().await?;
        session.call(method, params).await
    }

    /// 经 JSON-RPC 会话调用远端方法，结果保留原始 JSON 值
    pub(crate) async fn rpc_call_value(&self, method: &str, params: Value) -> Result<Value> {
        let session = self.rpc().await?;
        session.call_value(method, params).await
    }

    pub(crate) fn retry_mode(&self) -> RetryMode {
        self.config.retry_mode
    }

    pub(crate) fn backoff_policy(&self) -> &BackoffPolicy {
        &self.backoff
    }
}

/// 把参数记录平铺为查询键值对
///
/// null 与空串不产生参数，数组对每个元素重复键名，标量转为
/// 字符串，嵌套对象按 JSON 文本透传。
fn flatten_query<P: Serialize>(params: &P) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(params)
        .map_err(|e| Error::Validation(format!("查询参数序列化失败: {}", e)))?;

    let mut pairs = Vec::new();
    if let Value::Object(map) = value {
        for (key, value) in map {
            append_query_value(&mut pairs, &key, &value);
        }
    }
    Ok(pairs)
}

fn append_query_value(pairs: &mut Vec<(String, String)>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) if s.is_empty() => {}
        Value::String(s) => pairs.push((key.to_string(), s.clone())),
        Value::Bool(b) => pairs.push((key.to_string(), b.to_string())),
        Value::Number(n) => pairs.push((key.to_string(), n.to_string())),
        Value::Array(items) => {
            for item in items {
                append_query_value(pairs, key, item);
            }
        }
        Value::Object(_) => pairs.push((key.to_string(), value.to_string())),
    }
}
