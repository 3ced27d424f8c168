//! JSON-RPC 会话
//!
//! 走 WebSocket 的持久双向通道，承载 `{id, method, params,
//! result | error}` 编号信封。请求 ID 单调递增，在途调用经
//! pending 表按 ID 解复用，乱序应答是正常情况，并发调用互不阻塞。
//!
//! 会话由门面在首次调用时惰性建立（见 `client`），本模块只负责
//! 连接、认证与调用本身。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// 单次调用的失败形态
#[derive(Debug)]
enum CallFailure {
    /// 服务端返回 error 对象
    Remote { code: i64, message: String },

    /// 通道层故障，所有在途调用一并失败
    Channel(String),
}

type CallOutcome = std::result::Result<Value, CallFailure>;

/// JSON-RPC 应答/通知信封
#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    id: Option<Value>,

    #[serde(default)]
    method: Option<String>,

    #[serde(default)]
    result: Option<Value>,

    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// 已认证的 JSON-RPC 会话
pub(crate) struct RpcSession {
    sink: Mutex<WsSink>,
    pending: Mutex<HashMap<u64, oneshot::Sender<CallOutcome>>>,
    next_id: AtomicU64,
}

impl RpcSession {
    /// 建立通道并完成认证
    ///
    /// 持有会话令牌时走 `session.signInWithToken`，否则用
    /// 用户名/口令走 `session.signIn`。认证参数不进日志。
    pub(crate) async fn connect(
        endpoint: &str,
        token: &str,
        username: &str,
        password: &str,
    ) -> Result<Arc<Self>> {
        info!("建立 JSON-RPC 会话: {}", endpoint);

        let (ws, _) = connect_async(endpoint)
            .await
            .map_err(|e| Error::Transport(format!("WebSocket 连接失败: {}", e)))?;
        let (sink, source) = ws.split();

        let session = Arc::new(Self {
            sink: Mutex::new(sink),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        });
        session.spawn_reader(source);

        if !token.is_empty() {
            let _: Value = session
                .call("session.signInWithToken", serde_json::json!({ "token": token }))
                .await?;
        } else {
            let _: Value = session
                .call(
                    "session.signIn",
                    serde_json::json!({ "email": username, "password": password }),
                )
                .await?;
        }

        info!("JSON-RPC 会话认证完成");
        Ok(session)
    }

    /// 调用远端方法并解码结果
    pub(crate) async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let value = self.call_value(method, params).await?;
        serde_json::from_value(value.clone()).map_err(|e| Error::Decode {
            type_name: std::any::type_name::<R>(),
            message: e.to_string(),
            body: value.to_string(),
        })
    }

    /// 调用远端方法，结果保留为原始 JSON 值
    pub(crate) async fn call_value(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method = method, id = id, "发起 JSON-RPC 调用");

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.send(Message::Text(request.to_string())).await {
                // 发送都没成功，收尾对应的 pending 槽位
                self.pending.lock().await.remove(&id);
                return Err(Error::Transport(format!("发送 JSON-RPC 请求失败: {}", e)));
            }
        }

        match rx.await {
            Ok(Ok(value)) => {
                debug!(method = method, id = id, "收到 JSON-RPC 应答");
                Ok(value)
            }
            Ok(Err(CallFailure::Remote { code, message })) => Err(Error::Rpc {
                method: method.to_string(),
                code,
                message,
            }),
            Ok(Err(CallFailure::Channel(message))) => Err(Error::Transport(message)),
            Err(_) => Err(Error::Transport("JSON-RPC 通道已关闭".to_string())),
        }
    }

    fn spawn_reader(self: &Arc<Self>, mut source: WsSource) {
        let session = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => session.dispatch(&text).await,
                    Ok(Message::Binary(data)) => {
                        if let Ok(text) = String::from_utf8(data) {
                            session.dispatch(&text).await;
                        }
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        // 心跳帧，协议层自行处理
                        continue;
                    }
                    Ok(Message::Close(frame)) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "服务端关闭".to_string());
                        warn!("JSON-RPC 通道关闭: {}", reason);
                        break;
                    }
                    Ok(Message::Frame(_)) => continue,
                    Err(e) => {
                        session
                            .fail_all(format!("接收 JSON-RPC 应答失败: {}", e))
                            .await;
                        return;
                    }
                }
            }

            session.fail_all("JSON-RPC 通道已断开".to_string()).await;
        });
    }

    /// 按 ID 关联应答，无 ID 的帧视为服务端通知
    async fn dispatch(&self, text: &str) {
        let envelope: RpcEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("忽略无法解析的帧: {}", e);
                return;
            }
        };

        let Some(id_value) = envelope.id else {
            if let Some(method) = envelope.method {
                debug!(method = %method, "收到服务端通知");
            }
            return;
        };
        let Some(id) = id_value.as_u64() else {
            return;
        };

        let outcome = match envelope.error {
            Some(err) => Err(CallFailure::Remote {
                code: err.code,
                message: err.message,
            }),
            None => Ok(envelope.result.unwrap_or(Value::Null)),
        };

        let sender = self.pending.lock().await.remove(&id);
        match sender {
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => debug!(id = id, "收到无对应调用的应答"),
        }
    }

    /// 确认通道断开后让所有在途调用失败
    async fn fail_all(&self, reason: String) {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return;
        }
        warn!(in_flight = pending.len(), "通道断开，终止在途调用");
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(CallFailure::Channel(reason.clone())));
        }
    }
}

/// 把布尔 `false` 结果转换为带操作名的错误
///
/// 部分方法以 `result: false` 表达领域层失败，传输层本身是成功的。
pub fn validate_result(method: &str, value: &Value) -> Result<()> {
    if value.as_bool() == Some(false) {
        return Err(Error::OperationFailed(format!("{} 返回 false", method)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_result_rejects_false() {
        let err = validate_result("backupNg.editJob", &Value::Bool(false)).unwrap_err();
        assert!(err.to_string().contains("backupNg.editJob"));
    }

    #[test]
    fn test_validate_result_accepts_everything_else() {
        assert!(validate_result("vm.revert", &Value::Bool(true)).is_ok());
        assert!(validate_result("vm.revert", &Value::Null).is_ok());
        assert!(validate_result("vm.revert", &serde_json::json!({"ok": 1})).is_ok());
    }

    #[test]
    fn test_envelope_with_error() {
        let envelope: RpcEnvelope = serde_json::from_str(
            r#"{ "jsonrpc": "2.0", "id": 3, "error": { "code": 10, "message": "无此作业" } }"#,
        )
        .unwrap();

        assert_eq!(envelope.id.unwrap().as_u64(), Some(3));
        let error = envelope.error.unwrap();
        assert_eq!(error.code, 10);
        assert_eq!(error.message, "无此作业");
    }

    #[test]
    fn test_notification_has_no_id() {
        let envelope: RpcEnvelope = serde_json::from_str(
            r#"{ "jsonrpc": "2.0", "method": "all", "params": { "items": [] } }"#,
        )
        .unwrap();

        assert!(envelope.id.is_none());
        assert_eq!(envelope.method.as_deref(), Some("all"));
    }
}
